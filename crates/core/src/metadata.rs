//! Append-only audit log of uploaded documents, kept in SQLite.
//!
//! The query path never reads from here.

use crate::error::MetadataError;
use crate::models::UploadRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

pub struct MetadataLog {
    conn: Mutex<Connection>,
}

impl MetadataLog {
    pub fn open(path: &Path) -> Result<Self, MetadataError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, MetadataError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MetadataError> {
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.migrate()?;
        Ok(log)
    }

    fn migrate(&self) -> Result<(), MetadataError> {
        let conn = self.conn.lock().map_err(|_| MetadataError::Poisoned)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pdf_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name TEXT NOT NULL,
                date_uploaded TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn record(&self, record: &UploadRecord) -> Result<(), MetadataError> {
        let conn = self.conn.lock().map_err(|_| MetadataError::Poisoned)?;
        conn.execute(
            "INSERT INTO pdf_metadata (file_name, date_uploaded) VALUES (?1, ?2)",
            params![record.file_name, record.uploaded_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Most recent uploads first.
    pub fn history(&self, limit: usize) -> Result<Vec<UploadRecord>, MetadataError> {
        let conn = self.conn.lock().map_err(|_| MetadataError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT file_name, date_uploaded FROM pdf_metadata ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (file_name, date_uploaded) = row?;
            let uploaded_at = DateTime::parse_from_rfc3339(&date_uploaded)?.with_timezone(&Utc);
            records.push(UploadRecord {
                file_name,
                uploaded_at,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn record(name: &str, offset_secs: i64) -> UploadRecord {
        UploadRecord {
            file_name: name.to_string(),
            uploaded_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn records_are_listed_newest_first() -> Result<(), Box<dyn std::error::Error>> {
        let log = MetadataLog::open_in_memory()?;
        log.record(&record("a.pdf", 0))?;
        log.record(&record("b.pdf", 1))?;

        let history = log.history(10)?;
        let names = history
            .iter()
            .map(|entry| entry.file_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);
        Ok(())
    }

    #[test]
    fn same_file_can_be_uploaded_twice() -> Result<(), Box<dyn std::error::Error>> {
        let log = MetadataLog::open_in_memory()?;
        log.record(&record("same.pdf", 0))?;
        log.record(&record("same.pdf", 5))?;
        assert_eq!(log.history(10)?.len(), 2);
        assert_eq!(log.history(1)?.len(), 1);
        Ok(())
    }

    #[test]
    fn log_persists_across_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("pdf_metadata.db");
        let entry = record("kept.pdf", 0);

        MetadataLog::open(&path)?.record(&entry)?;
        let history = MetadataLog::open(&path)?.history(10)?;

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].file_name, "kept.pdf");
        assert_eq!(
            history[0].uploaded_at.timestamp(),
            entry.uploaded_at.timestamp()
        );
        Ok(())
    }
}
