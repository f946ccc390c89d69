use crate::error::IngestError;
use crate::models::{IngestionOptions, PdfChunk};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&IngestionOptions::default())
    }
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
            separator: value.separator.clone(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separator.is_empty() {
            return Err(IngestError::InvalidChunkConfig(
                "separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A chunk before it is attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub overlap: usize,
}

/// Splits on the separator (keeping it on each unit) and packs units greedily.
///
/// Every chunk after the first starts with the last `chunk_overlap`
/// characters of its predecessor. That prefix shrinks only when the next
/// unit would not fit beside it. A unit longer than `chunk_size` is emitted
/// whole, on its own. Blank units that would open a chunk are dropped, so no
/// chunk is whitespace only. Stripping each chunk's `overlap` prefix and
/// concatenating gives back the input less those dropped blank lines.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, IngestError> {
    config.validate()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut prefix_len = 0usize;

    for unit in text.split_inclusive(config.separator.as_str()) {
        let unit_len = unit.chars().count();
        let has_body = current_len > prefix_len;

        if has_body && current_len + unit_len > config.chunk_size {
            let carried = tail_chars(&current, config.chunk_overlap);
            chunks.push(TextChunk {
                text: std::mem::take(&mut current),
                overlap: prefix_len,
            });
            prefix_len = carried.chars().count();
            current = carried;
            current_len = prefix_len;
        }

        if current_len == prefix_len && unit.trim().is_empty() {
            continue;
        }

        if current_len + unit_len > config.chunk_size {
            let room = config.chunk_size.saturating_sub(unit_len);
            current = tail_chars(&current, room);
            prefix_len = current.chars().count();
            current_len = prefix_len;
        }

        current.push_str(unit);
        current_len += unit_len;
    }

    if current_len > prefix_len {
        chunks.push(TextChunk {
            text: current,
            overlap: prefix_len,
        });
    }

    Ok(chunks)
}

pub fn build_chunks(
    document_id: &str,
    text: &str,
    config: &ChunkingConfig,
) -> Result<Vec<PdfChunk>, IngestError> {
    let chunks = split_text(text, config)?
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let chunk_index = index as u64;
            PdfChunk {
                chunk_id: make_chunk_id(document_id, chunk_index, &chunk.text),
                document_id: document_id.to_string(),
                chunk_index,
                overlap: chunk.overlap,
                text: chunk.text,
            }
        })
        .collect();

    Ok(chunks)
}

fn tail_chars(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}

fn make_chunk_id(document_id: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
