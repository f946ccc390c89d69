use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_K: usize = 4;

pub const NOT_READY_MESSAGE: &str = "Knowledge base not initialized. Please upload a PDF first.";
pub const GENERATION_FAILED_MESSAGE: &str = "An error occurred while generating the response.";

pub const UPLOAD_OK_STATUS: &str = "PDF processed successfully";
pub const UPLOAD_FAILED_STATUS: &str = "PDF processing failed";

/// An uploaded PDF. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentFingerprint {
    pub document_id: String,
    pub file_name: String,
    pub checksum: String,
    pub byte_len: usize,
    pub page_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: u64,
    /// Leading characters repeated from the tail of the previous chunk.
    pub overlap: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
    pub embedding_batch_size: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            separator: "\n".to_string(),
            embedding_batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCandidate {
    pub chunk_id: String,
    pub chunk_index: u64,
    /// Cosine distance to the query; smaller is closer.
    pub distance: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub query: String,
    pub hits: Vec<SearchCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

impl ChatResponse {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    pub fn not_ready() -> Self {
        Self::new(NOT_READY_MESSAGE)
    }

    pub fn generation_failed() -> Self {
        Self::new(GENERATION_FAILED_MESSAGE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl UploadStatus {
    pub fn processed() -> Self {
        Self {
            status: UPLOAD_OK_STATUS.to_string(),
            detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: UPLOAD_FAILED_STATUS.to_string(),
            detail: Some(detail.into()),
        }
    }
}

/// Audit record of one successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadRecord {
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}
