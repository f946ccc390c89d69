pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod synthesis;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use chunking::{build_chunks, split_text, ChunkingConfig, TextChunk};
pub use config::{
    validate_ingestion, ProviderConfig, DEFAULT_API_BASE_URL, DEFAULT_CHAT_MODEL,
    DEFAULT_EMBEDDING_MODEL,
};
pub use embeddings::{CharacterNgramEmbedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, IngestError, MetadataError, SearchError};
pub use extractor::{extract_page_texts, Extraction, LopdfExtractor, PageText, PdfExtractor};
pub use index::{cosine_distance, IndexedChunk, VectorIndex};
pub use ingest::{build_knowledge_base, embed_in_batches, KnowledgeBase};
pub use metadata::MetadataLog;
pub use models::{
    ChatRequest, ChatResponse, DocumentFingerprint, IngestionOptions, PdfChunk, SearchCandidate,
    SearchQuery, SearchResult, UploadRecord, UploadStatus, DEFAULT_TOP_K,
    GENERATION_FAILED_MESSAGE, NOT_READY_MESSAGE, UPLOAD_FAILED_STATUS, UPLOAD_OK_STATUS,
};
pub use orchestrator::{IndexStatus, SessionCoordinator};
pub use synthesis::{build_stuff_prompt, OpenAiSynthesizer};
pub use traits::{AnswerSynthesizer, Embedder};
