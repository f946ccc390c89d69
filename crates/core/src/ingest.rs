use crate::chunking::{build_chunks, ChunkingConfig};
use crate::extractor::{Extraction, PdfExtractor};
use crate::index::VectorIndex;
use crate::traits::Embedder;
use crate::{DocumentFingerprint, IngestError, IngestionOptions, SearchError};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// A fully embedded document, ready to answer queries.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    pub document: DocumentFingerprint,
    pub index: VectorIndex,
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn build_document_fingerprint(
    file_name: &str,
    bytes: &[u8],
    page_count: usize,
) -> DocumentFingerprint {
    let checksum = digest_bytes(bytes);
    DocumentFingerprint {
        document_id: generate_document_id(file_name, &checksum),
        file_name: file_name.to_string(),
        checksum,
        byte_len: bytes.len(),
        page_count,
        uploaded_at: Utc::now(),
    }
}

fn generate_document_id(file_name: &str, checksum: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    hasher.update(checksum.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Requests embeddings `batch_size` texts at a time, keeping input order.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, SearchError> {
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed_documents(batch).await?;
        if embedded.len() != batch.len() {
            return Err(SearchError::BackendResponse {
                backend: embedder.name().to_string(),
                details: format!(
                    "embedding count {} doesn't match batch size {}",
                    embedded.len(),
                    batch.len()
                ),
            });
        }
        vectors.extend(embedded);
    }

    Ok(vectors)
}

/// Extract, chunk, embed and index one PDF. Nothing is returned unless every
/// step succeeds.
pub async fn build_knowledge_base(
    file_name: &str,
    bytes: Arc<Vec<u8>>,
    extractor: Arc<dyn PdfExtractor>,
    embedder: &dyn Embedder,
    options: &IngestionOptions,
) -> Result<KnowledgeBase, IngestError> {
    let extraction = {
        let bytes = Arc::clone(&bytes);
        tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await??
    };

    let page_count = extraction.page_count();
    let text = match extraction {
        Extraction::Empty { .. } => {
            return Err(IngestError::EmptyDocument(file_name.to_string()));
        }
        text @ Extraction::Text { .. } => text.full_text().unwrap_or_default(),
    };
    info!(file_name, page_count, text_chars = text.len(), "text extracted from pdf");

    let document = build_document_fingerprint(file_name, &bytes, page_count);
    let config = ChunkingConfig::from(options);
    let chunks = build_chunks(&document.document_id, &text, &config)?;
    if chunks.is_empty() {
        return Err(IngestError::EmptyDocument(file_name.to_string()));
    }
    info!(file_name, chunk_count = chunks.len(), "text split into chunks");

    let texts = chunks
        .iter()
        .map(|chunk| chunk.text.clone())
        .collect::<Vec<_>>();
    let embeddings = embed_in_batches(embedder, &texts, options.embedding_batch_size).await?;
    debug!(
        file_name,
        embedder = embedder.name(),
        vectors = embeddings.len(),
        "embeddings generated"
    );

    let index = VectorIndex::build(chunks, embeddings)?;
    Ok(KnowledgeBase { document, index })
}
