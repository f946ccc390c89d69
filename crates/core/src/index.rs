use crate::error::IngestError;
use crate::models::{PdfChunk, SearchCandidate};
use crate::SearchError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk: PdfChunk,
    pub embedding: Vec<f32>,
}

/// Immutable in-memory chunk index searched by cosine distance.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
}

impl VectorIndex {
    /// Pairs chunks with their embeddings. Fails unless there is at least one
    /// chunk, exactly one embedding per chunk, and a single dimension.
    pub fn build(chunks: Vec<PdfChunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, IngestError> {
        if chunks.is_empty() {
            return Err(IngestError::InvalidArgument(
                "index requires at least one chunk".to_string(),
            ));
        }

        if chunks.len() != embeddings.len() {
            return Err(IngestError::Embedding(SearchError::BackendResponse {
                backend: "embedder".to_string(),
                details: format!(
                    "embedding count {} doesn't match chunk count {}",
                    embeddings.len(),
                    chunks.len()
                ),
            }));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err(IngestError::Embedding(SearchError::BackendResponse {
                backend: "embedder".to_string(),
                details: "embedding has zero dimensions".to_string(),
            }));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                if embedding.len() != dimensions {
                    return Err(IngestError::Embedding(SearchError::BackendResponse {
                        backend: "embedder".to_string(),
                        details: format!(
                            "embedding dimension {} != {} for chunk {}",
                            embedding.len(),
                            dimensions,
                            chunk.chunk_index
                        ),
                    }));
                }
                Ok(IndexedChunk { chunk, embedding })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// The `top_k` closest chunks, nearest first, ties in chunk order.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        if query_vector.len() != self.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored = self
            .entries
            .iter()
            .map(|entry| (cosine_distance(query_vector, &entry.embedding), entry))
            .collect::<Vec<_>>();

        scored.sort_by(|(left_distance, left), (right_distance, right)| {
            left_distance
                .total_cmp(right_distance)
                .then(left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, entry)| SearchCandidate {
                chunk_id: entry.chunk.chunk_id.clone(),
                chunk_index: entry.chunk.chunk_index,
                distance,
                text: entry.chunk.text.clone(),
            })
            .collect())
    }
}

/// `1 - cos(a, b)`; a zero vector is at distance 1 from everything.
pub fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut left_norm = 0f32;
    let mut right_norm = 0f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }

    1.0 - dot / (left_norm.sqrt() * right_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64) -> PdfChunk {
        PdfChunk {
            chunk_id: format!("chunk-{index}"),
            document_id: "doc".to_string(),
            chunk_index: index,
            overlap: 0,
            text: format!("text {index}"),
        }
    }

    fn five_chunk_index() -> VectorIndex {
        let chunks = (0..5).map(chunk).collect();
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![0.0, 1.0, 1.0],
        ];
        VectorIndex::build(chunks, embeddings).expect("valid index")
    }

    #[test]
    fn nearest_chunk_is_returned_first() {
        let index = five_chunk_index();
        let hits = index.search(&[0.1, 0.05, 0.9], 4).expect("dims match");

        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].chunk_index, 2);
        assert_eq!(hits[0].text, "text 2");
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn ties_keep_chunk_order() {
        let chunks = (0..3).map(chunk).collect();
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        let index = VectorIndex::build(chunks, embeddings).expect("valid index");

        let hits = index.search(&[2.0, 0.0], 3).expect("dims match");
        let order = hits.iter().map(|hit| hit.chunk_index).collect::<Vec<_>>();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn small_index_returns_everything() {
        let index = five_chunk_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 10).expect("dims match");
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn build_rejects_missing_or_ragged_embeddings() {
        assert!(matches!(
            VectorIndex::build(vec![chunk(0), chunk(1)], vec![vec![1.0]]),
            Err(IngestError::Embedding(_))
        ));
        assert!(matches!(
            VectorIndex::build(vec![chunk(0), chunk(1)], vec![vec![1.0], vec![1.0, 2.0]]),
            Err(IngestError::Embedding(_))
        ));
        assert!(VectorIndex::build(Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn query_dimension_mismatch_is_rejected() {
        let index = five_chunk_index();
        assert!(matches!(
            index.search(&[1.0, 0.0], 2),
            Err(SearchError::Request(_))
        ));
    }

    #[test]
    fn cosine_distance_handles_zero_vectors() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!(cosine_distance(&[1.0, 0.0], &[3.0, 0.0]).abs() < 1e-6);
    }
}
