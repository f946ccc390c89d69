use crate::SearchError;
use async_trait::async_trait;

/// Maps text to fixed-length vectors. One vector per input, same order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SearchError::BackendResponse {
            backend: self.name().to_string(),
            details: "no embedding returned for query".to_string(),
        })
    }
}

/// Turns a fully rendered prompt into an answer.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<String, SearchError>;
}
