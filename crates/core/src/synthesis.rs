use crate::config::ProviderConfig;
use crate::traits::AnswerSynthesizer;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const STUFF_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Renders the question and passages, verbatim and in the given order, into one prompt.
pub fn build_stuff_prompt<S: AsRef<str>>(question: &str, passages: &[S]) -> String {
    let context = passages
        .iter()
        .map(|passage| passage.as_ref())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{STUFF_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiSynthesizer {
    config: ProviderConfig,
    client: Client,
}

impl OpenAiSynthesizer {
    pub fn new(config: ProviderConfig) -> Result<Self, SearchError> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, prompt: &str) -> Result<String, SearchError> {
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            seed: self.config.seed,
        };

        let response = self
            .client
            .post(self.config.endpoint("chat/completions")?)
            .bearer_auth(self.config.api_key())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::BackendResponse {
                backend: "openai".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let payload: ChatCompletionResponse = response.json().await?;
        debug!(choices = payload.choices.len(), model = %self.config.chat_model, "completion returned");
        first_answer(payload)
    }
}

fn first_answer(payload: ChatCompletionResponse) -> Result<String, SearchError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| SearchError::Synthesis("completion had no answer text".to_string()))
}
