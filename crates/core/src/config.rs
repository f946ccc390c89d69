use crate::chunking::ChunkingConfig;
use crate::error::{ConfigError, SearchError};
use crate::models::IngestionOptions;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Credential and endpoint settings for the embedding and chat provider.
///
/// Built once at startup and handed to each provider; nothing below this
/// type reads the environment.
#[derive(Clone)]
pub struct ProviderConfig {
    api_key: String,
    base_url: Url,
    pub embedding_model: String,
    pub chat_model: String,
    pub seed: Option<u64>,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(api_key: Option<String>, base_url: &str) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingCredential("OPENAI_API_KEY"))?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            api_key,
            base_url,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            seed: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, SearchError> {
        Ok(self.base_url.join(path)?)
    }

    pub fn http_client(&self) -> Result<reqwest::Client, SearchError> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .field("seed", &self.seed)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Startup check for ingestion settings.
pub fn validate_ingestion(options: &IngestionOptions) -> Result<(), ConfigError> {
    ChunkingConfig::from(options)
        .validate()
        .map_err(|error| ConfigError::InvalidChunking(error.to_string()))?;
    if options.embedding_batch_size == 0 {
        return Err(ConfigError::InvalidChunking(
            "embedding_batch_size must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ingestion_options_are_valid() {
        assert!(validate_ingestion(&IngestionOptions::default()).is_ok());
        let broken = IngestionOptions {
            chunk_overlap: 1_000,
            ..IngestionOptions::default()
        };
        assert!(matches!(
            validate_ingestion(&broken),
            Err(ConfigError::InvalidChunking(_))
        ));
    }

    #[test]
    fn missing_or_blank_credential_is_rejected() {
        assert!(matches!(
            ProviderConfig::new(None, DEFAULT_API_BASE_URL),
            Err(ConfigError::MissingCredential(_))
        ));
        assert!(matches!(
            ProviderConfig::new(Some("   ".to_string()), DEFAULT_API_BASE_URL),
            Err(ConfigError::MissingCredential(_))
        ));
    }

    #[test]
    fn endpoints_keep_the_versioned_base_path() {
        let config = ProviderConfig::new(Some("sk-test".to_string()), DEFAULT_API_BASE_URL)
            .expect("valid config");
        let url = config.endpoint("embeddings").expect("joinable");
        assert_eq!(url.as_str(), "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = ProviderConfig::new(Some("sk-secret".to_string()), DEFAULT_API_BASE_URL)
            .expect("valid config");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        assert!(matches!(
            ProviderConfig::new(Some("sk".to_string()), "not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }
}
