mod server;
#[cfg(test)]
mod test_support;
mod ws;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::{
    validate_ingestion, CharacterNgramEmbedder, Embedder, IngestionOptions, KnowledgeBase,
    MetadataLog, OpenAiEmbedder, OpenAiSynthesizer, ProviderConfig, SearchQuery,
    SessionCoordinator, DEFAULT_API_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the embedding and chat provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model used to synthesize answers
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling seed forwarded to the chat model
    #[arg(long, env = "CHAT_SEED")]
    seed: Option<u64>,

    /// Timeout for each provider request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    request_timeout_secs: u64,

    /// Where chunk embeddings come from
    #[arg(long, env = "EMBEDDING_BACKEND", value_enum, default_value_t = EmbeddingBackend::Openai)]
    embedding_backend: EmbeddingBackend,

    /// Texts sent per embedding request
    #[arg(long, env = "EMBEDDING_BATCH_SIZE", default_value = "64")]
    embedding_batch_size: usize,

    /// Maximum characters per chunk
    #[arg(long, env = "CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters repeated between consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    /// Preferred split boundary
    #[arg(long, env = "CHUNK_SEPARATOR", default_value = "\n")]
    separator: String,

    /// Passages retrieved per question
    #[arg(long, env = "TOP_K", default_value = "4")]
    top_k: usize,

    /// SQLite file for the upload audit log
    #[arg(long, env = "METADATA_DB", default_value = "pdf_metadata.db")]
    metadata_db: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbeddingBackend {
    /// OpenAI-compatible embeddings endpoint.
    Openai,
    /// Local character n-gram hashing; no network.
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload endpoint and the WebSocket query session.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
    /// Index one PDF and answer a single question about it.
    Ask {
        /// PDF file to index.
        #[arg(long)]
        pdf: PathBuf,
        /// Question to answer.
        #[arg(long)]
        question: String,
        /// Print the retrieved passages before the answer.
        #[arg(long, default_value_t = false)]
        show_passages: bool,
    },
    /// Print the most recent uploads from the audit log.
    History {
        /// Number of entries to show.
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

impl Cli {
    fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separator: self.separator.clone(),
            embedding_batch_size: self.embedding_batch_size,
        }
    }

    fn provider_config(&self) -> anyhow::Result<ProviderConfig> {
        let config = ProviderConfig::new(self.api_key.clone(), &self.api_base_url)
            .context("provider configuration")?
            .with_embedding_model(&self.embedding_model)
            .with_chat_model(&self.chat_model)
            .with_seed(self.seed)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs));
        Ok(config)
    }

    fn coordinator(&self, metadata: Option<Arc<MetadataLog>>) -> anyhow::Result<SessionCoordinator> {
        let provider = self.provider_config()?;
        let options = self.ingestion_options();
        validate_ingestion(&options).context("ingestion configuration")?;

        let embedder: Arc<dyn Embedder> = match self.embedding_backend {
            EmbeddingBackend::Openai => Arc::new(OpenAiEmbedder::new(provider.clone())?),
            EmbeddingBackend::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        };
        let synthesizer = Arc::new(OpenAiSynthesizer::new(provider)?);

        info!(
            embedder = embedder.name(),
            chat_model = %self.chat_model,
            chunk_size = options.chunk_size,
            chunk_overlap = options.chunk_overlap,
            top_k = self.top_k,
            "API key loaded and providers configured"
        );

        let mut coordinator = SessionCoordinator::new(embedder, synthesizer)
            .with_options(options)
            .with_top_k(self.top_k);
        if let Some(metadata) = metadata {
            coordinator = coordinator.with_metadata_log(metadata);
        }
        Ok(coordinator)
    }
}

async fn index_pdf(
    coordinator: &SessionCoordinator,
    pdf: &Path,
) -> anyhow::Result<Arc<KnowledgeBase>> {
    let bytes = tokio::fs::read(pdf)
        .await
        .with_context(|| format!("reading {}", pdf.display()))?;
    let file_name = pdf
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf")
        .to_string();

    coordinator
        .ingest(&file_name, bytes)
        .await
        .with_context(|| format!("indexing {}", pdf.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match &cli.command {
        Command::Serve { bind } => {
            let metadata = Arc::new(
                MetadataLog::open(&cli.metadata_db)
                    .with_context(|| format!("opening {}", cli.metadata_db.display()))?,
            );
            let coordinator = Arc::new(cli.coordinator(Some(metadata))?);
            server::serve(*bind, coordinator).await?;
        }
        Command::Ask {
            pdf,
            question,
            show_passages,
        } => {
            let coordinator = cli.coordinator(None)?;
            let knowledge = index_pdf(&coordinator, pdf).await?;
            println!(
                "{} indexed: {} chunk(s) from {} page(s)",
                knowledge.document.file_name,
                knowledge.index.len(),
                knowledge.document.page_count
            );

            if *show_passages {
                let result = coordinator
                    .retrieve(&SearchQuery::new(question.clone()).with_top_k(cli.top_k))
                    .await
                    .context("retrieving passages")?;
                for hit in &result.hits {
                    println!(
                        "[chunk {}] distance={:.4}\n{}",
                        hit.chunk_index, hit.distance, hit.text
                    );
                }
            }

            let reply = coordinator.respond(question).await;
            println!("answer: {}", reply.response);
        }
        Command::History { limit } => {
            let metadata = MetadataLog::open(&cli.metadata_db)
                .with_context(|| format!("opening {}", cli.metadata_db.display()))?;
            let history = metadata.history(*limit)?;
            if history.is_empty() {
                println!("no uploads recorded in {}", cli.metadata_db.display());
            }
            for entry in history {
                println!("{}  {}", entry.uploaded_at.to_rfc3339(), entry.file_name);
            }
        }
    }

    Ok(())
}
