use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{build_knowledge_base, KnowledgeBase};
use crate::metadata::MetadataLog;
use crate::synthesis::build_stuff_prompt;
use crate::traits::{AnswerSynthesizer, Embedder};
use crate::{
    ChatResponse, IngestError, IngestionOptions, SearchError, SearchQuery, SearchResult,
    UploadRecord, DEFAULT_TOP_K,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
enum IndexState {
    Empty,
    Indexing {
        file_name: String,
        previous: Option<Arc<KnowledgeBase>>,
    },
    Ready(Arc<KnowledgeBase>),
}

impl IndexState {
    fn committed(&self) -> Option<Arc<KnowledgeBase>> {
        match self {
            Self::Empty => None,
            Self::Indexing { previous, .. } => previous.clone(),
            Self::Ready(knowledge) => Some(Arc::clone(knowledge)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexStatus {
    Empty,
    Indexing {
        file_name: String,
    },
    Ready {
        file_name: String,
        document_id: String,
        chunk_count: usize,
        uploaded_at: DateTime<Utc>,
    },
}

/// Owns the live index for a session.
///
/// The index is swapped whole under a short write lock; readers clone the
/// `Arc` under a read lock and finish against that snapshot. Builds are
/// serialized and run outside the lock, so no query sees a partial index.
/// While a build runs, queries get the not-ready response; a failed or
/// abandoned build restores whatever was committed before it.
pub struct SessionCoordinator {
    state: RwLock<IndexState>,
    build_lock: Mutex<()>,
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn Embedder>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    metadata: Option<Arc<MetadataLog>>,
    options: IngestionOptions,
    top_k: usize,
}

impl SessionCoordinator {
    pub fn new(embedder: Arc<dyn Embedder>, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self {
            state: RwLock::new(IndexState::Empty),
            build_lock: Mutex::new(()),
            extractor: Arc::new(LopdfExtractor),
            embedder,
            synthesizer,
            metadata: None,
            options: IngestionOptions::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_metadata_log(mut self, metadata: Arc<MetadataLog>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_options(mut self, options: IngestionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn status(&self) -> IndexStatus {
        match &*self.read_state() {
            IndexState::Empty => IndexStatus::Empty,
            IndexState::Indexing { file_name, .. } => IndexStatus::Indexing {
                file_name: file_name.clone(),
            },
            IndexState::Ready(knowledge) => IndexStatus::Ready {
                file_name: knowledge.document.file_name.clone(),
                document_id: knowledge.document.document_id.clone(),
                chunk_count: knowledge.index.len(),
                uploaded_at: knowledge.document.uploaded_at,
            },
        }
    }

    /// Replaces the live index with one built from `bytes`.
    pub async fn ingest(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<KnowledgeBase>, IngestError> {
        let _build = self.build_lock.lock().await;
        let started = Instant::now();
        let guard = BuildGuard::begin(self, file_name);

        let built = build_knowledge_base(
            file_name,
            Arc::new(bytes),
            Arc::clone(&self.extractor),
            self.embedder.as_ref(),
            &self.options,
        )
        .await;

        match built {
            Ok(knowledge) => {
                let knowledge = Arc::new(knowledge);
                guard.commit(Arc::clone(&knowledge));
                info!(
                    file_name,
                    chunk_count = knowledge.index.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "knowledge base initialized"
                );
                self.record_upload(&knowledge).await;
                Ok(knowledge)
            }
            Err(error) => {
                drop(guard);
                warn!(file_name, %error, "pdf processing failed; previous index kept");
                Err(error)
            }
        }
    }

    pub async fn retrieve(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let knowledge = self.ready_snapshot()?;

        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed_query(&query.text).await?;
        let hits = knowledge.index.search(&query_vector, query.top_k)?;

        Ok(SearchResult {
            query: query.text.clone(),
            hits,
        })
    }

    /// Retrieves passages and asks the synthesizer, surfacing every failure.
    pub async fn answer(&self, question: &str) -> Result<String, SearchError> {
        let result = self
            .retrieve(&SearchQuery::new(question).with_top_k(self.top_k))
            .await?;
        let passages = result
            .hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>();
        let prompt = build_stuff_prompt(question, &passages);
        self.synthesizer.synthesize(&prompt).await
    }

    /// Always yields a reply: not-ready and failures become fixed messages.
    pub async fn respond(&self, question: &str) -> ChatResponse {
        match self.answer(question).await {
            Ok(answer) => ChatResponse::new(answer),
            Err(SearchError::NotReady(reason)) => {
                info!(%reason, "query rejected; no index available");
                ChatResponse::not_ready()
            }
            Err(error) => {
                error!(%error, "answer generation failed");
                ChatResponse::generation_failed()
            }
        }
    }

    fn ready_snapshot(&self) -> Result<Arc<KnowledgeBase>, SearchError> {
        match &*self.read_state() {
            IndexState::Ready(knowledge) => Ok(Arc::clone(knowledge)),
            IndexState::Empty => Err(SearchError::NotReady("no document uploaded".to_string())),
            IndexState::Indexing { file_name, .. } => Err(SearchError::NotReady(format!(
                "indexing {file_name} in progress"
            ))),
        }
    }

    async fn record_upload(&self, knowledge: &KnowledgeBase) {
        let Some(metadata) = self.metadata.clone() else {
            return;
        };
        let file_name = knowledge.document.file_name.clone();
        let record = UploadRecord {
            file_name: file_name.clone(),
            uploaded_at: knowledge.document.uploaded_at,
        };
        match tokio::task::spawn_blocking(move || metadata.record(&record)).await {
            Ok(Ok(())) => info!(file_name = %file_name, "stored pdf metadata"),
            Ok(Err(error)) => warn!(file_name = %file_name, %error, "failed to store pdf metadata"),
            Err(error) => warn!(file_name = %file_name, %error, "metadata task failed"),
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Puts the coordinator into `Indexing` and, unless committed, restores the
/// prior state on drop. Covers both failed builds and cancelled futures.
struct BuildGuard<'a> {
    coordinator: &'a SessionCoordinator,
    previous: Option<Arc<KnowledgeBase>>,
    committed: bool,
}

impl<'a> BuildGuard<'a> {
    fn begin(coordinator: &'a SessionCoordinator, file_name: &str) -> Self {
        let mut state = coordinator.write_state();
        let previous = state.committed();
        *state = IndexState::Indexing {
            file_name: file_name.to_string(),
            previous: previous.clone(),
        };
        drop(state);

        Self {
            coordinator,
            previous,
            committed: false,
        }
    }

    fn commit(mut self, knowledge: Arc<KnowledgeBase>) {
        *self.coordinator.write_state() = IndexState::Ready(knowledge);
        self.committed = true;
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        *self.coordinator.write_state() = match self.previous.take() {
            Some(previous) => IndexState::Ready(previous),
            None => IndexState::Empty,
        };
    }
}
