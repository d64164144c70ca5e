//! Application state
//!
//! Shared singletons wired from settings: document store, LLM and embedding
//! backends, clause cache, retriever, orchestrator, responder, analytics.
//! Every collaborator has a `with_*` construction hook so tests can
//! substitute fakes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use clauselens_agent::{ConversationMemory, MemoryConfig, QaConfig, QaResponder};
use clauselens_analytics::{AnalyticsPublisher, EventBus, HttpEventBus, HttpEventBusConfig};
use clauselens_config::Settings;
use clauselens_core::Error;
use clauselens_llm::{BatchConfig, BatchSummarizer, HttpLlmBackend, HttpLlmConfig, LlmBackend};
use clauselens_persistence::{DocumentStore, HttpStore, HttpStoreConfig, InMemoryStore};
use clauselens_pipeline::{
    DocumentExtractor, ExtractorConfig, HttpLayoutExtractor, HttpLayoutExtractorConfig,
    IngestionOrchestrator, OrchestratorConfig, SemanticEmbedder,
};
use clauselens_rag::{
    ClauseCache, EmbeddingBackend, EmbeddingConfig, EmbeddingIndexer, HttpEmbeddingBackend,
    Retriever, RetrieverConfig,
};
use clauselens_text_processing::{
    CategoryClassifier, ClassifierConfig, ClauseSegmenter, HttpScanner, HttpScannerConfig,
    PiiRedactor, SegmenterConfig, SemanticClassifier,
};

/// Overridable collaborators, resolved before the state is assembled
#[derive(Default)]
pub struct StateOverrides {
    pub store: Option<Arc<dyn DocumentStore>>,
    pub llm: Option<Arc<dyn LlmBackend>>,
    pub embedder: Option<Arc<dyn EmbeddingBackend>>,
    pub bus: Option<Arc<dyn EventBus>>,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<ClauseCache>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub responder: Arc<QaResponder>,
    pub memory: Arc<ConversationMemory>,
    pub analytics: Option<Arc<AnalyticsPublisher>>,
}

impl AppState {
    /// Wire state from settings with the production collaborators
    pub fn from_settings(settings: Settings) -> Result<Self, Error> {
        Self::build(settings, StateOverrides::default())
    }

    /// Wire state with specific collaborators substituted (tests)
    pub fn build(settings: Settings, overrides: StateOverrides) -> Result<Self, Error> {
        let store: Arc<dyn DocumentStore> = match overrides.store {
            Some(store) => store,
            None if settings.store.enabled => Arc::new(
                HttpStore::new(HttpStoreConfig {
                    base_url: settings.store.base_url.clone(),
                    project_id: settings.store.project_id.clone(),
                    timeout: Duration::from_secs(settings.store.timeout_secs),
                })
                .map_err(Error::from)?,
            ),
            None => {
                tracing::info!("Document store disabled, using in-memory store");
                Arc::new(InMemoryStore::new())
            },
        };

        let llm: Arc<dyn LlmBackend> = match overrides.llm {
            Some(llm) => llm,
            None => Arc::new(
                HttpLlmBackend::new(HttpLlmConfig {
                    model: settings.llm.model.clone(),
                    endpoint: settings.llm.endpoint.clone(),
                    api_key: settings.llm.api_key.clone(),
                    timeout: Duration::from_secs(settings.llm.timeout_secs),
                    generation: clauselens_llm::GenerationConfig {
                        max_output_tokens: settings.llm.max_output_tokens,
                        ..Default::default()
                    },
                })
                .map_err(Error::from)?,
            ),
        };

        let embedder: Arc<dyn EmbeddingBackend> = match overrides.embedder {
            Some(embedder) => embedder,
            None => Arc::new(
                HttpEmbeddingBackend::new(EmbeddingConfig {
                    model: settings.embeddings.model.clone(),
                    endpoint: settings.embeddings.endpoint.clone(),
                    api_key: settings.embeddings.api_key.clone(),
                    dimension: settings.embeddings.dimension,
                    batch_size: settings.embeddings.batch_size,
                    timeout: Duration::from_secs(30),
                })
                .map_err(Error::from)?,
            ),
        };

        let analytics = if settings.analytics.enabled || overrides.bus.is_some() {
            let bus: Arc<dyn EventBus> = match overrides.bus {
                Some(bus) => bus,
                None => Arc::new(
                    HttpEventBus::new(HttpEventBusConfig {
                        endpoint: settings.analytics.bus_endpoint.clone(),
                        topic: settings.analytics.topic.clone(),
                        timeout: Duration::from_secs(10),
                    })
                    .map_err(Error::from)?,
                ),
            };
            Some(Arc::new(AnalyticsPublisher::new(bus)))
        } else {
            None
        };

        let cache = Arc::new(ClauseCache::new(Duration::from_secs(settings.cache.ttl_secs)));
        cache
            .clone()
            .spawn_sweeper(clauselens_config::constants::cache::SWEEP_INTERVAL);

        let indexer = Arc::new(EmbeddingIndexer::new(embedder.clone(), store.clone()));
        let retriever = Arc::new(Retriever::new(
            embedder.clone(),
            RetrieverConfig {
                top_k: settings.retrieval.top_k,
                min_similarity: settings.retrieval.min_similarity,
                ..Default::default()
            },
        ));

        let memory = Arc::new(
            ConversationMemory::new(store.clone(), MemoryConfig::default())
                .with_summarizer(llm.clone()),
        );

        let mut responder = QaResponder::new(
            store.clone(),
            cache.clone(),
            retriever,
            indexer.clone(),
            llm.clone(),
            memory.clone(),
            QaConfig {
                cache_ttl: Duration::from_secs(settings.cache.ttl_secs),
                ..Default::default()
            },
        );
        if let Some(analytics) = &analytics {
            responder = responder.with_analytics(analytics.clone());
        }
        let responder = Arc::new(responder);

        let mut extractor = DocumentExtractor::new(ExtractorConfig {
            max_file_size_bytes: settings.limits.max_file_size_bytes(),
            max_pages: settings.limits.max_pages,
        });
        if settings.extractor.enabled {
            extractor = extractor.with_layout_extractor(Arc::new(
                HttpLayoutExtractor::new(HttpLayoutExtractorConfig {
                    endpoint: settings.extractor.endpoint.clone(),
                    timeout: Duration::from_secs(120),
                })
                .map_err(Error::from)?,
            ));
        }

        let redactor = if settings.privacy.scanner_enabled {
            let scanner = HttpScanner::new(HttpScannerConfig {
                endpoint: settings.privacy.scanner_endpoint.clone(),
                timeout: Duration::from_secs(30),
            })
            .map_err(Error::from)?;
            PiiRedactor::with_scanner(Arc::new(scanner))
        } else {
            PiiRedactor::new()
        };

        let classifier_config = ClassifierConfig::default();
        let semantic_threshold = classifier_config.semantic_threshold;
        let classifier = CategoryClassifier::new(classifier_config).with_semantic(
            SemanticClassifier::new(
                Arc::new(SemanticEmbedder::new(embedder.clone())),
                semantic_threshold,
            ),
        );

        let summarizer = BatchSummarizer::new(
            llm.clone(),
            BatchConfig {
                max_clauses_per_batch: settings.llm.max_clauses_per_batch,
                max_prompt_tokens: settings.llm.max_prompt_tokens,
                ..Default::default()
            },
        );

        let mut orchestrator = IngestionOrchestrator::new(
            extractor,
            redactor,
            ClauseSegmenter::new(SegmenterConfig::default()),
            classifier,
            summarizer,
            EmbeddingIndexer::new(embedder.clone(), store.clone()),
            store.clone(),
            OrchestratorConfig::default(),
        );
        if let Some(analytics) = &analytics {
            orchestrator = orchestrator.with_analytics(analytics.clone());
        }

        Ok(Self {
            config: Arc::new(RwLock::new(settings)),
            store,
            cache,
            orchestrator: Arc::new(orchestrator),
            responder,
            memory,
            analytics,
        })
    }

    /// Flush outbound work before process exit
    pub async fn shutdown(&self) {
        if let Some(analytics) = &self.analytics {
            analytics.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_state_builds() {
        let state = AppState::from_settings(Settings::default()).unwrap();
        assert!(state.analytics.is_none());
        assert!(state.store.health_check().await);
    }
}
