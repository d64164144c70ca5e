//! Embedding indexer
//!
//! Embeds clause summaries in batches and persists the vectors through the
//! store's chunked batch-update. Clauses whose embeddings fail to generate
//! keep a null embedding and remain queryable otherwise.

use std::sync::Arc;

use clauselens_core::ClauseRecord;
use clauselens_persistence::{DocumentStore, PersistenceError};

use crate::embeddings::EmbeddingBackend;
use crate::RagError;

/// Embedding indexer
pub struct EmbeddingIndexer {
    embedder: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn DocumentStore>,
}

impl EmbeddingIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }

    /// Generate and persist embeddings for the given clauses.
    ///
    /// The embedded text is the summary, falling back to the original text.
    /// Vectors of the wrong dimension are rejected before they reach the
    /// store. Returns how many clauses were embedded.
    pub async fn index(
        &self,
        doc_id: &str,
        clauses: &[ClauseRecord],
    ) -> Result<usize, RagError> {
        let mut texts = Vec::new();
        let mut clause_ids = Vec::new();
        for clause in clauses {
            let text = if clause.summary.trim().is_empty() {
                clause.original_text.as_str()
            } else {
                clause.summary.as_str()
            };
            if !text.trim().is_empty() {
                texts.push(text.to_string());
                clause_ids.push(clause.clause_id.clone());
            }
        }

        if texts.is_empty() {
            tracing::warn!(doc_id, "No embeddable text in clauses");
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(&texts).await?;
        let expected = self.embedder.dimension();

        let mut updates = Vec::with_capacity(embeddings.len());
        for (clause_id, embedding) in clause_ids.into_iter().zip(embeddings) {
            if embedding.len() != expected {
                // Leave this clause's embedding null rather than persist a
                // vector the retriever cannot compare
                tracing::error!(
                    doc_id,
                    clause_id = %clause_id,
                    got = embedding.len(),
                    expected,
                    "Dropping embedding with wrong dimension"
                );
                continue;
            }
            updates.push((clause_id, embedding));
        }

        let count = updates.len();
        if count == 0 {
            return Ok(0);
        }

        self.store
            .update_clause_embeddings(doc_id, updates)
            .await
            .map_err(|e| match e {
                PersistenceError::EmbeddingPersist { .. } => RagError::Persist(e.to_string()),
                other => RagError::Persist(other.to_string()),
            })?;

        tracing::info!(doc_id, count, "Embeddings generated and persisted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use clauselens_core::{
        ClauseCategory, DocumentRecord, ReadabilityMetrics, RiskLevel,
    };
    use clauselens_persistence::InMemoryStore;
    use crate::embeddings::SimpleEmbedder;

    fn clause(doc_id: &str, order: usize, summary: &str) -> ClauseRecord {
        ClauseRecord {
            clause_id: ClauseRecord::make_id(doc_id, order - 1),
            doc_id: doc_id.to_string(),
            order,
            original_text: format!("original text {}", order),
            summary: summary.to_string(),
            category: ClauseCategory::Other,
            risk_level: RiskLevel::Low,
            risk_score: 0.0,
            needs_review: false,
            readability_metrics: ReadabilityMetrics::default(),
            negotiation_tip: None,
            confidence: 0.5,
            processing_method: "llm".to_string(),
            embedding: None,
            detected_keywords: Vec::new(),
            risk_factors: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: Default::default(),
        }
    }

    async fn seeded_store(doc_id: &str, clauses: Vec<ClauseRecord>) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_document(DocumentRecord::new(doc_id, "a.pdf", 10, None))
            .await
            .unwrap();
        store.create_clauses(doc_id, clauses).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_index_persists_vectors_of_fixed_dimension() {
        let clauses = vec![clause("d1", 1, "You can cancel."), clause("d1", 2, "")];
        let store = seeded_store("d1", clauses.clone()).await;
        let indexer = EmbeddingIndexer::new(Arc::new(SimpleEmbedder::new(32)), store.clone());

        let count = indexer.index("d1", &clauses).await.unwrap();
        assert_eq!(count, 2);

        let stored = store.get_document_clauses("d1").await.unwrap();
        for clause in stored {
            let embedding = clause.embedding.expect("embedding persisted");
            assert_eq!(embedding.len(), 32);
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingBackend for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Err(RagError::Embedding("provider unavailable".to_string()))
        }

        fn dimension(&self) -> usize {
            32
        }
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let clauses = vec![clause("d1", 1, "summary")];
        let store = seeded_store("d1", clauses.clone()).await;
        let indexer = EmbeddingIndexer::new(Arc::new(FailingEmbedder), store.clone());

        assert!(indexer.index("d1", &clauses).await.is_err());
        // Clause remains queryable with a null embedding
        let stored = store.get_document_clauses("d1").await.unwrap();
        assert!(stored[0].embedding.is_none());
    }

    struct WrongDimensionEmbedder;

    #[async_trait]
    impl EmbeddingBackend for WrongDimensionEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts.iter().map(|_| vec![1.0f32; 7]).collect())
        }

        fn dimension(&self) -> usize {
            32
        }
    }

    #[tokio::test]
    async fn test_wrong_dimension_vectors_never_persisted() {
        let clauses = vec![clause("d1", 1, "summary")];
        let store = seeded_store("d1", clauses.clone()).await;
        let indexer = EmbeddingIndexer::new(Arc::new(WrongDimensionEmbedder), store.clone());

        let count = indexer.index("d1", &clauses).await.unwrap();
        assert_eq!(count, 0);
        let stored = store.get_document_clauses("d1").await.unwrap();
        assert!(stored[0].embedding.is_none());
    }
}
