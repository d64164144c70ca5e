//! Cosine-similarity retrieval over clause embeddings
//!
//! The hot path of every question: exact cosine over the cached per-document
//! clause vectors, minimum-score cutoff, top-k truncation, order tie-break.

use std::sync::Arc;

use clauselens_config::constants::retrieval::MULTI_DOC_TOP_K;
use clauselens_core::ClauseRecord;

use crate::embeddings::EmbeddingBackend;
use crate::RagError;

/// Retrieval parameters
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub min_similarity: f64,
    /// Per-document ceiling when searching across a session's documents
    pub multi_doc_top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: clauselens_config::constants::retrieval::DEFAULT_TOP_K,
            min_similarity: clauselens_config::constants::retrieval::MIN_SIMILARITY,
            multi_doc_top_k: MULTI_DOC_TOP_K,
        }
    }
}

/// A clause with its similarity to the question
#[derive(Debug, Clone)]
pub struct ScoredClause {
    pub clause: ClauseRecord,
    pub similarity: f64,
}

/// Exact cosine similarity, clamped to [0, 1]. Zero-norm vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Rank clauses against a question embedding.
///
/// Clauses without embeddings are skipped. Results are sorted by similarity
/// descending with ties broken by ascending clause order, filtered by the
/// minimum similarity, and truncated to `top_k`.
pub fn rank_clauses(
    question_embedding: &[f32],
    clauses: &[ClauseRecord],
    top_k: usize,
    min_similarity: f64,
) -> Vec<ScoredClause> {
    let mut scored: Vec<ScoredClause> = clauses
        .iter()
        .filter_map(|clause| {
            let embedding = clause.embedding.as_ref()?;
            let similarity = cosine_similarity(question_embedding, embedding);
            (similarity >= min_similarity).then(|| ScoredClause {
                clause: clause.clone(),
                similarity,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.clause.order.cmp(&b.clause.order))
    });
    scored.truncate(top_k);
    scored
}

/// Retrieval engine
pub struct Retriever {
    embedder: Arc<dyn EmbeddingBackend>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, config: RetrieverConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, RagError> {
        self.embedder
            .embed_batch(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Search("empty question embedding".to_string()))
    }

    /// Top-k relevant clauses of one document
    pub async fn search(
        &self,
        question: &str,
        clauses: &[ClauseRecord],
    ) -> Result<Vec<ScoredClause>, RagError> {
        let question_embedding = self.embed_question(question).await?;
        let results = rank_clauses(
            &question_embedding,
            clauses,
            self.config.top_k,
            self.config.min_similarity,
        );
        tracing::debug!(
            candidates = clauses.len(),
            results = results.len(),
            "Similarity search complete"
        );
        Ok(results)
    }

    /// Search across several documents with a reduced per-document ceiling;
    /// results are concatenated in document order.
    pub async fn search_multi(
        &self,
        question: &str,
        documents: &[(String, Vec<ClauseRecord>)],
    ) -> Result<Vec<ScoredClause>, RagError> {
        let question_embedding = self.embed_question(question).await?;

        let mut all = Vec::new();
        for (doc_id, clauses) in documents {
            let results = rank_clauses(
                &question_embedding,
                clauses,
                self.config.multi_doc_top_k,
                self.config.min_similarity,
            );
            tracing::debug!(doc_id = %doc_id, results = results.len(), "Per-document search");
            all.extend(results);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clauselens_core::{ClauseCategory, ReadabilityMetrics, RiskLevel};

    fn clause(order: usize, embedding: Option<Vec<f32>>) -> ClauseRecord {
        ClauseRecord {
            clause_id: format!("d1_clause_{}", order - 1),
            doc_id: "d1".to_string(),
            order,
            original_text: String::new(),
            summary: String::new(),
            category: ClauseCategory::Other,
            risk_level: RiskLevel::Low,
            risk_score: 0.0,
            needs_review: false,
            readability_metrics: ReadabilityMetrics::default(),
            negotiation_tip: None,
            confidence: 0.5,
            processing_method: "llm".to_string(),
            embedding,
            detected_keywords: Vec::new(),
            risk_factors: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        // Opposite vectors clamp to 0
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        // Zero norm
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        // Mismatched lengths
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_sorted_descending_and_cutoff() {
        let question = vec![1.0f32, 0.0];
        let clauses = vec![
            clause(1, Some(vec![0.5, 0.5])),
            clause(2, Some(vec![1.0, 0.0])),
            clause(3, Some(vec![0.0, 1.0])),
            clause(4, None),
        ];

        let results = rank_clauses(&question, &clauses, 5, 0.2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].clause.order, 2);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for result in &results {
            assert!(result.similarity >= 0.2);
        }
    }

    #[test]
    fn test_rank_tie_break_by_order() {
        let question = vec![1.0f32, 0.0];
        let clauses = vec![
            clause(9, Some(vec![2.0, 0.0])),
            clause(1, Some(vec![1.0, 0.0])),
        ];
        let results = rank_clauses(&question, &clauses, 5, 0.0);
        // Identical similarity (both colinear): lowest order wins
        assert_eq!(results[0].clause.order, 1);
        assert_eq!(results[1].clause.order, 9);
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let question = vec![1.0f32, 0.0];
        let clauses: Vec<ClauseRecord> = (1..=10)
            .map(|i| clause(i, Some(vec![1.0, i as f32 * 0.01])))
            .collect();
        let results = rank_clauses(&question, &clauses, 5, 0.0);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_min_similarity_one_yields_empty_without_exact_match() {
        let question = vec![1.0f32, 0.0];
        let clauses = vec![clause(1, Some(vec![0.9, 0.1]))];
        let results = rank_clauses(&question, &clauses, 5, 1.0);
        assert!(results.is_empty());

        let exact = vec![clause(1, Some(vec![1.0, 0.0]))];
        let results = rank_clauses(&question, &exact, 5, 1.0);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_multi_applies_per_document_ceiling() {
        use crate::embeddings::SimpleEmbedder;

        let embedder = Arc::new(SimpleEmbedder::new(32));
        let retriever = Retriever::new(embedder.clone(), RetrieverConfig::default());

        // Give every clause the exact question embedding so all pass the cutoff
        let question = "termination rights";
        let question_embedding = embedder
            .embed_batch(&[question.to_string()])
            .await
            .unwrap()
            .remove(0);

        let make_doc = |doc: &str| {
            (
                doc.to_string(),
                (1..=5)
                    .map(|i| clause(i, Some(question_embedding.clone())))
                    .collect::<Vec<_>>(),
            )
        };
        let documents = vec![make_doc("d1"), make_doc("d2")];

        let results = retriever.search_multi(question, &documents).await.unwrap();
        // 3 per document, concatenated
        assert_eq!(results.len(), 6);
    }
}
