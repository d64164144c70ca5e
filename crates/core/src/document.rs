//! Document records and lifecycle

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document processing status.
///
/// `Completed` and `Failed` are terminal for a given ingestion attempt;
/// re-ingesting the same bytes creates a fresh document id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Whether a transition to `next` is allowed by the lifecycle state machine.
    ///
    /// Terminal states admit the identity transition (idempotent retries) and
    /// a reset to `processing` (a fresh ingestion attempt); they never jump
    /// directly to the other terminal state.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        match (self, next) {
            (DocumentStatus::Processing, _) => true,
            (_, DocumentStatus::Processing) => true,
            (DocumentStatus::Completed, DocumentStatus::Completed) => true,
            (DocumentStatus::Failed, DocumentStatus::Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

/// Summary of PII detected in a document: counts per PII type plus totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PiiSummary {
    pub total_pii_detected: usize,
    pub pii_types: HashMap<String, usize>,
    pub high_confidence_count: usize,
    pub avg_confidence: f32,
    pub masking_applied: bool,
}

/// Aggregated statistics stored on the document once processing completes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStatistics {
    pub total_clauses: usize,
    pub pii_detected: usize,
    pub high_risk_clauses: usize,
    pub avg_readability_improvement: f64,
    /// False when stage 10 failed and embeddings are absent
    pub embeddings_generated: bool,
}

/// Persisted document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub filename: String,
    pub file_size: usize,
    pub page_count: usize,
    pub status: DocumentStatus,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Whether PII was detected and masked
    pub masked: bool,
    pub session_id: Option<String>,
    pub clause_count: usize,
    #[serde(default)]
    pub pii_summary: Option<PiiSummary>,
    #[serde(default)]
    pub baseline_readability: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub processing_statistics: Option<ProcessingStatistics>,
    /// Document-level risk profile assembled after ingestion
    #[serde(default)]
    pub risk_profile: Option<serde_json::Value>,
    /// Stage index the pipeline failed at, if any
    #[serde(default)]
    pub failed_at_stage: Option<usize>,
    /// Error recorded when the pipeline failed
    #[serde(default)]
    pub error: Option<String>,
    /// Names of completed stages, in order
    #[serde(default)]
    pub stages_completed: Vec<String>,
}

impl DocumentRecord {
    /// New record in the `processing` state, created before ingestion is enqueued
    pub fn new(
        doc_id: impl Into<String>,
        filename: impl Into<String>,
        file_size: usize,
        session_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            doc_id: doc_id.into(),
            filename: filename.into(),
            file_size,
            page_count: 0,
            status: DocumentStatus::Processing,
            language: "en".to_string(),
            created_at: now,
            updated_at: now,
            processed_at: None,
            masked: false,
            session_id,
            clause_count: 0,
            pii_summary: None,
            baseline_readability: None,
            processing_statistics: None,
            risk_profile: None,
            failed_at_stage: None,
            error: None,
            stages_completed: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(DocumentStatus::Processing.can_transition_to(DocumentStatus::Completed));
        assert!(DocumentStatus::Processing.can_transition_to(DocumentStatus::Failed));
        // Terminal states never jump directly to the other terminal state
        assert!(!DocumentStatus::Completed.can_transition_to(DocumentStatus::Failed));
        assert!(!DocumentStatus::Failed.can_transition_to(DocumentStatus::Completed));
        // Identity transitions allow idempotent retries
        assert!(DocumentStatus::Completed.can_transition_to(DocumentStatus::Completed));
        // A fresh ingestion attempt may reset a terminal document
        assert!(DocumentStatus::Completed.can_transition_to(DocumentStatus::Processing));
        assert!(DocumentStatus::Failed.can_transition_to(DocumentStatus::Processing));
    }

    #[test]
    fn test_new_record_is_processing() {
        let doc = DocumentRecord::new("d1", "contract.pdf", 1024, None);
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.clause_count, 0);
        assert!(doc.stages_completed.is_empty());
    }
}
