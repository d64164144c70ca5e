//! The `DocumentStore` trait

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use clauselens_core::{
    ChatMessage, ChatSession, ClauseRecord, DocumentRecord, DocumentStatus, PiiSummary,
    ProcessingStatistics, QaHistoryRecord,
};

use crate::PersistenceError;

/// Fields a status update may set alongside the status itself.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub page_count: Option<usize>,
    pub language: Option<String>,
    pub masked: Option<bool>,
    pub pii_summary: Option<PiiSummary>,
    pub clause_count: Option<usize>,
    pub baseline_readability: Option<HashMap<String, f64>>,
    pub processing_statistics: Option<ProcessingStatistics>,
    pub risk_profile: Option<serde_json::Value>,
    pub failed_at_stage: Option<usize>,
    pub error: Option<String>,
    pub stages_completed: Option<Vec<String>>,
}

/// Client interface to the document store.
///
/// Status transitions are compare-then-update: the store checks the current
/// status against the lifecycle state machine before writing, so concurrent
/// writers cannot resurrect a terminal document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // Documents

    async fn create_document(&self, document: DocumentRecord) -> Result<(), PersistenceError>;

    async fn get_document(
        &self,
        doc_id: &str,
    ) -> Result<Option<DocumentRecord>, PersistenceError>;

    /// Update status and any patched fields. Fails with `DocumentNotFound`
    /// when the document does not exist and `IllegalTransition` when the
    /// state machine forbids the move.
    async fn update_document_status(
        &self,
        doc_id: &str,
        status: DocumentStatus,
        patch: DocumentPatch,
    ) -> Result<(), PersistenceError>;

    // Clauses

    /// Create clause records under a document, chunked to the store's batch
    /// limit. Returns the created clause ids in input order.
    async fn create_clauses(
        &self,
        doc_id: &str,
        clauses: Vec<ClauseRecord>,
    ) -> Result<Vec<String>, PersistenceError>;

    /// All clauses of a document, ordered by `order`
    async fn get_document_clauses(
        &self,
        doc_id: &str,
    ) -> Result<Vec<ClauseRecord>, PersistenceError>;

    async fn get_clause(
        &self,
        doc_id: &str,
        clause_id: &str,
    ) -> Result<Option<ClauseRecord>, PersistenceError>;

    /// Batch-update clause embeddings, chunked to the store's limit. All
    /// chunks are attempted; failures are reported afterwards as
    /// `EmbeddingPersist` with the failing chunk indices.
    async fn update_clause_embeddings(
        &self,
        doc_id: &str,
        embeddings: Vec<(String, Vec<f32>)>,
    ) -> Result<(), PersistenceError>;

    // Chat sessions

    async fn create_session(&self, session: ChatSession) -> Result<(), PersistenceError>;

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ChatSession>, PersistenceError>;

    async fn list_sessions(
        &self,
        limit: usize,
        include_archived: bool,
    ) -> Result<Vec<ChatSession>, PersistenceError>;

    /// Replace the stored session record (title, documents, archived flag,
    /// activity timestamp, message count)
    async fn update_session(&self, session: ChatSession) -> Result<(), PersistenceError>;

    /// Hard delete; cascades to the session's messages
    async fn delete_session(&self, session_id: &str) -> Result<(), PersistenceError>;

    async fn add_message(&self, message: ChatMessage) -> Result<(), PersistenceError>;

    /// All messages of a session in append order
    async fn get_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, PersistenceError>;

    // Q&A history

    async fn save_qa_history(&self, record: QaHistoryRecord) -> Result<(), PersistenceError>;

    /// Most recent records first
    async fn get_qa_history(
        &self,
        doc_id: &str,
        limit: usize,
    ) -> Result<Vec<QaHistoryRecord>, PersistenceError>;

    // Negotiations

    async fn save_negotiation(
        &self,
        negotiation_id: &str,
        data: serde_json::Value,
    ) -> Result<(), PersistenceError>;

    /// Negotiation records for a document (optionally one clause), newest
    /// first. Sorting happens client-side to avoid composite indices.
    async fn get_negotiations(
        &self,
        doc_id: &str,
        clause_id: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, PersistenceError>;

    /// Whether the store is reachable
    async fn health_check(&self) -> bool;
}
