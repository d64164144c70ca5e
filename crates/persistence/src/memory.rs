//! In-memory store for tests and local development

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use clauselens_core::{
    ChatMessage, ChatSession, ClauseRecord, DocumentRecord, DocumentStatus, QaHistoryRecord,
};

use crate::store::{DocumentPatch, DocumentStore};
use crate::PersistenceError;

/// In-process `DocumentStore`.
///
/// Mirrors the HTTP store's semantics, including the status state machine,
/// so tests exercise the same contract the real service enforces.
#[derive(Default)]
pub struct InMemoryStore {
    documents: DashMap<String, DocumentRecord>,
    /// doc_id -> clauses
    clauses: DashMap<String, Vec<ClauseRecord>>,
    sessions: DashMap<String, ChatSession>,
    /// session_id -> messages in append order
    messages: DashMap<String, Vec<ChatMessage>>,
    qa_history: DashMap<String, QaHistoryRecord>,
    negotiations: DashMap<String, serde_json::Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(&self, document: DocumentRecord) -> Result<(), PersistenceError> {
        self.documents.insert(document.doc_id.clone(), document);
        Ok(())
    }

    async fn get_document(
        &self,
        doc_id: &str,
    ) -> Result<Option<DocumentRecord>, PersistenceError> {
        Ok(self.documents.get(doc_id).map(|d| d.clone()))
    }

    async fn update_document_status(
        &self,
        doc_id: &str,
        status: DocumentStatus,
        patch: DocumentPatch,
    ) -> Result<(), PersistenceError> {
        let mut entry = self
            .documents
            .get_mut(doc_id)
            .ok_or_else(|| PersistenceError::DocumentNotFound(doc_id.to_string()))?;

        if !entry.status.can_transition_to(status) {
            return Err(PersistenceError::IllegalTransition(format!(
                "{} -> {} for document {}",
                entry.status.as_str(),
                status.as_str(),
                doc_id
            )));
        }

        entry.status = status;
        entry.updated_at = Utc::now();
        if status == DocumentStatus::Completed {
            entry.processed_at = Some(Utc::now());
        }

        apply_patch(&mut entry, patch);
        Ok(())
    }

    async fn create_clauses(
        &self,
        doc_id: &str,
        clauses: Vec<ClauseRecord>,
    ) -> Result<Vec<String>, PersistenceError> {
        // Writes are keyed by clause_id, so re-running a stage replaces
        // rather than duplicates.
        let ids: Vec<String> = clauses.iter().map(|c| c.clause_id.clone()).collect();
        let mut stored = self.clauses.entry(doc_id.to_string()).or_default();
        for clause in clauses {
            match stored.iter_mut().find(|c| c.clause_id == clause.clause_id) {
                Some(existing) => *existing = clause,
                None => stored.push(clause),
            }
        }
        stored.sort_by_key(|c| c.order);
        drop(stored);

        if let Some(mut doc) = self.documents.get_mut(doc_id) {
            doc.clause_count = ids.len();
            doc.updated_at = Utc::now();
        }

        Ok(ids)
    }

    async fn get_document_clauses(
        &self,
        doc_id: &str,
    ) -> Result<Vec<ClauseRecord>, PersistenceError> {
        let mut clauses = self
            .clauses
            .get(doc_id)
            .map(|c| c.clone())
            .unwrap_or_default();
        clauses.sort_by_key(|c| c.order);
        Ok(clauses)
    }

    async fn get_clause(
        &self,
        doc_id: &str,
        clause_id: &str,
    ) -> Result<Option<ClauseRecord>, PersistenceError> {
        Ok(self
            .clauses
            .get(doc_id)
            .and_then(|clauses| clauses.iter().find(|c| c.clause_id == clause_id).cloned()))
    }

    async fn update_clause_embeddings(
        &self,
        doc_id: &str,
        embeddings: Vec<(String, Vec<f32>)>,
    ) -> Result<(), PersistenceError> {
        let mut stored = self
            .clauses
            .get_mut(doc_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("document {}", doc_id)))?;

        for (clause_id, embedding) in embeddings {
            if let Some(clause) = stored.iter_mut().find(|c| c.clause_id == clause_id) {
                clause.embedding = Some(embedding);
                clause.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn create_session(&self, session: ChatSession) -> Result<(), PersistenceError> {
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ChatSession>, PersistenceError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn list_sessions(
        &self,
        limit: usize,
        include_archived: bool,
    ) -> Result<Vec<ChatSession>, PersistenceError> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .iter()
            .map(|s| s.clone())
            .filter(|s| include_archived || !s.archived)
            .collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn update_session(&self, session: ChatSession) -> Result<(), PersistenceError> {
        if !self.sessions.contains_key(&session.session_id) {
            return Err(PersistenceError::NotFound(format!(
                "session {}",
                session.session_id
            )));
        }
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), PersistenceError> {
        self.sessions.remove(session_id);
        self.messages.remove(session_id);
        Ok(())
    }

    async fn add_message(&self, message: ChatMessage) -> Result<(), PersistenceError> {
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn get_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, PersistenceError> {
        Ok(self
            .messages
            .get(session_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    async fn save_qa_history(&self, record: QaHistoryRecord) -> Result<(), PersistenceError> {
        self.qa_history.insert(record.qa_id.clone(), record);
        Ok(())
    }

    async fn get_qa_history(
        &self,
        doc_id: &str,
        limit: usize,
    ) -> Result<Vec<QaHistoryRecord>, PersistenceError> {
        let mut records: Vec<QaHistoryRecord> = self
            .qa_history
            .iter()
            .map(|r| r.clone())
            .filter(|r| r.doc_id == doc_id)
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    async fn save_negotiation(
        &self,
        negotiation_id: &str,
        mut data: serde_json::Value,
    ) -> Result<(), PersistenceError> {
        if let Some(object) = data.as_object_mut() {
            object
                .entry("created_at")
                .or_insert_with(|| serde_json::json!(Utc::now().to_rfc3339()));
            object.insert(
                "negotiation_id".to_string(),
                serde_json::json!(negotiation_id),
            );
        }
        self.negotiations.insert(negotiation_id.to_string(), data);
        Ok(())
    }

    async fn get_negotiations(
        &self,
        doc_id: &str,
        clause_id: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, PersistenceError> {
        let mut records: Vec<serde_json::Value> = self
            .negotiations
            .iter()
            .map(|r| r.clone())
            .filter(|r| r["doc_id"] == doc_id)
            .filter(|r| clause_id.map_or(true, |id| r["clause_id"] == id))
            .collect();
        // Client-side sort, newest first
        records.sort_by(|a, b| {
            let key = |v: &serde_json::Value| v["created_at"].as_str().map(str::to_string);
            key(b).cmp(&key(a))
        });
        Ok(records)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn apply_patch(document: &mut DocumentRecord, patch: DocumentPatch) {
    if let Some(page_count) = patch.page_count {
        document.page_count = page_count;
    }
    if let Some(language) = patch.language {
        document.language = language;
    }
    if let Some(masked) = patch.masked {
        document.masked = masked;
    }
    if let Some(pii_summary) = patch.pii_summary {
        document.pii_summary = Some(pii_summary);
    }
    if let Some(clause_count) = patch.clause_count {
        document.clause_count = clause_count;
    }
    if let Some(baseline) = patch.baseline_readability {
        document.baseline_readability = Some(baseline);
    }
    if let Some(stats) = patch.processing_statistics {
        document.processing_statistics = Some(stats);
    }
    if let Some(profile) = patch.risk_profile {
        document.risk_profile = Some(profile);
    }
    if let Some(stage) = patch.failed_at_stage {
        document.failed_at_stage = Some(stage);
    }
    if let Some(error) = patch.error {
        document.error = Some(error);
    }
    if let Some(stages) = patch.stages_completed {
        document.stages_completed = stages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauselens_core::{ClauseCategory, ReadabilityMetrics, RiskLevel};

    fn clause(doc_id: &str, order: usize) -> ClauseRecord {
        ClauseRecord {
            clause_id: ClauseRecord::make_id(doc_id, order - 1),
            doc_id: doc_id.to_string(),
            order,
            original_text: format!("clause {}", order),
            summary: String::new(),
            category: ClauseCategory::Other,
            risk_level: RiskLevel::Low,
            risk_score: 0.1,
            needs_review: false,
            readability_metrics: ReadabilityMetrics::default(),
            negotiation_tip: None,
            confidence: 0.8,
            processing_method: "llm".to_string(),
            embedding: None,
            detected_keywords: Vec::new(),
            risk_factors: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_status_update_on_missing_document_fails() {
        let store = InMemoryStore::new();
        let result = store
            .update_document_status("ghost", DocumentStatus::Completed, DocumentPatch::default())
            .await;
        assert!(matches!(result, Err(PersistenceError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_status_is_sticky() {
        let store = InMemoryStore::new();
        store
            .create_document(DocumentRecord::new("d1", "a.pdf", 10, None))
            .await
            .unwrap();
        store
            .update_document_status("d1", DocumentStatus::Failed, DocumentPatch::default())
            .await
            .unwrap();

        let result = store
            .update_document_status("d1", DocumentStatus::Completed, DocumentPatch::default())
            .await;
        assert!(matches!(result, Err(PersistenceError::IllegalTransition(_))));

        // Idempotent retry of the same terminal state is allowed
        store
            .update_document_status("d1", DocumentStatus::Failed, DocumentPatch::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clauses_returned_in_order() {
        let store = InMemoryStore::new();
        store
            .create_document(DocumentRecord::new("d1", "a.pdf", 10, None))
            .await
            .unwrap();
        store
            .create_clauses("d1", vec![clause("d1", 3), clause("d1", 1), clause("d1", 2)])
            .await
            .unwrap();

        let clauses = store.get_document_clauses("d1").await.unwrap();
        let orders: Vec<usize> = clauses.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_create_clauses_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .create_document(DocumentRecord::new("d1", "a.pdf", 10, None))
            .await
            .unwrap();

        store
            .create_clauses("d1", vec![clause("d1", 1), clause("d1", 2)])
            .await
            .unwrap();
        store
            .create_clauses("d1", vec![clause("d1", 1), clause("d1", 2)])
            .await
            .unwrap();

        let clauses = store.get_document_clauses("d1").await.unwrap();
        assert_eq!(clauses.len(), 2);
    }

    #[tokio::test]
    async fn test_embedding_update_sets_vectors() {
        let store = InMemoryStore::new();
        store
            .create_document(DocumentRecord::new("d1", "a.pdf", 10, None))
            .await
            .unwrap();
        store
            .create_clauses("d1", vec![clause("d1", 1)])
            .await
            .unwrap();

        let clause_id = ClauseRecord::make_id("d1", 0);
        store
            .update_clause_embeddings("d1", vec![(clause_id.clone(), vec![0.1, 0.2])])
            .await
            .unwrap();

        let stored = store.get_clause("d1", &clause_id).await.unwrap().unwrap();
        assert_eq!(stored.embedding, Some(vec![0.1, 0.2]));
    }

    #[tokio::test]
    async fn test_session_delete_cascades_messages() {
        let store = InMemoryStore::new();
        let session = ChatSession::new("t", vec![]);
        let session_id = session.session_id.clone();
        store.create_session(session).await.unwrap();
        store
            .add_message(ChatMessage::new(
                &session_id,
                clauselens_core::MessageRole::User,
                "hi",
            ))
            .await
            .unwrap();

        store.delete_session(&session_id).await.unwrap();
        assert!(store.get_session(&session_id).await.unwrap().is_none());
        assert!(store.get_messages(&session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_qa_history_newest_first() {
        let store = InMemoryStore::new();
        for i in 0..3 {
            store
                .save_qa_history(QaHistoryRecord {
                    qa_id: format!("qa{}", i),
                    doc_id: "d1".into(),
                    question: format!("q{}", i),
                    answer: String::new(),
                    clause_ids: vec![],
                    confidence: 0.5,
                    session_id: None,
                    relevant_clause_count: 0,
                    timestamp: Utc::now() + chrono::Duration::seconds(i),
                })
                .await
                .unwrap();
        }

        let history = store.get_qa_history("d1", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "q2");
    }
}
