//! HTTP client for the document store service

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use clauselens_core::{
    ChatMessage, ChatSession, ClauseRecord, DocumentRecord, DocumentStatus, QaHistoryRecord,
};
use clauselens_config::constants::store::MAX_WRITES_PER_BATCH;

use crate::store::{DocumentPatch, DocumentStore};
use crate::PersistenceError;

/// Configuration for the HTTP store
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub timeout: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8092".to_string(),
            project_id: "clauselens-dev".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// `DocumentStore` over the store service's JSON API.
///
/// Document paths mirror the persisted-state layout:
/// `/v1/projects/{project}/documents/{doc_id}/clauses/{clause_id}` etc.
pub struct HttpStore {
    config: HttpStoreConfig,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, PersistenceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        tracing::info!(base_url = %config.base_url, project = %config.project_id, "Document store client ready");
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/projects/{}/{}",
            self.config.base_url, self.config.project_id, path
        )
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), PersistenceError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::check_status(path, response).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, PersistenceError> {
        let response = self.client.get(self.url(path)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(path, response).await?;
        let value = response
            .json::<T>()
            .await
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }

    async fn check_status(
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        tracing::error!(path, status = status.as_u16(), "Store request failed");
        match status.as_u16() {
            413 => Err(PersistenceError::BatchTooLarge {
                size: 0,
                limit: MAX_WRITES_PER_BATCH,
            }),
            404 => Err(PersistenceError::NotFound(path.to_string())),
            409 => Err(PersistenceError::IllegalTransition(message)),
            code => Err(PersistenceError::Api {
                status: code,
                message,
            }),
        }
    }

    /// Send one chunk of embedding updates, halving on payload-size rejection
    async fn send_embedding_chunk(
        &self,
        doc_id: &str,
        chunk: &[(String, Vec<f32>)],
    ) -> Result<(), PersistenceError> {
        let mut pending: Vec<&[(String, Vec<f32>)]> = vec![chunk];

        while let Some(part) = pending.pop() {
            match self.post_embedding_updates(doc_id, part).await {
                Ok(()) => {},
                Err(PersistenceError::BatchTooLarge { .. }) if part.len() > 1 => {
                    // The store rejected the payload size; halve and retry
                    let mid = part.len() / 2;
                    tracing::warn!(
                        doc_id,
                        size = part.len(),
                        "Embedding chunk too large, splitting"
                    );
                    pending.push(&part[mid..]);
                    pending.push(&part[..mid]);
                },
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn post_embedding_updates(
        &self,
        doc_id: &str,
        chunk: &[(String, Vec<f32>)],
    ) -> Result<(), PersistenceError> {
        let path = format!("documents/{}/clauses:batchUpdateEmbeddings", doc_id);
        let body = serde_json::json!({
            "updates": chunk
                .iter()
                .map(|(clause_id, embedding)| serde_json::json!({
                    "clause_id": clause_id,
                    "embedding": embedding,
                }))
                .collect::<Vec<_>>(),
        });
        self.post_json(&path, &body).await
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn create_document(&self, document: DocumentRecord) -> Result<(), PersistenceError> {
        let path = format!("documents/{}", document.doc_id);
        self.post_json(&path, &document).await
    }

    async fn get_document(
        &self,
        doc_id: &str,
    ) -> Result<Option<DocumentRecord>, PersistenceError> {
        self.get_json(&format!("documents/{}", doc_id)).await
    }

    async fn update_document_status(
        &self,
        doc_id: &str,
        status: DocumentStatus,
        patch: DocumentPatch,
    ) -> Result<(), PersistenceError> {
        let path = format!("documents/{}:updateStatus", doc_id);
        let body = serde_json::json!({
            "status": status,
            "patch": patch,
        });
        match self.post_json(&path, &body).await {
            Err(PersistenceError::NotFound(_)) => {
                Err(PersistenceError::DocumentNotFound(doc_id.to_string()))
            },
            other => other,
        }
    }

    async fn create_clauses(
        &self,
        doc_id: &str,
        clauses: Vec<ClauseRecord>,
    ) -> Result<Vec<String>, PersistenceError> {
        let ids: Vec<String> = clauses.iter().map(|c| c.clause_id.clone()).collect();
        let path = format!("documents/{}/clauses:batchCreate", doc_id);

        for chunk in clauses.chunks(MAX_WRITES_PER_BATCH) {
            let body = serde_json::json!({ "clauses": chunk });
            self.post_json(&path, &body).await?;
        }

        tracing::info!(doc_id, count = ids.len(), "Clause records created");
        Ok(ids)
    }

    async fn get_document_clauses(
        &self,
        doc_id: &str,
    ) -> Result<Vec<ClauseRecord>, PersistenceError> {
        let mut clauses: Vec<ClauseRecord> = self
            .get_json(&format!("documents/{}/clauses", doc_id))
            .await?
            .unwrap_or_default();
        clauses.sort_by_key(|c| c.order);
        Ok(clauses)
    }

    async fn get_clause(
        &self,
        doc_id: &str,
        clause_id: &str,
    ) -> Result<Option<ClauseRecord>, PersistenceError> {
        self.get_json(&format!("documents/{}/clauses/{}", doc_id, clause_id))
            .await
    }

    async fn update_clause_embeddings(
        &self,
        doc_id: &str,
        embeddings: Vec<(String, Vec<f32>)>,
    ) -> Result<(), PersistenceError> {
        let chunks: Vec<&[(String, Vec<f32>)]> =
            embeddings.chunks(MAX_WRITES_PER_BATCH).collect();
        let total = chunks.len();
        let mut failing_indices = Vec::new();

        // Attempt every chunk; report failures only after all are done
        for (index, chunk) in chunks.into_iter().enumerate() {
            if let Err(e) = self.send_embedding_chunk(doc_id, chunk).await {
                tracing::error!(doc_id, chunk = index, error = %e, "Embedding chunk failed");
                failing_indices.push(index);
            }
        }

        if failing_indices.is_empty() {
            tracing::info!(doc_id, count = embeddings.len(), "Clause embeddings updated");
            Ok(())
        } else {
            Err(PersistenceError::EmbeddingPersist {
                failed: failing_indices.len(),
                total,
                indices: failing_indices,
            })
        }
    }

    async fn create_session(&self, session: ChatSession) -> Result<(), PersistenceError> {
        let path = format!("sessions/{}", session.session_id);
        self.post_json(&path, &session).await
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ChatSession>, PersistenceError> {
        self.get_json(&format!("sessions/{}", session_id)).await
    }

    async fn list_sessions(
        &self,
        limit: usize,
        include_archived: bool,
    ) -> Result<Vec<ChatSession>, PersistenceError> {
        let path = format!(
            "sessions?limit={}&include_archived={}",
            limit, include_archived
        );
        Ok(self.get_json(&path).await?.unwrap_or_default())
    }

    async fn update_session(&self, session: ChatSession) -> Result<(), PersistenceError> {
        let path = format!("sessions/{}:update", session.session_id);
        self.post_json(&path, &session).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), PersistenceError> {
        let response = self
            .client
            .delete(self.url(&format!("sessions/{}", session_id)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status("delete_session", response).await.map(|_| ())
    }

    async fn add_message(&self, message: ChatMessage) -> Result<(), PersistenceError> {
        let path = format!(
            "sessions/{}/messages/{}",
            message.session_id, message.message_id
        );
        self.post_json(&path, &message).await
    }

    async fn get_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, PersistenceError> {
        let mut messages: Vec<ChatMessage> = self
            .get_json(&format!("sessions/{}/messages", session_id))
            .await?
            .unwrap_or_default();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(messages)
    }

    async fn save_qa_history(&self, record: QaHistoryRecord) -> Result<(), PersistenceError> {
        let path = format!("qa_history/{}", record.qa_id);
        self.post_json(&path, &record).await
    }

    async fn get_qa_history(
        &self,
        doc_id: &str,
        limit: usize,
    ) -> Result<Vec<QaHistoryRecord>, PersistenceError> {
        let path = format!("qa_history?doc_id={}&limit={}", doc_id, limit);
        Ok(self.get_json(&path).await?.unwrap_or_default())
    }

    async fn save_negotiation(
        &self,
        negotiation_id: &str,
        data: serde_json::Value,
    ) -> Result<(), PersistenceError> {
        let path = format!("negotiations/{}", negotiation_id);
        self.post_json(&path, &data).await
    }

    async fn get_negotiations(
        &self,
        doc_id: &str,
        clause_id: Option<&str>,
    ) -> Result<Vec<serde_json::Value>, PersistenceError> {
        let path = match clause_id {
            Some(clause_id) => format!(
                "negotiations?doc_id={}&clause_id={}",
                doc_id, clause_id
            ),
            None => format!("negotiations?doc_id={}", doc_id),
        };
        let mut records: Vec<serde_json::Value> =
            self.get_json(&path).await?.unwrap_or_default();
        // Sorted client-side to avoid a composite index on the store
        records.sort_by(|a, b| {
            let key = |v: &serde_json::Value| v["created_at"].as_str().map(str::to_string);
            key(b).cmp(&key(a))
        });
        Ok(records)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.config.base_url);
        matches!(
            self.client.get(&url).send().await,
            Ok(response) if response.status().is_success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_layout_matches_persisted_state() {
        let store = HttpStore::new(HttpStoreConfig {
            base_url: "http://store.internal".to_string(),
            project_id: "proj".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            store.url("documents/d1/clauses/c1"),
            "http://store.internal/v1/projects/proj/documents/d1/clauses/c1"
        );
        assert_eq!(
            store.url("qa_history/q1"),
            "http://store.internal/v1/projects/proj/qa_history/q1"
        );
    }
}
