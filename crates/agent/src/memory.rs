//! Conversation memory
//!
//! Append-only message log per session with bounded recent-history windows
//! and an optional LLM rolling summary of older messages. Appends are
//! serialized per session id so concurrent requests on the same session
//! cannot interleave their read-modify-write cycles.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use clauselens_config::constants::memory::{MAX_MESSAGES, TRANSCRIPT_MESSAGES};
use clauselens_core::{ChatMessage, ChatSession, MessageRole};
use clauselens_llm::LlmBackend;
use clauselens_persistence::DocumentStore;

use crate::AgentError;

/// Memory tuning
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Recent-history window returned on reads
    pub max_messages: usize,
    /// Messages rendered verbatim into the prompt transcript
    pub transcript_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: MAX_MESSAGES,
            transcript_messages: TRANSCRIPT_MESSAGES,
        }
    }
}

/// Conversation memory service over the document store
pub struct ConversationMemory {
    store: Arc<dyn DocumentStore>,
    /// Summarizer for history beyond the window; absent means no summaries
    summarizer: Option<Arc<dyn LlmBackend>>,
    config: MemoryConfig,
    /// Per-session append locks
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn DocumentStore>, config: MemoryConfig) -> Self {
        Self {
            store,
            summarizer: None,
            config,
            session_locks: DashMap::new(),
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn LlmBackend>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create and persist a new session
    pub async fn create_session(
        &self,
        title: impl Into<String>,
        selected_documents: Vec<String>,
    ) -> Result<ChatSession, AgentError> {
        let session = ChatSession::new(title, selected_documents);
        self.store
            .create_session(session.clone())
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))?;
        tracing::info!(session_id = %session.session_id, "Chat session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<ChatSession>, AgentError> {
        self.store
            .get_session(session_id)
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))
    }

    pub async fn list_sessions(
        &self,
        limit: usize,
        include_archived: bool,
    ) -> Result<Vec<ChatSession>, AgentError> {
        self.store
            .list_sessions(limit, include_archived)
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))
    }

    /// Replace the session's selected documents
    pub async fn update_session_documents(
        &self,
        session_id: &str,
        selected_documents: Vec<String>,
    ) -> Result<ChatSession, AgentError> {
        let _guard = self.lock_for(session_id);
        let _held = _guard.lock().await;

        let mut session = self
            .require_session(session_id)
            .await?;
        session.selected_documents = selected_documents;
        session.last_activity = Utc::now();
        self.store
            .update_session(session.clone())
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))?;
        Ok(session)
    }

    /// Soft-archive: the session stays readable but drops out of listings
    pub async fn archive_session(&self, session_id: &str) -> Result<(), AgentError> {
        let _guard = self.lock_for(session_id);
        let _held = _guard.lock().await;

        let mut session = self.require_session(session_id).await?;
        session.archived = true;
        session.last_activity = Utc::now();
        self.store
            .update_session(session)
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))
    }

    /// Hard delete; cascades to messages
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AgentError> {
        self.store
            .delete_session(session_id)
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))?;
        self.session_locks.remove(session_id);
        Ok(())
    }

    /// Append a message to the session log.
    ///
    /// The per-session lock is held across the existence check, the append,
    /// and the session-record update, so two writers cannot interleave.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        sources: Vec<serde_json::Value>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<ChatMessage, AgentError> {
        let guard = self.lock_for(session_id);
        let _held = guard.lock().await;

        let mut session = self.require_session(session_id).await?;

        let message = ChatMessage::new(session_id, role, content)
            .with_sources(sources)
            .with_metadata(metadata);

        self.store
            .add_message(message.clone())
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))?;

        session.message_count += 1;
        session.last_activity = Utc::now();
        self.store
            .update_session(session)
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))?;

        Ok(message)
    }

    /// All messages of a session in append order
    pub async fn get_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        self.store
            .get_messages(session_id)
            .await
            .map_err(|e| AgentError::Memory(e.to_string()))
    }

    /// Recent-history window plus an optional rolling summary of everything
    /// older than the window.
    pub async fn get_context(
        &self,
        session_id: &str,
    ) -> Result<(Vec<ChatMessage>, Option<String>), AgentError> {
        let messages = self.get_messages(session_id).await?;

        if messages.len() <= self.config.max_messages {
            return Ok((messages, None));
        }

        let split = messages.len() - self.config.max_messages;
        let (older, window) = messages.split_at(split);
        let summary = self.summarize(older).await;
        Ok((window.to_vec(), summary))
    }

    /// Render the context window into prompt text
    pub fn format_context(&self, window: &[ChatMessage], summary: Option<&str>) -> String {
        let mut context = String::new();

        if let Some(summary) = summary {
            context.push_str(&format!("Previous conversation summary: {}\n\n", summary));
        }

        if !window.is_empty() {
            context.push_str("Recent conversation:\n");
            let start = window.len().saturating_sub(self.config.transcript_messages);
            for message in &window[start..] {
                context.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
            }
            context.push('\n');
        }

        context
    }

    async fn summarize(&self, older: &[ChatMessage]) -> Option<String> {
        let summarizer = self.summarizer.as_ref()?;
        if older.is_empty() {
            return None;
        }

        let transcript: String = older
            .iter()
            .map(|m| format!("{}: {}\n", m.role.as_str(), m.content))
            .collect();

        let result = summarizer
            .generate(
                "Summarize the following conversation in at most three sentences, keeping \
                 concrete facts the assistant will need later. Output plain text only.",
                &transcript,
            )
            .await;

        match result {
            Ok(summary) => Some(summary.trim().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Rolling summary generation failed");
                None
            },
        }
    }

    async fn require_session(&self, session_id: &str) -> Result<ChatSession, AgentError> {
        self.get_session(session_id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauselens_persistence::InMemoryStore;

    fn memory() -> (ConversationMemory, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (
            ConversationMemory::new(store.clone(), MemoryConfig::default()),
            store,
        )
    }

    #[tokio::test]
    async fn test_append_and_ordering() {
        let (memory, _) = memory();
        let session = memory.create_session("t", vec![]).await.unwrap();

        for i in 0..4 {
            memory
                .add_message(
                    &session.session_id,
                    if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant },
                    format!("m{}", i),
                    vec![],
                    HashMap::new(),
                )
                .await
                .unwrap();
        }

        let messages = memory.get_messages(&session.session_id).await.unwrap();
        assert_eq!(messages.len(), 4);
        // Timestamps non-decreasing, ids unique
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
            assert_ne!(pair[0].message_id, pair[1].message_id);
        }
        assert_eq!(messages[3].content, "m3");

        let session = memory
            .get_session(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.message_count, 4);
    }

    #[tokio::test]
    async fn test_append_to_missing_session_fails() {
        let (memory, _) = memory();
        let result = memory
            .add_message("ghost", MessageRole::User, "hi", vec![], HashMap::new())
            .await;
        assert!(matches!(result, Err(AgentError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_window_bounded_without_summarizer() {
        let (memory, _) = memory();
        let session = memory.create_session("t", vec![]).await.unwrap();

        for i in 0..15 {
            memory
                .add_message(&session.session_id, MessageRole::User, format!("m{}", i), vec![], HashMap::new())
                .await
                .unwrap();
        }

        let (window, summary) = memory.get_context(&session.session_id).await.unwrap();
        assert_eq!(window.len(), MAX_MESSAGES);
        assert_eq!(window[0].content, "m5");
        // No summarizer configured: no rolling summary
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_serialized() {
        let (memory, _) = memory();
        let memory = Arc::new(memory);
        let session = memory.create_session("t", vec![]).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let memory = memory.clone();
            let session_id = session.session_id.clone();
            handles.push(tokio::spawn(async move {
                memory
                    .add_message(&session_id, MessageRole::User, format!("m{}", i), vec![], HashMap::new())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let messages = memory.get_messages(&session.session_id).await.unwrap();
        assert_eq!(messages.len(), 20);
        let session = memory
            .get_session(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        // No lost updates on the counter
        assert_eq!(session.message_count, 20);
    }

    #[tokio::test]
    async fn test_archive_is_soft_delete_is_hard() {
        let (memory, _) = memory();
        let session = memory.create_session("t", vec![]).await.unwrap();

        memory.archive_session(&session.session_id).await.unwrap();
        assert!(memory
            .get_session(&session.session_id)
            .await
            .unwrap()
            .unwrap()
            .archived);
        assert!(memory.list_sessions(10, false).await.unwrap().is_empty());
        assert_eq!(memory.list_sessions(10, true).await.unwrap().len(), 1);

        memory.delete_session(&session.session_id).await.unwrap();
        assert!(memory
            .get_session(&session.session_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_format_context_shape() {
        let (memory, _) = memory();
        let session = memory.create_session("t", vec![]).await.unwrap();
        for i in 0..3 {
            memory
                .add_message(&session.session_id, MessageRole::User, format!("m{}", i), vec![], HashMap::new())
                .await
                .unwrap();
        }

        let (window, _) = memory.get_context(&session.session_id).await.unwrap();
        let text = memory.format_context(&window, Some("they discussed payment"));
        assert!(text.starts_with("Previous conversation summary: they discussed payment"));
        assert!(text.contains("user: m2"));
    }
}
