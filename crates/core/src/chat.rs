//! Chat session and message types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// A single message within a session's append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Citations attached to assistant messages
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            sources: Vec::new(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<serde_json::Value>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Persisted chat session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub title: String,
    /// Ordered document ids this session is scoped to
    pub selected_documents: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub archived: bool,
    pub message_count: usize,
}

impl ChatSession {
    pub fn new(title: impl Into<String>, selected_documents: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            title: title.into(),
            selected_documents,
            created_at: now,
            last_activity: now,
            archived: false,
            message_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = ChatMessage::new("s1", MessageRole::User, "hello");
        let b = ChatMessage::new("s1", MessageRole::User, "hello");
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn test_new_session_is_active() {
        let s = ChatSession::new("My contract", vec!["d1".into()]);
        assert!(!s.archived);
        assert_eq!(s.message_count, 0);
        assert_eq!(s.selected_documents, vec!["d1".to_string()]);
    }
}
