//! Q&A agent
//!
//! Features:
//! - Conversation memory with bounded windows and rolling summaries
//! - Language detection with confidence-gated overrides
//! - The grounded Q&A responder, unary and streaming

pub mod language;
pub mod memory;
pub mod responder;
pub mod stream;

pub use language::{DetectionResult, LanguageDetector};
pub use memory::{ConversationMemory, MemoryConfig};
pub use responder::{AskRequest, QaConfig, QaResponder};
pub use stream::StreamEvent;

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("memory error: {0}")]
    Memory(String),
}

impl From<AgentError> for clauselens_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::SessionNotFound(id) => {
                clauselens_core::Error::NotFound(format!("session {}", id))
            },
            AgentError::Memory(msg) => clauselens_core::Error::Internal(msg),
        }
    }
}
