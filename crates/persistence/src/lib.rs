//! Document store client
//!
//! The store is an external document database laid out as:
//! - `documents/{doc_id}` with `clauses/{clause_id}` children
//! - `sessions/{session_id}` with `messages/{message_id}` children
//! - `qa_history/{qa_id}`
//! - `negotiations/{negotiation_id}`
//!
//! Two implementations: `InMemoryStore` for tests and local development, and
//! `HttpStore` against the real service. Batch writes are chunked to at most
//! 50 writes per transaction.

pub mod http;
pub mod memory;
pub mod store;

pub use http::{HttpStore, HttpStoreConfig};
pub use memory::InMemoryStore;
pub use store::{DocumentPatch, DocumentStore};

use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("document {0} not found for status update")]
    DocumentNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal status transition: {0}")]
    IllegalTransition(String),

    #[error("batch too large: {size} writes (limit {limit})")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("embedding persist error: {failed}/{total} chunks failed; failing indices {indices:?}")]
    EmbeddingPersist {
        failed: usize,
        total: usize,
        indices: Vec<usize>,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        PersistenceError::Connection(err.to_string())
    }
}

impl From<PersistenceError> for clauselens_core::Error {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::DocumentNotFound(msg) => clauselens_core::Error::Conflict(format!(
                "document {} not found for status update",
                msg
            )),
            PersistenceError::IllegalTransition(msg) => clauselens_core::Error::Conflict(msg),
            PersistenceError::NotFound(msg) => clauselens_core::Error::NotFound(msg),
            other => clauselens_core::Error::Store(other.to_string()),
        }
    }
}
