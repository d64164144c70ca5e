//! Retrieval over clause embeddings
//!
//! Features:
//! - Embedding backend trait with an HTTP provider client
//! - Deterministic hash embedder for tests
//! - In-process TTL cache of per-document clause sets
//! - Exact cosine-similarity top-k retrieval
//! - Embedding indexer with chunked persistence

pub mod cache;
pub mod embeddings;
pub mod indexer;
pub mod retriever;

pub use cache::{CacheKeys, CacheStats, ClauseCache};
pub use embeddings::{
    EmbeddingBackend, EmbeddingConfig, HttpEmbeddingBackend, SimpleEmbedder,
};
pub use indexer::EmbeddingIndexer;
pub use retriever::{cosine_similarity, Retriever, RetrieverConfig, ScoredClause};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("search error: {0}")]
    Search(String),

    #[error("embedding persist error: {0}")]
    Persist(String),
}

impl clauselens_llm::Transient for RagError {
    fn is_transient(&self) -> bool {
        // Provider calls surface as Embedding; everything else is terminal
        matches!(self, RagError::Embedding(_))
    }
}

impl From<RagError> for clauselens_core::Error {
    fn from(err: RagError) -> Self {
        clauselens_core::Error::Embedding(err.to_string())
    }
}
