//! LLM integration
//!
//! Features:
//! - Backend trait with an HTTP generation backend
//! - Retry layer with exponential backoff for transient failures
//! - Token-bounded batch summarization with per-batch fallback
//! - Grounded Q&A prompt building and structured response parsing

pub mod backend;
pub mod batcher;
pub mod http;
pub mod prompt;
pub mod retry;

pub use backend::{estimate_tokens, GenerationConfig, LlmBackend};
pub use batcher::{BatchConfig, BatchSummarizer, ClauseInput, ClauseSummary};
pub use http::{HttpLlmBackend, HttpLlmConfig};
pub use prompt::{
    build_batch_prompt, build_qa_system_prompt, build_qa_user_prompt,
    build_summarization_system_prompt, enhance_advisor_language, extract_first_json_array,
    extract_first_json_object, parse_qa_response, QaClauseContext, QaResult,
};
pub use retry::{RetryPolicy, Transient};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation error: {0}")]
    Generation(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout")]
    Timeout,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Whether the retry layer should try again
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for clauselens_core::Error {
    fn from(err: LlmError) -> Self {
        clauselens_core::Error::Llm(err.to_string())
    }
}
