//! Error types shared across the platform

use thiserror::Error;

/// Result alias using the platform error
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an error at the service boundary.
///
/// The HTTP layer maps each kind to a status code; internal callers use it
/// to decide whether a failure is retryable or a caller mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input (empty question, missing file, bad mime)
    InputValidation,
    /// Input exceeds configured size or page limits
    InputTooLarge,
    /// Mime type not supported by any extractor
    UnsupportedFormat,
    /// Unknown document, clause, or session
    NotFound,
    /// Clauses exist but embeddings are missing and could not be recovered
    DocumentNotReady,
    /// An external collaborator (extractor, LLM, embeddings, store, scanner, bus) failed
    DependencyFailure,
    /// Status update raced with a missing or terminal document
    Conflict,
    /// Anything else
    Internal,
}

/// Platform-wide error
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("input too large: {0}")]
    InputTooLarge(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("document not ready: {0}")]
    DocumentNotReady(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("privacy error: {0}")]
    Privacy(String),

    #[error("segmentation error: {0}")]
    Segmentation(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("analytics error: {0}")]
    Analytics(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Boundary classification for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InputValidation,
            Error::InputTooLarge(_) => ErrorKind::InputTooLarge,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::DocumentNotReady(_) => ErrorKind::DocumentNotReady,
            Error::Extraction(_)
            | Error::Privacy(_)
            | Error::Llm(_)
            | Error::Embedding(_)
            | Error::Store(_)
            | Error::Analytics(_) => ErrorKind::DependencyFailure,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Segmentation(_) | Error::Pipeline(_) | Error::Internal(_) => {
                ErrorKind::Internal
            },
        }
    }
}
