//! Ingestion pipeline
//!
//! Features:
//! - Text extraction with a progressive fallback chain
//!   (layout-aware service, structural PDF parser, raw byte scan)
//! - The ten-stage ingestion orchestrator with partial-failure recovery

pub mod adapters;
pub mod extract;
pub mod orchestrator;

pub use adapters::SemanticEmbedder;
pub use extract::{
    DocumentExtractor, ExtractorConfig, HttpLayoutExtractor, HttpLayoutExtractorConfig,
    LayoutExtractor,
};
pub use orchestrator::{
    IngestionOrchestrator, IngestionResult, OrchestratorConfig, ProcessingStatus,
};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input too large: {0}")]
    InputTooLarge(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("empty document: {0}")]
    EmptyDocument(String),
}

impl From<PipelineError> for clauselens_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InputTooLarge(msg) => clauselens_core::Error::InputTooLarge(msg),
            PipelineError::UnsupportedFormat(msg) => {
                clauselens_core::Error::UnsupportedFormat(msg)
            },
            PipelineError::Extraction(msg) => clauselens_core::Error::Extraction(msg),
            PipelineError::EmptyDocument(msg) => clauselens_core::Error::InvalidInput(msg),
        }
    }
}
