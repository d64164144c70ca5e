//! Text processing for contract analysis
//!
//! Features:
//! - PII detection and masking (external scanner with regex fallback)
//! - Clause segmentation from layout blocks or heading heuristics
//! - Category classification (pattern rules with semantic fallback)
//! - Risk fusion (keyword evidence + LLM label + category multiplier)
//! - Flesch-Kincaid readability scoring

pub mod classifier;
pub mod privacy;
pub mod readability;
pub mod risk;
pub mod segmenter;

pub use classifier::{
    CategoryClassifier, ClassifierConfig, ExampleEmbedder, SemanticClassifier,
};
pub use privacy::{
    HttpScanner, HttpScannerConfig, PiiMatch, PiiRedactor, PiiScanner, PiiType,
    RedactionOutcome, RegexScanner, ScanFinding,
};
pub use readability::{ReadabilityReport, ReadabilityScorer, TextMetrics};
pub use risk::RiskFuser;
pub use segmenter::{ClauseCandidate, ClauseSegmenter, SegmenterConfig};

use thiserror::Error;

/// Text processing errors
#[derive(Error, Debug)]
pub enum TextProcessingError {
    #[error("PII scanner error: {0}")]
    Scanner(String),

    #[error("segmentation error: {0}")]
    Segmentation(String),

    #[error("classification error: {0}")]
    Classification(String),
}

impl From<TextProcessingError> for clauselens_core::Error {
    fn from(err: TextProcessingError) -> Self {
        match err {
            TextProcessingError::Scanner(msg) => clauselens_core::Error::Privacy(msg),
            TextProcessingError::Segmentation(msg) => {
                clauselens_core::Error::Segmentation(msg)
            },
            TextProcessingError::Classification(msg) => {
                clauselens_core::Error::Segmentation(msg)
            },
        }
    }
}
