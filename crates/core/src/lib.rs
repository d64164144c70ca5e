//! Core types for the contract analysis platform
//!
//! This crate provides foundational types used across all other crates:
//! - Document and clause records with their closed enums
//! - Chat session and message types
//! - Q&A answer and citation types
//! - Language definitions
//! - Error types

pub mod chat;
pub mod clause;
pub mod document;
pub mod error;
pub mod extraction;
pub mod language;
pub mod qa;

pub use chat::{ChatMessage, ChatSession, MessageRole};
pub use clause::{
    ClauseCategory, ClauseRecord, ReadabilityMetrics, RiskAssessment, RiskLevel,
};
pub use document::{DocumentRecord, DocumentStatus, PiiSummary, ProcessingStatistics};
pub use error::{Error, ErrorKind, Result};
pub use extraction::{
    BoundingBox, ExtractedDocument, ExtractionMethod, PageInfo, TextBlock,
};
pub use language::Language;
pub use qa::{Answer, QaHistoryRecord, SourceCitation};
