//! Analytics event types
//!
//! Events are tagged variants with closed payloads. Question events carry a
//! SHA-256 hash of the question, never the raw text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Event type, used for routing on the message envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DocumentUploaded,
    ClauseAnalyzed,
    QuestionAsked,
    RiskDetected,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DocumentUploaded => "document_uploaded",
            EventType::ClauseAnalyzed => "clause_analyzed",
            EventType::QuestionAsked => "question_asked",
            EventType::RiskDetected => "risk_detected",
        }
    }
}

/// Closed payloads, one per event type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    DocumentUploaded {
        doc_id: String,
        filename_hash: String,
        page_count: usize,
        language: String,
        processing_time_ms: u64,
        status: String,
        session_id: Option<String>,
    },
    ClauseAnalyzed {
        clause_id: String,
        doc_id: String,
        category: String,
        risk_level: String,
        risk_score: f64,
        confidence: f64,
        readability_delta: Option<f64>,
        session_id: Option<String>,
    },
    QuestionAsked {
        /// SHA-256 hex digest; raw question text is never published
        question_hash: String,
        answer_confidence: f64,
        citation_count: usize,
        response_time_ms: u64,
        session_id: Option<String>,
    },
    RiskDetected {
        clause_id: String,
        doc_id: String,
        risk_level: String,
        risk_score: f64,
        risk_factors: Vec<String>,
        category: String,
        session_id: Option<String>,
    },
}

/// Event envelope as it travels to the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Set when the event is handed to the bus
    pub processing_timestamp: Option<DateTime<Utc>>,
    pub event_data: EventPayload,
}

impl AnalyticsEvent {
    fn new(event_type: EventType, event_data: EventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            processing_timestamp: None,
            event_data,
        }
    }

    pub fn document_uploaded(
        doc_id: impl Into<String>,
        filename: &str,
        page_count: usize,
        language: impl Into<String>,
        processing_time_ms: u64,
        status: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self::new(
            EventType::DocumentUploaded,
            EventPayload::DocumentUploaded {
                doc_id: doc_id.into(),
                filename_hash: sha256_hex(filename),
                page_count,
                language: language.into(),
                processing_time_ms,
                status: status.into(),
                session_id,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn clause_analyzed(
        clause_id: impl Into<String>,
        doc_id: impl Into<String>,
        category: impl Into<String>,
        risk_level: impl Into<String>,
        risk_score: f64,
        confidence: f64,
        readability_delta: Option<f64>,
        session_id: Option<String>,
    ) -> Self {
        Self::new(
            EventType::ClauseAnalyzed,
            EventPayload::ClauseAnalyzed {
                clause_id: clause_id.into(),
                doc_id: doc_id.into(),
                category: category.into(),
                risk_level: risk_level.into(),
                risk_score,
                confidence,
                readability_delta,
                session_id,
            },
        )
    }

    pub fn question_asked(
        question: &str,
        answer_confidence: f64,
        citation_count: usize,
        response_time_ms: u64,
        session_id: Option<String>,
    ) -> Self {
        Self::new(
            EventType::QuestionAsked,
            EventPayload::QuestionAsked {
                question_hash: sha256_hex(question),
                answer_confidence,
                citation_count,
                response_time_ms,
                session_id,
            },
        )
    }

    pub fn risk_detected(
        clause_id: impl Into<String>,
        doc_id: impl Into<String>,
        risk_level: impl Into<String>,
        risk_score: f64,
        risk_factors: Vec<String>,
        category: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self::new(
            EventType::RiskDetected,
            EventPayload::RiskDetected {
                clause_id: clause_id.into(),
                doc_id: doc_id.into(),
                risk_level: risk_level.into(),
                risk_score,
                risk_factors,
                category: category.into(),
                session_id,
            },
        )
    }

    /// Wire form for the bus: the payload is double-encoded into a JSON
    /// string so the warehouse's JSON column accepts it.
    pub fn to_wire(&self) -> Result<serde_json::Value, crate::AnalyticsError> {
        let payload = serde_json::to_string(&self.event_data)
            .map_err(|e| crate::AnalyticsError::Serialization(e.to_string()))?;

        Ok(serde_json::json!({
            "event_id": self.event_id,
            "event_type": self.event_type.as_str(),
            "timestamp": self.timestamp.to_rfc3339(),
            "processing_timestamp": Utc::now().to_rfc3339(),
            "event_data": payload,
        }))
    }
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_hash_is_64_hex_chars_and_raw_text_absent() {
        let question = "Can I terminate this contract early?";
        let event = AnalyticsEvent::question_asked(question, 0.9, 2, 120, None);

        let wire = event.to_wire().unwrap();
        let serialized = wire.to_string();
        assert!(!serialized.contains(question));

        match &event.event_data {
            EventPayload::QuestionAsked { question_hash, .. } => {
                assert_eq!(question_hash.len(), 64);
                assert!(question_hash.chars().all(|c| c.is_ascii_hexdigit()));
            },
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_wire_event_data_is_json_string() {
        let event = AnalyticsEvent::document_uploaded("d1", "a.pdf", 3, "en", 1200, "success", None);
        let wire = event.to_wire().unwrap();

        // Double-encoded: event_data is a string containing JSON
        let data = wire["event_data"].as_str().expect("string payload");
        let inner: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(inner["doc_id"], "d1");
        assert_eq!(inner["page_count"], 3);
        // The filename itself is hashed, never raw
        assert!(!data.contains("a.pdf"));
    }

    #[test]
    fn test_event_ids_unique() {
        let a = AnalyticsEvent::question_asked("q", 0.5, 0, 10, None);
        let b = AnalyticsEvent::question_asked("q", 0.5, 0, 10, None);
        assert_ne!(a.event_id, b.event_id);
    }
}
