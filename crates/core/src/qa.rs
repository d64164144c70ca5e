//! Q&A answer, citation, and history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Citation back to a specific clause used in an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCitation {
    pub clause_id: String,
    /// 1-based clause order within its document
    pub clause_number: usize,
    pub category: String,
    /// First 300 characters of the clause's original text
    pub snippet: String,
    /// Cosine similarity between the question and this clause
    pub relevance_score: f64,
}

/// Grounded answer to a question about a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub used_clause_ids: Vec<String>,
    pub confidence: f64,
    pub sources: Vec<SourceCitation>,
    pub chat_session_id: Option<String>,
    pub conversation_context_used: bool,
    pub detected_language: Option<Language>,
    pub response_language: Language,
    pub language_detection_confidence: Option<f64>,
    pub detection_method: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Answer {
    /// Answer with no grounding (empty retrieval or unparseable LLM output)
    pub fn ungrounded(text: impl Into<String>, response_language: Language) -> Self {
        Self {
            answer: text.into(),
            used_clause_ids: Vec::new(),
            confidence: 0.0,
            sources: Vec::new(),
            chat_session_id: None,
            conversation_context_used: false,
            detected_language: None,
            response_language,
            language_detection_confidence: None,
            detection_method: None,
            timestamp: Utc::now(),
        }
    }
}

/// Persisted record of one Q&A interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaHistoryRecord {
    pub qa_id: String,
    pub doc_id: String,
    pub question: String,
    pub answer: String,
    pub clause_ids: Vec<String>,
    pub confidence: f64,
    pub session_id: Option<String>,
    pub relevant_clause_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ungrounded_answer_has_no_citations() {
        let a = Answer::ungrounded("no match", Language::English);
        assert_eq!(a.confidence, 0.0);
        assert!(a.sources.is_empty());
        assert!(a.used_clause_ids.is_empty());
    }
}
