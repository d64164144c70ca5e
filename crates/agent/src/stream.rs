//! Typed events for streaming Q&A

use serde::{Deserialize, Serialize};

use clauselens_core::SourceCitation;

/// One frame of a streaming Q&A response.
///
/// Ordering contract: any number of `status` frames, at most one
/// `language_detection`, at most one `user_message`, at most one `answer`,
/// at most one `complete`; `error` terminates the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        message: String,
    },
    LanguageDetection {
        detected_language: String,
        confidence: f64,
    },
    UserMessage {
        content: String,
        chat_session_id: Option<String>,
    },
    Answer {
        content: String,
        confidence: f64,
        sources: Vec<SourceCitation>,
        chat_session_id: Option<String>,
        conversation_context_used: bool,
        response_language: String,
    },
    Complete {},
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    /// Serialize to the single-JSON-object wire form
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"serialization failure"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tag() {
        let event = StreamEvent::status("Processing your question...");
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "status");

        let event = StreamEvent::LanguageDetection {
            detected_language: "es".to_string(),
            confidence: 0.9,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "language_detection");
        assert_eq!(json["detected_language"], "es");

        let event = StreamEvent::Complete {};
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "complete");
    }
}
