//! End-to-end Q&A flow tests: ingest with fakes, then ask

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use clauselens_agent::{AskRequest, StreamEvent};
use clauselens_analytics::{EventBus, InMemoryBus};
use clauselens_config::Settings;
use clauselens_core::{DocumentStatus, ErrorKind, Language};
use clauselens_llm::{LlmBackend, LlmError};
use clauselens_persistence::{DocumentStore, InMemoryStore};
use clauselens_rag::{EmbeddingBackend, RagError, SimpleEmbedder};
use clauselens_server::state::{AppState, StateOverrides};

const DIMENSION: usize = 32;

/// LLM fake answering both batch-summarization and Q&A prompts
struct ScriptedLlm;

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        if user.contains("QUESTION:") {
            // Cite the first clause offered in the prompt
            let number = user
                .lines()
                .find_map(|line| {
                    let rest = line.strip_prefix("Clause ")?;
                    let digits: String =
                        rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                    digits.parse::<usize>().ok()
                })
                .unwrap_or(1);

            return Ok(serde_json::json!({
                "answer": format!("Per Clause {} you can act accordingly.", number),
                "used_clause_numbers": [number],
                "confidence": 0.9,
                "additional_insights": null,
            })
            .to_string());
        }

        // Batch summarization: one result per clause line
        let mut items = Vec::new();
        for line in user.lines() {
            let trimmed = line.trim();
            if !trimmed.starts_with("{\"id\":\"clause_") {
                continue;
            }
            let parsed: serde_json::Value =
                serde_json::from_str(trimmed).map_err(|e| LlmError::Generation(e.to_string()))?;
            let text = parsed["text"].as_str().unwrap_or_default().to_lowercase();
            let category = if text.contains("terminate") {
                "Termination"
            } else if text.contains("liab") {
                "Liability"
            } else {
                "Payment"
            };
            items.push(serde_json::json!({
                "id": parsed["id"],
                "summary": format!("Simply put, this covers {}.", category.to_lowercase()),
                "clause_category": category,
                "risk_level": "moderate",
                "negotiation_tip": null,
            }));
        }
        Ok(serde_json::to_string(&items).unwrap())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct BrokenEmbedder;

#[async_trait]
impl EmbeddingBackend for BrokenEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Embedding("provider unavailable".to_string()))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

const CONTRACT: &str = "\
1. TERMINATION\n\
Either party may terminate this contract with thirty days written notice delivered to the counterparty for any reason.\n\
2. LIABILITY\n\
Neither party shall be liable for indirect damages, and total liability is capped at the fees paid under this contract.\n\
3. PAYMENT\n\
Payment is due within thirty days of each invoice with interest accruing on overdue balances at the maximum lawful rate.\n";

fn state_with(
    store: Arc<InMemoryStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    bus: Option<Arc<InMemoryBus>>,
) -> AppState {
    let mut settings = Settings::default();
    settings.embeddings.dimension = DIMENSION;
    let bus: Option<Arc<dyn EventBus>> = match bus {
        Some(bus) => Some(bus),
        None => None,
    };
    AppState::build(
        settings,
        StateOverrides {
            store: Some(store),
            llm: Some(Arc::new(ScriptedLlm)),
            embedder: Some(embedder),
            bus,
        },
    )
    .unwrap()
}

async fn ingest(state: &AppState, doc_id: &str) {
    state
        .orchestrator
        .create_document(doc_id, "contract.pdf", CONTRACT.len(), None)
        .await
        .unwrap();
    // Ignore the result; individual tests assert on stored state
    let _ = state
        .orchestrator
        .ingest(doc_id, CONTRACT.as_bytes(), "contract.pdf", "application/pdf", None)
        .await;
}

#[tokio::test]
async fn test_ask_returns_grounded_answer_with_citations() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store.clone(), Arc::new(SimpleEmbedder::new(DIMENSION)), None);
    ingest(&state, "d1").await;

    let answer = state
        .responder
        .ask(AskRequest::new("d1", "How can I terminate this contract?"))
        .await
        .unwrap();

    assert!(!answer.used_clause_ids.is_empty());
    assert!((0.0..=1.0).contains(&answer.confidence));
    for source in &answer.sources {
        // Snippet is a prefix (≤300 chars) of the cited clause's original text
        let clause = store
            .get_clause("d1", &source.clause_id)
            .await
            .unwrap()
            .unwrap();
        assert!(clause.original_text.starts_with(&source.snippet));
        assert!(source.snippet.chars().count() <= 300);
        assert!((0.0..=1.0).contains(&source.relevance_score));
    }
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store, Arc::new(SimpleEmbedder::new(DIMENSION)), None);

    let result = state.responder.ask(AskRequest::new("d1", "   ")).await;
    assert!(matches!(
        result.map_err(|e| e.kind()),
        Err(ErrorKind::InputValidation)
    ));
}

#[tokio::test]
async fn test_unknown_document_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store, Arc::new(SimpleEmbedder::new(DIMENSION)), None);

    let result = state
        .responder
        .ask(AskRequest::new("ghost", "What about payment?"))
        .await;
    assert!(matches!(
        result.map_err(|e| e.kind()),
        Err(ErrorKind::NotFound)
    ));
}

#[tokio::test]
async fn test_conversation_memory_flow() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store.clone(), Arc::new(SimpleEmbedder::new(DIMENSION)), None);
    ingest(&state, "d1").await;

    let session = state
        .memory
        .create_session("contract chat", vec!["d1".to_string()])
        .await
        .unwrap();

    let mut request = AskRequest::new("d1", "How can I terminate this contract?");
    request.chat_session_id = Some(session.session_id.clone());
    request.use_conversation_memory = true;
    state.responder.ask(request).await.unwrap();

    // Allow the background appends (user + assistant) to land
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let mut request = AskRequest::new("d1", "What about liability?");
    request.chat_session_id = Some(session.session_id.clone());
    request.use_conversation_memory = true;
    let answer = state.responder.ask(request).await.unwrap();

    assert!(answer.conversation_context_used);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let messages = state.memory.get_messages(&session.session_id).await.unwrap();
    // user, assistant, user, assistant
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3].role, clauselens_core::MessageRole::Assistant);
}

#[tokio::test]
async fn test_streaming_frames_ordering_and_language() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store, Arc::new(SimpleEmbedder::new(DIMENSION)), None);
    ingest(&state, "d1").await;

    let mut request = AskRequest::new(
        "d1",
        "¿Cómo puedo cancelar este contrato? ¿Qué dice la cláusula de pago?",
    );
    request.auto_detect_language = true;

    let responder = state.responder.clone();
    let frames: Vec<StreamEvent> = responder.ask_stream(request).collect().await;

    let mut saw_language = false;
    let mut answer_index = None;
    let mut complete_index = None;
    for (i, frame) in frames.iter().enumerate() {
        match frame {
            StreamEvent::LanguageDetection {
                detected_language, ..
            } => {
                saw_language = true;
                assert_eq!(detected_language, Language::Spanish.code());
                assert!(answer_index.is_none(), "language frame must precede answer");
            },
            StreamEvent::Answer {
                response_language, ..
            } => {
                answer_index = Some(i);
                assert_eq!(response_language, Language::Spanish.code());
            },
            StreamEvent::Complete {} => complete_index = Some(i),
            StreamEvent::Error { message } => panic!("unexpected error frame: {}", message),
            _ => {},
        }
    }

    assert!(saw_language, "expected an early language_detection frame");
    let answer_index = answer_index.expect("answer frame present");
    let complete_index = complete_index.expect("complete frame present");
    assert!(complete_index > answer_index);
    assert_eq!(complete_index, frames.len() - 1, "complete frame is last");
}

#[tokio::test]
async fn test_embedding_outage_yields_document_not_ready() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store.clone(), Arc::new(BrokenEmbedder), None);
    ingest(&state, "d1").await;

    // Ingestion completed despite the embedding outage
    let document = store.get_document("d1").await.unwrap().unwrap();
    assert_eq!(document.status, DocumentStatus::Completed);
    assert!(document
        .stages_completed
        .iter()
        .any(|s| s == "embeddings_generation_failed"));

    // Lazy backfill also fails, so the ask is rejected as not ready (422)
    let result = state
        .responder
        .ask(AskRequest::new("d1", "How can I terminate this contract?"))
        .await;
    assert!(matches!(
        result.map_err(|e| e.kind()),
        Err(ErrorKind::DocumentNotReady)
    ));
}

#[tokio::test]
async fn test_lazy_backfill_recovers_when_provider_returns() {
    // Ingest with a failing embedder, then swap in a working one: the first
    // ask after recovery backfills embeddings and answers.
    let store = Arc::new(InMemoryStore::new());
    let broken = state_with(store.clone(), Arc::new(BrokenEmbedder), None);
    ingest(&broken, "d1").await;

    let healthy = state_with(store.clone(), Arc::new(SimpleEmbedder::new(DIMENSION)), None);
    let answer = healthy
        .responder
        .ask(AskRequest::new("d1", "How can I terminate this contract?"))
        .await
        .unwrap();
    assert!(!answer.used_clause_ids.is_empty());

    let clauses = store.get_document_clauses("d1").await.unwrap();
    assert!(clauses.iter().all(|c| c.has_embedding()));
}

#[tokio::test]
async fn test_question_asked_event_carries_hash_only() {
    let store = Arc::new(InMemoryStore::new());
    let bus = Arc::new(InMemoryBus::default());
    let state = state_with(
        store,
        Arc::new(SimpleEmbedder::new(DIMENSION)),
        Some(bus.clone()),
    );
    ingest(&state, "d1").await;

    let question = "How can I terminate this contract?";
    state
        .responder
        .ask(AskRequest::new("d1", question))
        .await
        .unwrap();

    // The publisher flushes within its 1 s latency window
    tokio::time::sleep(std::time::Duration::from_millis(1300)).await;

    let messages = bus.messages.lock();
    let question_events: Vec<_> = messages
        .iter()
        .filter(|m| m.attributes.get("event_type").map(String::as_str) == Some("question_asked"))
        .collect();
    assert!(!question_events.is_empty());

    for event in question_events {
        let serialized = event.data.to_string();
        assert!(!serialized.contains(question));
        let payload: serde_json::Value =
            serde_json::from_str(event.data["event_data"].as_str().unwrap()).unwrap();
        let hash = payload["question_hash"].as_str().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[tokio::test]
async fn test_session_scoped_ask() {
    let store = Arc::new(InMemoryStore::new());
    let state = state_with(store, Arc::new(SimpleEmbedder::new(DIMENSION)), None);
    ingest(&state, "d1").await;
    ingest(&state, "d2").await;

    let session = state
        .memory
        .create_session("two docs", vec!["d1".to_string(), "d2".to_string()])
        .await
        .unwrap();

    let answer = state
        .responder
        .ask_session(&session.session_id, "What about payment terms?", false, None)
        .await
        .unwrap();

    assert!((0.0..=1.0).contains(&answer.confidence));
    assert_eq!(answer.chat_session_id.as_deref(), Some(session.session_id.as_str()));
}
