//! Grounded Q&A responder
//!
//! The retrieval-augmented request path: language resolution, conversation
//! context, cached clause lookup with lazy embedding backfill, cosine
//! retrieval, constrained LLM generation, citation synthesis, analytics,
//! and background history persistence. Unary and streaming variants share
//! the same steps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;

use clauselens_analytics::{AnalyticsEvent, AnalyticsPublisher};
use clauselens_config::constants::citation::SNIPPET_CHARS;
use clauselens_config::constants::language::OVERRIDE_CONFIDENCE;
use clauselens_core::{
    Answer, ChatSession, ClauseRecord, DocumentStatus, Error, Language, MessageRole,
    QaHistoryRecord, SourceCitation,
};
use clauselens_llm::{
    build_qa_system_prompt, build_qa_user_prompt, parse_qa_response, LlmBackend, QaClauseContext,
};
use clauselens_persistence::DocumentStore;
use clauselens_rag::{CacheKeys, ClauseCache, EmbeddingIndexer, Retriever, ScoredClause};

use crate::language::{DetectionResult, LanguageDetector};
use crate::memory::ConversationMemory;
use crate::stream::StreamEvent;

/// Answer used when retrieval comes back empty
const NO_RELATED_CLAUSES: &str = "I couldn't find any clauses in this document that relate to \
     your question. Please try rephrasing your question or ask about different aspects of the \
     document.";

/// Answer used when the model output cannot be parsed
const APOLOGY: &str =
    "I apologize, but I'm having trouble processing your question right now.";

/// Q&A request
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub doc_id: String,
    pub question: String,
    pub session_id: Option<String>,
    pub chat_session_id: Option<String>,
    pub use_conversation_memory: bool,
    pub auto_detect_language: bool,
    pub language_override: Option<Language>,
}

impl AskRequest {
    pub fn new(doc_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            question: question.into(),
            session_id: None,
            chat_session_id: None,
            use_conversation_memory: false,
            auto_detect_language: false,
            language_override: None,
        }
    }
}

/// Responder tuning
#[derive(Debug, Clone)]
pub struct QaConfig {
    pub default_language: Language,
    pub cache_ttl: Duration,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            default_language: Language::English,
            cache_ttl: clauselens_config::constants::cache::DEFAULT_TTL,
        }
    }
}

/// Conversation state gathered before generation
struct ConversationState {
    context_text: String,
    context_used: bool,
    chat_session_id: Option<String>,
}

/// Q&A responder
pub struct QaResponder {
    store: Arc<dyn DocumentStore>,
    cache: Arc<ClauseCache>,
    retriever: Arc<Retriever>,
    indexer: Arc<EmbeddingIndexer>,
    llm: Arc<dyn LlmBackend>,
    memory: Arc<ConversationMemory>,
    analytics: Option<Arc<AnalyticsPublisher>>,
    detector: LanguageDetector,
    config: QaConfig,
}

impl QaResponder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<ClauseCache>,
        retriever: Arc<Retriever>,
        indexer: Arc<EmbeddingIndexer>,
        llm: Arc<dyn LlmBackend>,
        memory: Arc<ConversationMemory>,
        config: QaConfig,
    ) -> Self {
        Self {
            store,
            cache,
            retriever,
            indexer,
            llm,
            memory,
            analytics: None,
            detector: LanguageDetector::new(),
            config,
        }
    }

    pub fn with_analytics(mut self, analytics: Arc<AnalyticsPublisher>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// Answer a question about one document
    pub async fn ask(&self, request: AskRequest) -> Result<Answer, Error> {
        let started = Instant::now();

        if request.question.trim().is_empty() {
            return Err(Error::InvalidInput("question cannot be empty".to_string()));
        }

        let (detection, response_language) = self.resolve_language(&request);
        let conversation = self.load_conversation(&request).await;

        let clauses = self.clauses_with_embeddings(&request.doc_id).await?;
        let scored = self
            .retriever
            .search(&request.question, &clauses)
            .await
            .map_err(Error::from)?;

        if scored.is_empty() {
            let answer = self.ungrounded_answer(
                NO_RELATED_CLAUSES,
                &conversation,
                detection.as_ref(),
                response_language,
            );
            self.append_assistant_message(&conversation, &answer, true);
            return Ok(answer);
        }

        let contexts = single_document_contexts(&scored);
        let mut answer = self
            .generate_answer(
                &request.question,
                &contexts,
                &scored,
                &conversation,
                response_language,
            )
            .await;
        attach_detection(&mut answer, detection.as_ref());

        self.emit_question_event(&request.question, &answer, started, conversation.chat_session_id.clone());
        self.persist_interaction(&request, &answer, scored.len());
        self.append_assistant_message(&conversation, &answer, false);

        Ok(answer)
    }

    /// Answer a question over a chat session's selected documents
    pub async fn ask_session(
        &self,
        session_id: &str,
        question: &str,
        auto_detect_language: bool,
        language_override: Option<Language>,
    ) -> Result<Answer, Error> {
        let started = Instant::now();

        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question cannot be empty".to_string()));
        }

        let session = self
            .memory
            .get_session(session_id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

        if session.selected_documents.is_empty() {
            return Err(Error::InvalidInput(
                "session has no selected documents".to_string(),
            ));
        }

        let request = AskRequest {
            doc_id: session.selected_documents[0].clone(),
            question: question.to_string(),
            session_id: None,
            chat_session_id: Some(session_id.to_string()),
            use_conversation_memory: true,
            auto_detect_language,
            language_override,
        };
        let (detection, response_language) = self.resolve_language(&request);
        let conversation = self.load_conversation(&request).await;

        let scored = self
            .retrieve_for_session(&session, question)
            .await?;

        if scored.is_empty() {
            let answer = self.ungrounded_answer(
                NO_RELATED_CLAUSES,
                &conversation,
                detection.as_ref(),
                response_language,
            );
            self.append_assistant_message(&conversation, &answer, true);
            return Ok(answer);
        }

        // Across documents clause orders collide, so the prompt numbering is
        // positional; citations still carry each clause's real order.
        let contexts = renumbered_contexts(&scored);
        let mut answer = self
            .generate_answer(question, &contexts, &scored, &conversation, response_language)
            .await;
        attach_detection(&mut answer, detection.as_ref());

        self.emit_question_event(question, &answer, started, Some(session_id.to_string()));
        self.persist_interaction(&request, &answer, scored.len());
        self.append_assistant_message(&conversation, &answer, false);

        Ok(answer)
    }

    /// Streaming variant: same pipeline, emitted as typed frames
    pub fn ask_stream(
        self: Arc<Self>,
        request: AskRequest,
    ) -> impl Stream<Item = StreamEvent> + Send {
        async_stream::stream! {
            let started = Instant::now();
            yield StreamEvent::status("Processing your question...");

            if request.question.trim().is_empty() {
                yield StreamEvent::Error { message: "Question cannot be empty".to_string() };
                return;
            }

            if request.auto_detect_language {
                yield StreamEvent::status("Detecting language...");
            }
            let (detection, response_language) = self.resolve_language(&request);
            if let Some(detection) = &detection {
                if request.language_override.is_none()
                    && detection.confidence > OVERRIDE_CONFIDENCE
                {
                    yield StreamEvent::LanguageDetection {
                        detected_language: detection.language.code().to_string(),
                        confidence: detection.confidence,
                    };
                }
            }

            if request.chat_session_id.is_some() && request.use_conversation_memory {
                yield StreamEvent::UserMessage {
                    content: request.question.clone(),
                    chat_session_id: request.chat_session_id.clone(),
                };
                yield StreamEvent::status("Loading conversation context...");
            }
            let conversation = self.load_conversation(&request).await;

            yield StreamEvent::status("Fetching document clauses...");
            let clauses = match self.clauses_with_embeddings(&request.doc_id).await {
                Ok(clauses) => clauses,
                Err(e) => {
                    yield StreamEvent::Error { message: e.to_string() };
                    return;
                },
            };

            yield StreamEvent::status(format!(
                "Searching {} clauses for relevance...",
                clauses.len()
            ));
            let scored = match self.retriever.search(&request.question, &clauses).await {
                Ok(scored) => scored,
                Err(e) => {
                    yield StreamEvent::Error { message: Error::from(e).to_string() };
                    return;
                },
            };

            if scored.is_empty() {
                let answer = self.ungrounded_answer(
                    NO_RELATED_CLAUSES,
                    &conversation,
                    detection.as_ref(),
                    response_language,
                );
                self.append_assistant_message(&conversation, &answer, true);
                yield answer_frame(&answer);
                yield StreamEvent::Complete {};
                return;
            }

            yield StreamEvent::status(format!(
                "Found {} relevant clauses. Generating answer...",
                scored.len()
            ));
            let contexts = single_document_contexts(&scored);
            let mut answer = self
                .generate_answer(
                    &request.question,
                    &contexts,
                    &scored,
                    &conversation,
                    response_language,
                )
                .await;
            attach_detection(&mut answer, detection.as_ref());

            self.emit_question_event(&request.question, &answer, started, conversation.chat_session_id.clone());
            self.persist_interaction(&request, &answer, scored.len());
            self.append_assistant_message(&conversation, &answer, false);

            yield answer_frame(&answer);
            yield StreamEvent::Complete {};
        }
    }

    /// Resolve the response language: override > confident detection > default
    fn resolve_language(&self, request: &AskRequest) -> (Option<DetectionResult>, Language) {
        let detection = request
            .auto_detect_language
            .then(|| self.detector.detect(&request.question));

        let language = if let Some(language) = request.language_override {
            language
        } else if let Some(detection) = &detection {
            if detection.confidence > OVERRIDE_CONFIDENCE {
                detection.language
            } else {
                self.config.default_language
            }
        } else {
            self.config.default_language
        };

        (detection, language)
    }

    /// Fetch the conversation window and queue the user-message append
    async fn load_conversation(&self, request: &AskRequest) -> ConversationState {
        let session_id = match (&request.chat_session_id, request.use_conversation_memory) {
            (Some(session_id), true) => session_id.clone(),
            _ => {
                return ConversationState {
                    context_text: String::new(),
                    context_used: false,
                    chat_session_id: None,
                }
            },
        };

        let (context_text, context_used) = match self.memory.get_context(&session_id).await {
            Ok((window, summary)) => {
                let used = !window.is_empty() || summary.is_some();
                (self.memory.format_context(&window, summary.as_deref()), used)
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load conversation context");
                (String::new(), false)
            },
        };

        // Background append; failures are logged, never surfaced
        let memory = self.memory.clone();
        let append_session = session_id.clone();
        let question = request.question.clone();
        let doc_id = request.doc_id.clone();
        tokio::spawn(async move {
            let metadata = HashMap::from([(
                "doc_id".to_string(),
                serde_json::Value::String(doc_id),
            )]);
            if let Err(e) = memory
                .add_message(&append_session, MessageRole::User, question, vec![], metadata)
                .await
            {
                tracing::error!(error = %e, "Failed to append user message");
            }
        });

        ConversationState {
            context_text,
            context_used,
            chat_session_id: Some(session_id),
        }
    }

    /// Clauses of a document that carry embeddings, backfilling lazily when
    /// the document is completed but embeddings are missing.
    async fn clauses_with_embeddings(&self, doc_id: &str) -> Result<Vec<ClauseRecord>, Error> {
        let key = CacheKeys::document_clauses(doc_id);

        let clauses: Vec<ClauseRecord> = match self.cache.get(&key) {
            Some(cached) => {
                tracing::debug!(doc_id, "Clause cache hit");
                (*cached).clone()
            },
            None => {
                let loaded = self
                    .store
                    .get_document_clauses(doc_id)
                    .await
                    .map_err(Error::from)?;
                if !loaded.is_empty() {
                    self.cache
                        .set_with_ttl(&key, loaded.clone(), self.config.cache_ttl);
                }
                loaded
            },
        };

        if clauses.is_empty() {
            return Err(Error::NotFound(format!(
                "no clauses found for document {}",
                doc_id
            )));
        }

        let with_embeddings: Vec<ClauseRecord> = clauses
            .iter()
            .filter(|c| c.has_embedding())
            .cloned()
            .collect();
        if !with_embeddings.is_empty() {
            return Ok(with_embeddings);
        }

        // Embeddings missing entirely: recoverable only for completed documents
        let document = self
            .store
            .get_document(doc_id)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| Error::NotFound(format!("document {}", doc_id)))?;

        if document.status != DocumentStatus::Completed {
            return Err(Error::DocumentNotReady(format!(
                "document is not fully processed yet (status: {})",
                document.status.as_str()
            )));
        }

        tracing::warn!(doc_id, "Completed document missing embeddings, backfilling");
        match self.indexer.index(doc_id, &clauses).await {
            Ok(count) if count > 0 => {
                let reloaded = self
                    .store
                    .get_document_clauses(doc_id)
                    .await
                    .map_err(Error::from)?;
                self.cache
                    .set_with_ttl(&key, reloaded.clone(), self.config.cache_ttl);
                let with_embeddings: Vec<ClauseRecord> = reloaded
                    .into_iter()
                    .filter(|c| c.has_embedding())
                    .collect();
                if with_embeddings.is_empty() {
                    Err(Error::DocumentNotReady(
                        "embeddings are missing and could not be generated".to_string(),
                    ))
                } else {
                    Ok(with_embeddings)
                }
            },
            Ok(_) => Err(Error::DocumentNotReady(
                "embeddings are missing and could not be generated".to_string(),
            )),
            Err(e) => {
                tracing::error!(doc_id, error = %e, "Lazy embedding backfill failed");
                Err(Error::DocumentNotReady(
                    "embeddings are missing and could not be generated".to_string(),
                ))
            },
        }
    }

    /// Per-document retrieval across a session's selected documents
    async fn retrieve_for_session(
        &self,
        session: &ChatSession,
        question: &str,
    ) -> Result<Vec<ScoredClause>, Error> {
        let mut documents = Vec::new();
        for doc_id in &session.selected_documents {
            match self.clauses_with_embeddings(doc_id).await {
                Ok(clauses) => documents.push((doc_id.clone(), clauses)),
                Err(e) => {
                    // One unready document does not sink the session question
                    tracing::warn!(doc_id = %doc_id, error = %e, "Skipping document in session search");
                },
            }
        }

        if documents.is_empty() {
            return Err(Error::DocumentNotReady(
                "no session document has searchable clauses".to_string(),
            ));
        }

        self.retriever
            .search_multi(question, &documents)
            .await
            .map_err(Error::from)
    }

    /// Steps 7–9: grounded prompt, constrained generation, citations
    async fn generate_answer(
        &self,
        question: &str,
        contexts: &[QaClauseContext],
        scored: &[ScoredClause],
        conversation: &ConversationState,
        response_language: Language,
    ) -> Answer {
        let system_prompt = build_qa_system_prompt(response_language);
        let context = (!conversation.context_text.is_empty())
            .then_some(conversation.context_text.as_str());
        let user_prompt = build_qa_user_prompt(question, contexts, context);

        let response = match self.llm.generate(&system_prompt, &user_prompt).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Q&A generation failed");
                return self.apology(conversation, response_language);
            },
        };

        let Some(result) = parse_qa_response(&response, contexts) else {
            tracing::error!("Failed to parse Q&A response");
            return self.apology(conversation, response_language);
        };

        let sources: Vec<SourceCitation> = result
            .used_clause_numbers
            .iter()
            .filter_map(|number| {
                let position = contexts.iter().position(|c| c.order == *number)?;
                let scored_clause = scored.get(position)?;
                Some(build_citation(scored_clause))
            })
            .collect();

        Answer {
            answer: result.answer,
            used_clause_ids: sources.iter().map(|s| s.clause_id.clone()).collect(),
            confidence: result.confidence,
            sources,
            chat_session_id: conversation.chat_session_id.clone(),
            conversation_context_used: conversation.context_used,
            detected_language: None,
            response_language,
            language_detection_confidence: None,
            detection_method: None,
            timestamp: chrono::Utc::now(),
        }
    }

    fn apology(&self, conversation: &ConversationState, language: Language) -> Answer {
        let mut answer = Answer::ungrounded(APOLOGY, language);
        answer.chat_session_id = conversation.chat_session_id.clone();
        answer.conversation_context_used = conversation.context_used;
        answer
    }

    fn ungrounded_answer(
        &self,
        text: &str,
        conversation: &ConversationState,
        detection: Option<&DetectionResult>,
        language: Language,
    ) -> Answer {
        let mut answer = Answer::ungrounded(text, language);
        answer.chat_session_id = conversation.chat_session_id.clone();
        answer.conversation_context_used = conversation.context_used;
        attach_detection(&mut answer, detection);
        answer
    }

    /// Emit the question_asked event; publish failure never fails the request.
    /// The event carries only a SHA-256 hash of the question.
    fn emit_question_event(
        &self,
        question: &str,
        answer: &Answer,
        started: Instant,
        session_id: Option<String>,
    ) {
        if let Some(analytics) = &self.analytics {
            let event = AnalyticsEvent::question_asked(
                question,
                answer.confidence,
                answer.sources.len(),
                started.elapsed().as_millis() as u64,
                session_id,
            );
            analytics.publish_event(&event);
        }
    }

    /// Background persistence of the Q&A history record
    fn persist_interaction(&self, request: &AskRequest, answer: &Answer, relevant: usize) {
        let store = self.store.clone();
        let record = QaHistoryRecord {
            qa_id: uuid::Uuid::new_v4().to_string(),
            doc_id: request.doc_id.clone(),
            question: request.question.clone(),
            answer: answer.answer.clone(),
            clause_ids: answer.used_clause_ids.clone(),
            confidence: answer.confidence,
            session_id: request
                .session_id
                .clone()
                .or_else(|| request.chat_session_id.clone()),
            relevant_clause_count: relevant,
            timestamp: chrono::Utc::now(),
        };
        tokio::spawn(async move {
            if let Err(e) = store.save_qa_history(record).await {
                tracing::error!(error = %e, "Failed to store Q&A history");
            }
        });
    }

    /// Background append of the assistant message to the chat session
    fn append_assistant_message(
        &self,
        conversation: &ConversationState,
        answer: &Answer,
        no_relevant_clauses: bool,
    ) {
        let Some(session_id) = conversation.chat_session_id.clone() else {
            return;
        };

        let memory = self.memory.clone();
        let content = answer.answer.clone();
        let sources: Vec<serde_json::Value> = answer
            .sources
            .iter()
            .filter_map(|s| serde_json::to_value(s).ok())
            .collect();
        let mut metadata = HashMap::from([
            (
                "used_clause_ids".to_string(),
                serde_json::json!(answer.used_clause_ids),
            ),
            ("confidence".to_string(), serde_json::json!(answer.confidence)),
            (
                "conversation_context_used".to_string(),
                serde_json::json!(answer.conversation_context_used),
            ),
        ]);
        if no_relevant_clauses {
            metadata.insert("no_relevant_clauses".to_string(), serde_json::json!(true));
        }

        tokio::spawn(async move {
            if let Err(e) = memory
                .add_message(&session_id, MessageRole::Assistant, content, sources, metadata)
                .await
            {
                tracing::error!(error = %e, "Failed to append assistant message");
            }
        });
    }
}

/// Contexts for a single document: prompt numbering is the clause order
fn single_document_contexts(scored: &[ScoredClause]) -> Vec<QaClauseContext> {
    scored
        .iter()
        .map(|s| QaClauseContext {
            clause_id: s.clause.clause_id.clone(),
            order: s.clause.order,
            category: s.clause.category.as_str().to_string(),
            summary: s.clause.summary.clone(),
            original_text: s.clause.original_text.clone(),
        })
        .collect()
}

/// Contexts across documents: positional numbering to avoid order collisions
fn renumbered_contexts(scored: &[ScoredClause]) -> Vec<QaClauseContext> {
    scored
        .iter()
        .enumerate()
        .map(|(i, s)| QaClauseContext {
            clause_id: s.clause.clause_id.clone(),
            order: i + 1,
            category: s.clause.category.as_str().to_string(),
            summary: s.clause.summary.clone(),
            original_text: s.clause.original_text.clone(),
        })
        .collect()
}

fn build_citation(scored: &ScoredClause) -> SourceCitation {
    let snippet: String = scored
        .clause
        .original_text
        .chars()
        .take(SNIPPET_CHARS)
        .collect();
    SourceCitation {
        clause_id: scored.clause.clause_id.clone(),
        clause_number: scored.clause.order,
        category: scored.clause.category.as_str().to_string(),
        snippet,
        relevance_score: scored.similarity,
    }
}

fn attach_detection(answer: &mut Answer, detection: Option<&DetectionResult>) {
    if let Some(detection) = detection {
        answer.detected_language = Some(detection.language);
        answer.language_detection_confidence = Some(detection.confidence);
        answer.detection_method = Some(detection.method.clone());
    }
}

fn answer_frame(answer: &Answer) -> StreamEvent {
    StreamEvent::Answer {
        content: answer.answer.clone(),
        confidence: answer.confidence,
        sources: answer.sources.clone(),
        chat_session_id: answer.chat_session_id.clone(),
        conversation_context_used: answer.conversation_context_used,
        response_language: answer.response_language.code().to_string(),
    }
}
