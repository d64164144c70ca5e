//! Q&A endpoints: unary, streaming, history, cache admin

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;

use clauselens_agent::AskRequest;
use clauselens_core::{Answer, Error, Language, QaHistoryRecord};

use crate::error::ApiError;
use crate::state::AppState;

/// Body of /ask and /ask-stream
#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub doc_id: String,
    pub question: String,
    pub session_id: Option<String>,
    pub chat_session_id: Option<String>,
    #[serde(default)]
    pub use_conversation_memory: bool,
    #[serde(default)]
    pub auto_detect_language: bool,
    pub language_override: Option<Language>,
}

impl From<AskBody> for AskRequest {
    fn from(body: AskBody) -> Self {
        AskRequest {
            doc_id: body.doc_id,
            question: body.question,
            session_id: body.session_id,
            chat_session_id: body.chat_session_id,
            use_conversation_memory: body.use_conversation_memory,
            auto_detect_language: body.auto_detect_language,
            language_override: body.language_override,
        }
    }
}

/// POST /api/v1/ask
pub async fn ask(
    State(state): State<AppState>,
    Json(body): Json<AskBody>,
) -> Result<Json<Answer>, ApiError> {
    metrics::counter!("clauselens_questions_asked_total").increment(1);
    let answer = state.responder.ask(body.into()).await.map_err(ApiError::from)?;
    Ok(Json(answer))
}

/// POST /api/v1/ask-stream: server-sent events, one JSON object per frame
pub async fn ask_stream(State(state): State<AppState>, Json(body): Json<AskBody>) -> Response {
    metrics::counter!("clauselens_questions_asked_total").increment(1);

    let stream = Arc::clone(&state.responder)
        .ask_stream(body.into())
        .map(|event| Ok::<Event, std::convert::Infallible>(Event::default().data(event.to_json())));

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    // Proxies must not buffer the event stream
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-accel-buffering"),
        header::HeaderValue::from_static("no"),
    );
    response
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    10
}

/// GET /api/v1/history/{doc_id}
pub async fn get_history(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<QaHistoryRecord>>, ApiError> {
    let records = state
        .store
        .get_qa_history(&doc_id, query.limit)
        .await
        .map_err(Error::from)?;
    Ok(Json(records))
}

/// GET /api/v1/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "cache_stats": state.cache.stats(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /api/v1/cache/clear
pub async fn cache_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.cache.clear();
    tracing::info!("Clause cache cleared");
    Json(serde_json::json!({
        "message": "Cache cleared successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
