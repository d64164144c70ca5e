//! Chat session endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use clauselens_core::{
    Answer, ChatMessage, ChatSession, Error, Language, MessageRole,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub title: Option<String>,
    #[serde(default)]
    pub document_ids: Vec<String>,
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<ChatSession>, ApiError> {
    let title = body.title.unwrap_or_else(|| "New conversation".to_string());
    let session = state
        .memory
        .create_session(title, body.document_ids)
        .await
        .map_err(Error::from)?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_archived: bool,
}

fn default_limit() -> usize {
    50
}

/// GET /api/v1/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state
        .memory
        .list_sessions(query.limit.min(100), query.include_archived)
        .await
        .map_err(Error::from)?;
    Ok(Json(serde_json::json!({
        "sessions": sessions,
        "total_count": sessions.len(),
    })))
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session = state
        .memory
        .get_session(&session_id)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| ApiError(Error::NotFound(format!("session {}", session_id))))?;
    let messages = state
        .memory
        .get_messages(&session_id)
        .await
        .map_err(Error::from)?;
    Ok(Json(SessionDetail { session, messages }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentsBody {
    pub document_ids: Vec<String>,
}

/// PUT /api/v1/sessions/{id}/documents
pub async fn update_session_documents(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<UpdateDocumentsBody>,
) -> Result<Json<ChatSession>, ApiError> {
    let session = state
        .memory
        .update_session_documents(&session_id, body.document_ids)
        .await
        .map_err(Error::from)?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct AddMessageBody {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

/// POST /api/v1/sessions/{id}/messages
pub async fn add_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<AddMessageBody>,
) -> Result<Json<ChatMessage>, ApiError> {
    let message = state
        .memory
        .add_message(&session_id, body.role, body.content, body.sources, body.metadata)
        .await
        .map_err(Error::from)?;
    Ok(Json(message))
}

/// POST /api/v1/sessions/{id}/archive
pub async fn archive_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .memory
        .archive_session(&session_id)
        .await
        .map_err(Error::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .memory
        .delete_session(&session_id)
        .await
        .map_err(Error::from)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SessionAskBody {
    pub question: String,
    #[serde(default)]
    pub auto_detect_language: bool,
    pub language_override: Option<Language>,
}

/// POST /api/v1/sessions/{id}/ask: session-scoped Q&A with memory
pub async fn session_ask(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SessionAskBody>,
) -> Result<Json<Answer>, ApiError> {
    metrics::counter!("clauselens_questions_asked_total").increment(1);
    let answer = state
        .responder
        .ask_session(
            &session_id,
            &body.question,
            body.auto_detect_language,
            body.language_override,
        )
        .await
        .map_err(ApiError::from)?;
    Ok(Json(answer))
}
