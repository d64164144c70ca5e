//! Document ingestion and inspection endpoints

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clauselens_core::{ClauseRecord, DocumentStatus, Error, ReadabilityMetrics};
use clauselens_pipeline::ProcessingStatus;

use crate::error::ApiError;
use crate::state::AppState;

/// Response to a successful upload
#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub doc_id: String,
    pub status: DocumentStatus,
    pub filename: String,
    pub message: String,
}

/// Clause fields exposed on list endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ClauseSummaryView {
    pub clause_id: String,
    pub order: usize,
    pub category: String,
    pub risk_level: String,
    pub summary: String,
    pub readability_metrics: ReadabilityMetrics,
    pub needs_review: bool,
}

impl From<&ClauseRecord> for ClauseSummaryView {
    fn from(clause: &ClauseRecord) -> Self {
        Self {
            clause_id: clause.clause_id.clone(),
            order: clause.order,
            category: clause.category.as_str().to_string(),
            risk_level: clause.risk_level.as_str().to_string(),
            summary: clause.summary.clone(),
            readability_metrics: clause.readability_metrics,
            needs_review: clause.needs_review,
        }
    }
}

/// POST /api/v1/ingest: multipart upload, processed in the background
pub async fn ingest_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DocumentUploadResponse>, ApiError> {
    let mut file_content: Option<Vec<u8>> = None;
    let mut filename = String::new();
    let mut mime_type = String::new();
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("invalid multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or("upload").to_string();
                mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("failed to read file: {}", e)))?;
                file_content = Some(bytes.to_vec());
            },
            "session_id" => {
                session_id = field.text().await.ok().filter(|s| !s.is_empty());
            },
            _ => {},
        }
    }

    let Some(content) = file_content.filter(|c| !c.is_empty()) else {
        return Err(Error::InvalidInput("no file provided".to_string()).into());
    };

    {
        let config = state.config.read();
        if content.len() > config.limits.max_file_size_bytes() {
            let limit_mb = config.limits.max_file_size_mb;
            return Err(Error::InputTooLarge(format!(
                "file too large, maximum size is {} MiB",
                limit_mb
            ))
            .into());
        }
    }

    if mime_type != clauselens_pipeline::extract::MIME_PDF
        && mime_type != clauselens_pipeline::extract::MIME_DOCX
    {
        return Err(
            Error::UnsupportedFormat("only PDF and DOCX files are supported".to_string()).into(),
        );
    }

    // Fresh document id per ingestion attempt
    let doc_id = Uuid::new_v4().to_string();

    // Create the record before enqueuing so status queries never miss
    state
        .orchestrator
        .create_document(&doc_id, &filename, content.len(), session_id.clone())
        .await
        .map_err(ApiError::from)?;

    metrics::counter!("clauselens_documents_ingested_total").increment(1);
    tracing::info!(doc_id = %doc_id, filename = %filename, size = content.len(), "Document accepted");

    let orchestrator = state.orchestrator.clone();
    let background_doc_id = doc_id.clone();
    let background_filename = filename.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator
            .ingest(
                &background_doc_id,
                &content,
                &background_filename,
                &mime_type,
                session_id,
            )
            .await
        {
            tracing::error!(doc_id = %background_doc_id, error = %e, "Background processing failed");
        }
    });

    Ok(Json(DocumentUploadResponse {
        doc_id,
        status: DocumentStatus::Processing,
        filename,
        message: "Document accepted for processing".to_string(),
    }))
}

/// GET /api/v1/status/{doc_id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<ProcessingStatus>, ApiError> {
    let status = state
        .orchestrator
        .get_processing_status(&doc_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError(Error::NotFound(format!("document {}", doc_id))))?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct ClausesQuery {
    pub doc_id: String,
}

/// GET /api/v1/clauses?doc_id=...
///
/// 404 for unknown documents; an empty array while processing.
pub async fn list_clauses(
    State(state): State<AppState>,
    Query(query): Query<ClausesQuery>,
) -> Result<Json<Vec<ClauseSummaryView>>, ApiError> {
    let document = state
        .store
        .get_document(&query.doc_id)
        .await
        .map_err(Error::from)?;
    if document.is_none() {
        return Err(ApiError(Error::NotFound(format!(
            "document {}",
            query.doc_id
        ))));
    }

    let clauses = state
        .store
        .get_document_clauses(&query.doc_id)
        .await
        .map_err(Error::from)?;

    Ok(Json(clauses.iter().map(ClauseSummaryView::from).collect()))
}

/// GET /api/v1/clause/{clause_id}?doc_id=...
pub async fn get_clause(
    State(state): State<AppState>,
    Path(clause_id): Path<String>,
    Query(query): Query<ClausesQuery>,
) -> Result<Json<ClauseRecord>, ApiError> {
    let clause = state
        .store
        .get_clause(&query.doc_id, &clause_id)
        .await
        .map_err(Error::from)?
        .ok_or_else(|| ApiError(Error::NotFound(format!("clause {}", clause_id))))?;
    Ok(Json(clause))
}

/// GET /api/v1/negotiations?doc_id=...&clause_id=...
#[derive(Debug, Deserialize)]
pub struct NegotiationsQuery {
    pub doc_id: String,
    pub clause_id: Option<String>,
}

pub async fn list_negotiations(
    State(state): State<AppState>,
    Query(query): Query<NegotiationsQuery>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let records = state
        .store
        .get_negotiations(&query.doc_id, query.clause_id.as_deref())
        .await
        .map_err(Error::from)?;
    Ok(Json(records))
}

/// POST /api/v1/negotiations
#[derive(Debug, Deserialize)]
pub struct SaveNegotiationBody {
    pub doc_id: String,
    pub clause_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

pub async fn save_negotiation(
    State(state): State<AppState>,
    Json(body): Json<SaveNegotiationBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let negotiation_id = Uuid::new_v4().to_string();
    let mut data = body.data;
    if !data.is_object() {
        data = serde_json::json!({});
    }
    if let Some(object) = data.as_object_mut() {
        object.insert("doc_id".to_string(), serde_json::json!(body.doc_id));
        if let Some(clause_id) = &body.clause_id {
            object.insert("clause_id".to_string(), serde_json::json!(clause_id));
        }
    }

    state
        .store
        .save_negotiation(&negotiation_id, data)
        .await
        .map_err(Error::from)?;

    Ok(Json(serde_json::json!({ "negotiation_id": negotiation_id })))
}
