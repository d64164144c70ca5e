//! HTTP router

use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post, put};
use axum::{extract::State, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{chat, documents, metrics, qa};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.read();
    let cors_layer = cors_policy(config.server.cors_enabled, &config.server.cors_origins);
    drop(config);

    Router::new()
        // Ingestion and document inspection
        .route("/api/v1/ingest", post(documents::ingest_document))
        .route("/api/v1/status/:doc_id", get(documents::get_status))
        .route("/api/v1/clauses", get(documents::list_clauses))
        .route("/api/v1/clause/:clause_id", get(documents::get_clause))
        .route(
            "/api/v1/negotiations",
            get(documents::list_negotiations).post(documents::save_negotiation),
        )
        // Q&A
        .route("/api/v1/ask", post(qa::ask))
        .route("/api/v1/ask-stream", post(qa::ask_stream))
        .route("/api/v1/history/:doc_id", get(qa::get_history))
        .route("/api/v1/cache/stats", get(qa::cache_stats))
        .route("/api/v1/cache/clear", post(qa::cache_clear))
        // Chat sessions
        .route(
            "/api/v1/sessions",
            get(chat::list_sessions).post(chat::create_session),
        )
        .route(
            "/api/v1/sessions/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
        .route(
            "/api/v1/sessions/:id/documents",
            put(chat::update_session_documents),
        )
        .route("/api/v1/sessions/:id/messages", post(chat::add_message))
        .route("/api/v1/sessions/:id/archive", post(chat::archive_session))
        .route("/api/v1/sessions/:id/ask", post(chat::session_ask))
        // Operational
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// CORS policy derived from configuration.
///
/// With enforcement off everything passes, which is only acceptable for
/// local development. When no usable origin is configured the policy locks
/// down to the local frontend instead of opening up.
fn cors_policy(enabled: bool, origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

    if !enabled {
        tracing::warn!("CORS enforcement is off; every origin will be accepted");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            let parsed = origin.parse::<HeaderValue>().ok();
            if parsed.is_none() {
                tracing::warn!(origin = %origin, "Skipping unparseable CORS origin");
            }
            parsed
        })
        .collect();

    if allowed.is_empty() {
        tracing::info!("No usable CORS origins configured; restricting to the local frontend");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods(methods)
            .allow_headers(Any);
    }

    tracing::info!(count = allowed.len(), "CORS origin allowlist loaded");
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(methods)
        .allow_headers(Any)
}

/// GET /health reporting per-dependency status
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();

    let store_healthy = state.store.health_check().await;
    checks.insert(
        "store".to_string(),
        serde_json::json!({ "status": if store_healthy { "ok" } else { "unreachable" } }),
    );

    checks.insert(
        "cache".to_string(),
        serde_json::json!({ "status": "ok", "size": state.cache.stats().size }),
    );

    checks.insert(
        "analytics".to_string(),
        serde_json::json!({
            "status": if state.analytics.is_some() { "ok" } else { "disabled" }
        }),
    );

    let healthy = store_healthy;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks,
        })),
    )
}
