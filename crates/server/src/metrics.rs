//! Prometheus metrics

use axum::extract::State;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;

use crate::state::AppState;

static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Install the Prometheus recorder. Safe to call once per process.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let mut guard = HANDLE.lock();
    if guard.is_some() {
        return guard.clone();
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            *guard = Some(handle.clone());
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        },
    }
}

/// GET /metrics
pub async fn metrics_handler(State(_state): State<AppState>) -> String {
    HANDLE
        .lock()
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
