//! HTTP server for the contract analysis platform

pub mod chat;
pub mod documents;
pub mod error;
pub mod http;
pub mod metrics;
pub mod qa;
pub mod state;

pub use error::ApiError;
pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;
