//! Configuration for the contract analysis platform
//!
//! Settings are layered: `config/default.yaml`, then `config/{env}.yaml`,
//! then `CLAUSELENS_*` environment variables. Everything has a default so
//! the server can start with no files present.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, AnalyticsConfig, CacheConfig, EmbeddingsConfig, ExtractorConfig,
    LimitsConfig, LlmConfig, PrivacyConfig, RetrievalConfig, RuntimeEnvironment, ServerConfig,
    Settings, StoreConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
