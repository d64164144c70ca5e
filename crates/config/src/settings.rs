//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Upload and document limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Clause cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Layout-aware extractor configuration
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// PII scanning configuration
    #[serde(default)]
    pub privacy: PrivacyConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Analytics event publishing configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_rate_limit() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            rate_limit_per_minute: default_rate_limit(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Upload and document limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_max_file_size_mb() -> usize {
    10
}

fn default_max_pages() -> usize {
    10
}

impl LimitsConfig {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            max_pages: default_max_pages(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
    #[serde(default = "default_max_clauses_per_batch")]
    pub max_clauses_per_batch: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_llm_endpoint() -> String {
    "http://localhost:8089".to_string()
}

fn default_max_prompt_tokens() -> usize {
    30_000
}

fn default_max_output_tokens() -> usize {
    8_000
}

fn default_max_clauses_per_batch() -> usize {
    10
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            endpoint: default_llm_endpoint(),
            api_key: None,
            max_prompt_tokens: default_max_prompt_tokens(),
            max_output_tokens: default_max_output_tokens(),
            max_clauses_per_batch: default_max_clauses_per_batch(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vector dimension every clause embedding must have
    #[serde(default = "default_embedding_dim")]
    pub dimension: usize,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_embedding_endpoint() -> String {
    "http://localhost:8090".to_string()
}

fn default_embedding_dim() -> usize {
    768
}

fn default_embedding_batch_size() -> usize {
    100
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            endpoint: default_embedding_endpoint(),
            api_key: None,
            dimension: default_embedding_dim(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

fn default_top_k() -> usize {
    crate::constants::retrieval::DEFAULT_TOP_K
}

fn default_min_similarity() -> f64 {
    crate::constants::retrieval::MIN_SIMILARITY
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

/// Clause cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    1800
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Layout-aware extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Use the external layout-aware extractor before local fallbacks
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_extractor_endpoint")]
    pub endpoint: String,
}

fn default_extractor_endpoint() -> String {
    "http://localhost:8094".to_string()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_extractor_endpoint(),
        }
    }
}

/// PII scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyConfig {
    /// Use the external PII scanner; the regex catalog is the fallback
    #[serde(default = "default_true")]
    pub scanner_enabled: bool,
    #[serde(default = "default_scanner_endpoint")]
    pub scanner_endpoint: String,
}

fn default_true() -> bool {
    true
}

fn default_scanner_endpoint() -> String {
    "http://localhost:8091".to_string()
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            scanner_enabled: default_true(),
            scanner_endpoint: default_scanner_endpoint(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Talk to the HTTP document store; false keeps everything in memory
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_store_base_url() -> String {
    "http://localhost:8092".to_string()
}

fn default_project_id() -> String {
    "clauselens-dev".to_string()
}

fn default_store_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_store_base_url(),
            project_id: default_project_id(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

/// Analytics event publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Warehouse table the bus streams into, recorded for operators
    #[serde(default = "default_table_ref")]
    pub table_ref: String,
    #[serde(default = "default_bus_endpoint")]
    pub bus_endpoint: String,
}

fn default_topic() -> String {
    "clauselens-events".to_string()
}

fn default_table_ref() -> String {
    "clauselens.events".to_string()
}

fn default_bus_endpoint() -> String {
    "http://localhost:8093".to_string()
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            topic: default_topic(),
            table_ref: default_table_ref(),
            bus_endpoint: default_bus_endpoint(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_file_size_mb".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.limits.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_pages".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.embeddings.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embeddings.dimension".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.min_similarity".to_string(),
                message: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.retrieval.min_similarity
                ),
            });
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.llm.max_clauses_per_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_clauses_per_batch".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.llm.max_prompt_tokens < 1000 {
            return Err(ConfigError::InvalidValue {
                field: "llm.max_prompt_tokens".to_string(),
                message: "prompt budget too small (minimum 1000)".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from config files and environment.
///
/// Priority: env vars > `config/{env}.yaml` > `config/default.yaml` > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = Path::new("config/default.yaml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    if let Some(env_name) = env {
        let env_path_string = format!("config/{}.yaml", env_name);
        let env_path = Path::new(&env_path_string);
        if env_path.exists() {
            builder = builder.add_source(File::from(env_path));
        } else {
            tracing::warn!(path = %env_path_string, "Environment config file not found");
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("CLAUSELENS")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let settings: Settings = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.limits.max_file_size_mb, 10);
        assert_eq!(settings.limits.max_file_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(settings.cache.ttl_secs, 1800);
        assert_eq!(settings.embeddings.dimension, 768);
    }

    #[test]
    fn test_invalid_similarity_rejected() {
        let mut settings = Settings::default();
        settings.retrieval.min_similarity = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let mut settings = Settings::default();
        settings.llm.max_clauses_per_batch = 0;
        assert!(settings.validate().is_err());
    }
}
