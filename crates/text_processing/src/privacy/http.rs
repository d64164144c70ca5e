//! HTTP client for the external PII scanner

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{PiiScanner, ScanFinding};
use crate::TextProcessingError;

/// Configuration for the external scanner
#[derive(Debug, Clone)]
pub struct HttpScannerConfig {
    pub endpoint: String,
    pub timeout: std::time::Duration,
}

impl Default for HttpScannerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8091".to_string(),
            timeout: std::time::Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct InspectRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct InspectResponse {
    findings: Vec<ScanFinding>,
}

/// Scanner backed by an external inspection service
pub struct HttpScanner {
    config: HttpScannerConfig,
    client: reqwest::Client,
}

impl HttpScanner {
    pub fn new(config: HttpScannerConfig) -> Result<Self, TextProcessingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TextProcessingError::Scanner(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl PiiScanner for HttpScanner {
    async fn scan(&self, text: &str) -> Result<Vec<ScanFinding>, TextProcessingError> {
        let url = format!("{}/v1/inspect", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&InspectRequest { text })
            .send()
            .await
            .map_err(|e| TextProcessingError::Scanner(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TextProcessingError::Scanner(format!(
                "scanner returned HTTP {}",
                status
            )));
        }

        let parsed: InspectResponse = response
            .json()
            .await
            .map_err(|e| TextProcessingError::Scanner(e.to_string()))?;

        Ok(parsed.findings)
    }
}
