//! HTTP client for the layout-aware extraction service

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use clauselens_core::{BoundingBox, ExtractedDocument, ExtractionMethod, PageInfo, TextBlock};

use crate::PipelineError;

/// Pluggable layout-aware extractor
#[async_trait]
pub trait LayoutExtractor: Send + Sync {
    async fn extract(
        &self,
        content: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedDocument, PipelineError>;
}

/// Configuration for the HTTP layout extractor
#[derive(Debug, Clone)]
pub struct HttpLayoutExtractorConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for HttpLayoutExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8094".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct ProcessRequest<'a> {
    /// Base64-encoded document bytes
    content: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    text: String,
    #[serde(default)]
    pages: Vec<ResponsePage>,
}

#[derive(Deserialize)]
struct ResponsePage {
    page_number: usize,
    #[serde(default)]
    blocks: Vec<ResponseBlock>,
    #[serde(default)]
    paragraphs: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    text: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    bounding_box: Option<BoundingBox>,
}

/// Layout-aware extractor over HTTP
pub struct HttpLayoutExtractor {
    config: HttpLayoutExtractorConfig,
    client: reqwest::Client,
}

impl HttpLayoutExtractor {
    pub fn new(config: HttpLayoutExtractorConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LayoutExtractor for HttpLayoutExtractor {
    async fn extract(
        &self,
        content: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedDocument, PipelineError> {
        let url = format!("{}/v1/documents:process", self.config.endpoint);
        let body = ProcessRequest {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            mime_type,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Extraction(format!(
                "layout extractor returned HTTP {}",
                status
            )));
        }

        let parsed: ProcessResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Extraction(e.to_string()))?;

        if parsed.text.trim().is_empty() {
            return Err(PipelineError::Extraction(
                "layout extractor returned empty text".to_string(),
            ));
        }

        let pages: Vec<PageInfo> = parsed
            .pages
            .into_iter()
            .map(|page| PageInfo {
                page_number: page.page_number,
                blocks: page.blocks.into_iter().map(into_block).collect(),
                paragraphs: page.paragraphs.into_iter().map(into_block).collect(),
                text: String::new(),
            })
            .collect();

        let page_count = pages.len().max(1);
        Ok(ExtractedDocument {
            text: parsed.text,
            pages,
            page_count,
            method: ExtractionMethod::LayoutAware,
        })
    }
}

fn into_block(block: ResponseBlock) -> TextBlock {
    TextBlock {
        text: block.text,
        confidence: if block.confidence > 0.0 {
            block.confidence
        } else {
            0.8
        },
        bounding_box: block.bounding_box,
    }
}
