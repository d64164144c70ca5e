//! Text extraction
//!
//! Converts opaque document bytes into page-structured text. Tries the
//! layout-aware service first, then the structural PDF parser, then a raw
//! byte scan. The `method` tag on the result records which path succeeded;
//! only layout-aware output carries trustworthy blocks.

mod layout;
mod raw;
mod structural;

use std::sync::Arc;

use clauselens_core::ExtractedDocument;

pub use layout::{HttpLayoutExtractor, HttpLayoutExtractorConfig, LayoutExtractor};

use crate::PipelineError;

/// Supported upload mime types
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Extractor limits
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_file_size_bytes: usize,
    pub max_pages: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            max_pages: 10,
        }
    }
}

/// Document extractor with the progressive fallback chain
pub struct DocumentExtractor {
    config: ExtractorConfig,
    layout: Option<Arc<dyn LayoutExtractor>>,
}

impl DocumentExtractor {
    /// Extractor without the layout service; PDF fallbacks only
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            layout: None,
        }
    }

    pub fn with_layout_extractor(mut self, layout: Arc<dyn LayoutExtractor>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Extract text and structure from document bytes.
    ///
    /// Fails with `InputTooLarge` when size or page limits are exceeded and
    /// `UnsupportedFormat` for mime types no extractor handles.
    pub async fn extract(
        &self,
        content: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<ExtractedDocument, PipelineError> {
        if content.len() > self.config.max_file_size_bytes {
            return Err(PipelineError::InputTooLarge(format!(
                "file size {} exceeds limit {}",
                content.len(),
                self.config.max_file_size_bytes
            )));
        }

        if mime_type != MIME_PDF && mime_type != MIME_DOCX {
            return Err(PipelineError::UnsupportedFormat(format!(
                "mime type {} (only PDF and DOCX are supported)",
                mime_type
            )));
        }

        // High-fidelity path first
        if let Some(layout) = &self.layout {
            match layout.extract(content, mime_type).await {
                Ok(document) => {
                    self.check_page_limit(document.page_count)?;
                    tracing::info!(
                        filename,
                        pages = document.page_count,
                        method = document.method.as_str(),
                        "Extraction complete"
                    );
                    return Ok(document);
                },
                Err(e) => {
                    tracing::warn!(filename, error = %e, "Layout extractor failed, falling back");
                },
            }
        }

        // DOCX has no local fallback
        if mime_type == MIME_DOCX {
            return Err(PipelineError::Extraction(format!(
                "no fallback extractor available for {}",
                mime_type
            )));
        }

        let document = match structural::extract_pdf(content, self.config.max_pages) {
            Ok(document) => document,
            Err(PipelineError::InputTooLarge(msg)) => {
                return Err(PipelineError::InputTooLarge(msg))
            },
            Err(e) => {
                tracing::warn!(filename, error = %e, "Structural parser failed, using raw text");
                raw::extract_raw(content, self.config.max_pages)?
            },
        };

        self.check_page_limit(document.page_count)?;
        tracing::info!(
            filename,
            pages = document.page_count,
            method = document.method.as_str(),
            "Extraction complete"
        );
        Ok(document)
    }

    fn check_page_limit(&self, page_count: usize) -> Result<(), PipelineError> {
        if page_count > self.config.max_pages {
            return Err(PipelineError::InputTooLarge(format!(
                "document has {} pages, exceeds limit of {}",
                page_count, self.config.max_pages
            )));
        }
        Ok(())
    }
}
