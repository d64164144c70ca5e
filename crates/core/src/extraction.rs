//! Text extraction output types

use serde::{Deserialize, Serialize};

/// Which extractor produced the text.
///
/// Downstream components only trust layout blocks when the method is
/// `LayoutAware`; the weaker methods carry text without reliable structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    LayoutAware,
    Structural,
    RawText,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::LayoutAware => "layout-aware",
            ExtractionMethod::Structural => "structural",
            ExtractionMethod::RawText => "raw-text",
        }
    }
}

/// Axis-aligned bounding box in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// A laid-out region of text on a page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub confidence: f64,
    pub bounding_box: Option<BoundingBox>,
}

/// One page of extracted text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number
    pub page_number: usize,
    /// Larger text regions, present only for layout-aware extraction
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
    /// Finer-grained paragraphs, present only for layout-aware extraction
    #[serde(default)]
    pub paragraphs: Vec<TextBlock>,
    /// Full page text for the weaker extractors
    #[serde(default)]
    pub text: String,
}

/// Result of running the extraction fallback chain over document bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: Vec<PageInfo>,
    pub page_count: usize,
    pub method: ExtractionMethod,
}

impl ExtractedDocument {
    /// Whether layout blocks are trustworthy for segmentation
    pub fn has_layout(&self) -> bool {
        self.method == ExtractionMethod::LayoutAware
    }
}
