//! Structural PDF fallback
//!
//! Parses the PDF object tree and extracts text per page. No layout blocks;
//! downstream segmentation uses text heuristics.

use lopdf::Document;

use clauselens_core::{ExtractedDocument, ExtractionMethod, PageInfo};

use crate::PipelineError;

/// Extract text from PDF bytes with a structural parser
pub fn extract_pdf(content: &[u8], max_pages: usize) -> Result<ExtractedDocument, PipelineError> {
    let document =
        Document::load_mem(content).map_err(|e| PipelineError::Extraction(e.to_string()))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    if page_numbers.len() > max_pages {
        return Err(PipelineError::InputTooLarge(format!(
            "PDF has {} pages, exceeds limit of {}",
            page_numbers.len(),
            max_pages
        )));
    }
    if page_numbers.is_empty() {
        return Err(PipelineError::Extraction("PDF has no pages".to_string()));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    let mut full_text = String::new();

    for page_number in &page_numbers {
        let page_text = document
            .extract_text(&[*page_number])
            .unwrap_or_default();
        if !full_text.is_empty() {
            full_text.push('\n');
        }
        full_text.push_str(&page_text);
        pages.push(PageInfo {
            page_number: *page_number as usize,
            blocks: Vec::new(),
            paragraphs: Vec::new(),
            text: page_text,
        });
    }

    if full_text.trim().is_empty() {
        return Err(PipelineError::Extraction(
            "structural parser recovered no text".to_string(),
        ));
    }

    let page_count = pages.len();
    Ok(ExtractedDocument {
        text: full_text,
        pages,
        page_count,
        method: ExtractionMethod::Structural,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_fail() {
        let result = extract_pdf(b"this is not a pdf", 10);
        assert!(result.is_err());
    }
}
