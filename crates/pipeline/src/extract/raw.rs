//! Raw text fallback
//!
//! Last resort: scan the bytes for printable runs. Structure is lost; page
//! count is estimated from text length.

use clauselens_core::{ExtractedDocument, ExtractionMethod, PageInfo};

use crate::PipelineError;

/// Minimum printable run worth keeping
const MIN_RUN_CHARS: usize = 4;
/// Rough characters-per-page estimate
const CHARS_PER_PAGE: usize = 3000;

/// Recover best-effort text from arbitrary bytes
pub fn extract_raw(content: &[u8], max_pages: usize) -> Result<ExtractedDocument, PipelineError> {
    let decoded = String::from_utf8_lossy(content);

    let mut text = String::new();
    let mut run = String::new();
    for c in decoded.chars() {
        if c.is_ascii_graphic() || c == ' ' || c == '\n' {
            run.push(c);
        } else {
            if run.trim().len() >= MIN_RUN_CHARS {
                text.push_str(run.trim());
                text.push('\n');
            }
            run.clear();
        }
    }
    if run.trim().len() >= MIN_RUN_CHARS {
        text.push_str(run.trim());
        text.push('\n');
    }

    if text.trim().is_empty() {
        return Err(PipelineError::Extraction(
            "no printable text recovered".to_string(),
        ));
    }

    let estimated_pages = (text.len() / CHARS_PER_PAGE).max(1);
    if estimated_pages > max_pages {
        return Err(PipelineError::InputTooLarge(format!(
            "estimated {} pages, exceeds limit of {}",
            estimated_pages, max_pages
        )));
    }

    Ok(ExtractedDocument {
        pages: vec![PageInfo {
            page_number: 1,
            blocks: Vec::new(),
            paragraphs: Vec::new(),
            text: text.clone(),
        }],
        page_count: estimated_pages,
        text,
        method: ExtractionMethod::RawText,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_printable_runs() {
        let bytes = b"\x00\x01TERMINATION CLAUSE text here\x02\xffmore legal text";
        let result = extract_raw(bytes, 10).unwrap();
        assert!(result.text.contains("TERMINATION CLAUSE text here"));
        assert!(result.text.contains("more legal text"));
        assert_eq!(result.method, ExtractionMethod::RawText);
    }

    #[test]
    fn test_binary_only_fails() {
        let bytes = [0u8, 1, 2, 3, 255, 254];
        assert!(extract_raw(&bytes, 10).is_err());
    }
}
