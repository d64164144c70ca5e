//! Clause segmentation
//!
//! Partitions redacted document text into ordered clause candidates. When
//! layout blocks are available they drive segmentation; otherwise the text
//! is scanned line by line with heading heuristics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use clauselens_core::{BoundingBox, ClauseCategory, ExtractedDocument};

/// Heading patterns seen at the start of legal clauses
static HEADING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Numbered sections (1., 2.3., ...)
        r"(?i)^(\d+\.(?:\d+\.)*)\s+(.+?)$",
        // Roman numerals (I., II., IV.)
        r"^([IVX]+\.)\s+(.+?)$",
        // Letters ((a), (b) or A., B.)
        r"^(\([a-z]\)|[A-Z]\.)\s+(.+?)$",
        // ARTICLE/SECTION/CLAUSE keywords
        r"(?i)^((?:ARTICLE|SECTION|CLAUSE)\s+\d+(?:\.\d+)*)\s*[:\-]?\s*(.*?)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid heading pattern"))
    .collect()
});

/// Page-number artifacts stripped during cleanup
static PAGE_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Page \d+[^\n]*\n?").expect("invalid page artifact pattern"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace pattern"));

/// Legal vocabulary used by the candidate confidence heuristic
const LEGAL_KEYWORDS: &[&str] = &[
    "termination",
    "liability",
    "indemnity",
    "confidentiality",
    "payment",
    "intellectual property",
    "dispute resolution",
    "governing law",
    "assignment",
    "modification",
    "severability",
    "entire agreement",
    "force majeure",
    "warranties",
    "representations",
    "damages",
    "breach",
    "notice",
    "jurisdiction",
    "venue",
    "arbitration",
];

/// A potential clause identified in the document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseCandidate {
    pub text: String,
    pub start_position: usize,
    pub end_position: usize,
    pub heading: Option<String>,
    pub confidence: f64,
    pub page_number: Option<usize>,
    pub bounding_box: Option<BoundingBox>,
    /// 1-based, assigned after validation
    pub order: usize,
    pub category: ClauseCategory,
}

impl ClauseCandidate {
    fn new(text: String, start: usize, confidence: f64) -> Self {
        let end = start + text.len();
        Self {
            text,
            start_position: start,
            end_position: end,
            heading: None,
            confidence,
            page_number: None,
            bounding_box: None,
            order: 0,
            category: ClauseCategory::Other,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Segmenter tuning
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Layout blocks shorter than this are skipped
    pub min_block_chars: usize,
    /// Candidates with fewer words than this get merged forward
    pub min_clause_words: usize,
    /// Confidence at which an undersized candidate survives anyway
    pub keep_short_confidence: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_block_chars: 50,
            min_clause_words: 5,
            keep_short_confidence: 0.8,
        }
    }
}

/// Clause segmenter
pub struct ClauseSegmenter {
    config: SegmenterConfig,
}

impl ClauseSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Segment an extracted (already redacted) document into ordered candidates
    pub fn segment(&self, document: &ExtractedDocument) -> Vec<ClauseCandidate> {
        let raw = if document.has_layout() {
            self.segment_with_layout(document)
        } else {
            self.segment_with_text(&document.text)
        };

        let validated = self.validate_and_merge(raw);
        tracing::info!(
            method = document.method.as_str(),
            clauses = validated.len(),
            "Segmentation complete"
        );
        validated
    }

    /// One candidate per sufficiently large layout block, splitting on headings
    fn segment_with_layout(&self, document: &ExtractedDocument) -> Vec<ClauseCandidate> {
        let mut clauses: Vec<ClauseCandidate> = Vec::new();

        for page in &document.pages {
            for block in &page.blocks {
                let block_text = block.text.trim();
                if block_text.len() < self.config.min_block_chars {
                    continue;
                }

                let start = document.text.find(block_text).unwrap_or(0);

                if let Some(heading) = extract_heading(first_line(block_text)) {
                    let mut clause =
                        ClauseCandidate::new(block_text.to_string(), start, block.confidence);
                    clause.heading = Some(heading);
                    clause.page_number = Some(page.page_number);
                    clause.bounding_box = block.bounding_box;
                    clauses.push(clause);
                } else if let Some(prev) = clauses.last_mut() {
                    if should_merge_with_previous(block_text, prev) {
                        prev.text.push('\n');
                        prev.text.push_str(block_text);
                        prev.end_position = start + block_text.len();
                        continue;
                    } else {
                        let mut clause = ClauseCandidate::new(
                            block_text.to_string(),
                            start,
                            block.confidence.min(0.5),
                        );
                        clause.page_number = Some(page.page_number);
                        clause.bounding_box = block.bounding_box;
                        clauses.push(clause);
                    }
                } else {
                    let mut clause = ClauseCandidate::new(
                        block_text.to_string(),
                        start,
                        block.confidence.min(0.5),
                    );
                    clause.page_number = Some(page.page_number);
                    clause.bounding_box = block.bounding_box;
                    clauses.push(clause);
                }
            }
        }

        clauses
    }

    /// Line-by-line scan for documents without layout
    fn segment_with_text(&self, text: &str) -> Vec<ClauseCandidate> {
        let mut clauses = Vec::new();
        let mut current_lines: Vec<&str> = Vec::new();
        let mut current_heading: Option<String> = None;
        let mut current_start = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(heading) = extract_heading(line) {
                if !current_lines.is_empty() {
                    let clause_text = current_lines.join("\n");
                    let confidence = candidate_confidence(&clause_text);
                    let mut clause = ClauseCandidate::new(clause_text, current_start, confidence);
                    clause.heading = current_heading.take();
                    clauses.push(clause);
                }
                current_lines = vec![line];
                current_heading = Some(heading);
                current_start = text.find(line).unwrap_or(current_start);
            } else if current_lines.is_empty() {
                // Preamble before the first heading
                current_lines.push(line);
                current_start = text.find(line).unwrap_or(0);
            } else {
                current_lines.push(line);
            }
        }

        if !current_lines.is_empty() {
            let clause_text = current_lines.join("\n");
            let confidence = candidate_confidence(&clause_text);
            let mut clause = ClauseCandidate::new(clause_text, current_start, confidence);
            clause.heading = current_heading;
            clauses.push(clause);
        }

        clauses
    }

    /// Merge undersized low-confidence candidates forward, clean text, assign order
    fn validate_and_merge(&self, clauses: Vec<ClauseCandidate>) -> Vec<ClauseCandidate> {
        let mut clauses = clauses;
        let mut validated: Vec<ClauseCandidate> = Vec::with_capacity(clauses.len());

        let mut i = 0;
        while i < clauses.len() {
            let is_short = clauses[i].word_count() < self.config.min_clause_words
                && clauses[i].confidence < self.config.keep_short_confidence;

            if is_short && i + 1 < clauses.len() {
                let short = clauses[i].clone();
                let next = &mut clauses[i + 1];
                next.text = format!("{}\n{}", short.text, next.text);
                next.start_position = short.start_position;
                i += 1;
                continue;
            }
            if is_short {
                i += 1;
                continue;
            }

            let mut clause = clauses[i].clone();
            clause.text = clean_clause_text(&clause.text);
            clause.order = validated.len() + 1;
            validated.push(clause);
            i += 1;
        }

        validated
    }
}

impl Default for ClauseSegmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Extract a heading from a line if it matches a known pattern
fn extract_heading(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    for pattern in HEADING_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            return match (caps.get(1), caps.get(2)) {
                (Some(number), Some(title)) => Some(
                    format!("{} {}", number.as_str().trim(), title.as_str().trim())
                        .trim()
                        .to_string(),
                ),
                (Some(only), None) => Some(only.as_str().trim().to_string()),
                _ => None,
            };
        }
    }

    // All-caps lines without digits are treated as headings
    if line.len() > 5
        && line == line.to_uppercase()
        && line.chars().any(|c| c.is_alphabetic())
        && !line.chars().any(|c| c.is_ascii_digit())
    {
        return Some(line.to_string());
    }

    None
}

/// Whether a block continues the previous clause rather than starting a new one
fn should_merge_with_previous(current: &str, previous: &ClauseCandidate) -> bool {
    if extract_heading(first_line(current)).is_some() {
        return false;
    }
    if current.len() > 1000 {
        return false;
    }
    if previous.word_count() < 20 {
        return true;
    }
    current
        .split_whitespace()
        .next()
        .and_then(|w| w.chars().next())
        .is_some_and(|c| c.is_lowercase())
}

/// Confidence heuristic for candidates from the no-layout path
fn candidate_confidence(text: &str) -> f64 {
    let mut confidence = 0.5;

    let word_count = text.split_whitespace().count();
    if (20..=500).contains(&word_count) {
        confidence += 0.2;
    } else if word_count < 10 {
        confidence -= 0.3;
    }

    let lowered = text.to_lowercase();
    let keyword_hits = LEGAL_KEYWORDS
        .iter()
        .filter(|k| lowered.contains(*k))
        .count();
    if keyword_hits > 0 {
        confidence += (keyword_hits as f64 * 0.1).min(0.3);
    }

    let sentence_count = text.split('.').filter(|s| !s.trim().is_empty()).count();
    if sentence_count >= 2 {
        confidence += 0.1;
    }

    confidence.clamp(0.1, 1.0)
}

/// Whitespace-normalize and strip page artifacts
fn clean_clause_text(text: &str) -> String {
    let text = PAGE_ARTIFACT.replace_all(text, "");
    let text = text.replace('\u{c}', "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauselens_core::{ExtractionMethod, PageInfo, TextBlock};

    fn text_document(text: &str) -> ExtractedDocument {
        ExtractedDocument {
            text: text.to_string(),
            pages: vec![PageInfo {
                page_number: 1,
                blocks: Vec::new(),
                paragraphs: Vec::new(),
                text: text.to_string(),
            }],
            page_count: 1,
            method: ExtractionMethod::Structural,
        }
    }

    const SAMPLE: &str = "1. TERMINATION\n\
Either party may terminate this Agreement with thirty days written notice to the other party for any reason whatsoever.\n\
2. LIABILITY\n\
Company shall not be liable for any indirect or consequential damages arising out of this Agreement under any circumstances.\n\
3. PAYMENT\n\
Payment is due within thirty days of invoice receipt and late payments incur interest at the maximum lawful rate.";

    #[test]
    fn test_orders_are_contiguous() {
        let segmenter = ClauseSegmenter::default();
        let clauses = segmenter.segment(&text_document(SAMPLE));

        assert!(!clauses.is_empty());
        for (i, clause) in clauses.iter().enumerate() {
            assert_eq!(clause.order, i + 1);
        }
    }

    #[test]
    fn test_headings_detected() {
        let segmenter = ClauseSegmenter::default();
        let clauses = segmenter.segment(&text_document(SAMPLE));

        assert_eq!(clauses.len(), 3);
        assert!(clauses[0].heading.as_deref().unwrap().contains("TERMINATION"));
        assert!(clauses[1].heading.as_deref().unwrap().contains("LIABILITY"));
    }

    #[test]
    fn test_extract_heading_variants() {
        assert!(extract_heading("1. Termination").is_some());
        assert!(extract_heading("1.2. Payment Terms").is_some());
        assert!(extract_heading("IV. Warranties").is_some());
        assert!(extract_heading("SECTION 3: Assignment").is_some());
        assert!(extract_heading("CONFIDENTIALITY").is_some());
        assert!(extract_heading("the parties agree as follows").is_none());
    }

    #[test]
    fn test_short_candidates_merge_forward() {
        let segmenter = ClauseSegmenter::default();
        let text = "1. NOTICES\nSee below.\n2. TERMINATION\nEither party may terminate this Agreement upon material breach by the other party with prior written notice delivered in accordance with this section.";
        let clauses = segmenter.segment(&text_document(text));

        // The two-word first clause is folded into the next candidate
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].text.contains("See below."));
        assert_eq!(clauses[0].order, 1);
    }

    #[test]
    fn test_layout_path_uses_blocks() {
        let block_a = "1. TERMINATION\nEither party may terminate this Agreement with thirty days written notice for convenience.";
        let block_b = "continued obligations survive termination of this Agreement and remain enforceable thereafter as provided.";
        let document = ExtractedDocument {
            text: format!("{}\n{}", block_a, block_b),
            pages: vec![PageInfo {
                page_number: 1,
                blocks: vec![
                    TextBlock {
                        text: block_a.to_string(),
                        confidence: 0.9,
                        bounding_box: None,
                    },
                    TextBlock {
                        text: block_b.to_string(),
                        confidence: 0.9,
                        bounding_box: None,
                    },
                ],
                paragraphs: Vec::new(),
                text: String::new(),
            }],
            page_count: 1,
            method: ExtractionMethod::LayoutAware,
        };

        let segmenter = ClauseSegmenter::default();
        let clauses = segmenter.segment(&document);

        // Lowercase continuation block merges into the heading block
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].text.contains("survive termination"));
        assert_eq!(clauses[0].page_number, Some(1));
    }

    #[test]
    fn test_clean_strips_artifacts() {
        let cleaned = clean_clause_text("Payment terms\u{c} apply.\nPage 3 of 9\nNet thirty.");
        assert!(!cleaned.contains('\u{c}'));
        assert!(!cleaned.contains("Page 3"));
        assert!(cleaned.contains("Net thirty."));
    }
}
