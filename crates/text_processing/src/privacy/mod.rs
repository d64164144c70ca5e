//! PII detection and masking
//!
//! Prefers an external PII scanner; falls back to a fixed regex catalog when
//! the scanner is disabled or fails. Raw PII never leaves this module except
//! through the explicit `unmask` path.

mod http;
mod patterns;

pub use http::{HttpScanner, HttpScannerConfig};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use clauselens_core::PiiSummary;

use crate::TextProcessingError;
use patterns::{base_confidence, FALLBACK_PATTERNS};

/// Types of PII that can be detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiiType {
    #[serde(rename = "EMAIL_ADDRESS")]
    EmailAddress,
    #[serde(rename = "PHONE_NUMBER")]
    PhoneNumber,
    #[serde(rename = "PERSON_NAME")]
    PersonName,
    #[serde(rename = "CREDIT_CARD_NUMBER")]
    CreditCardNumber,
    #[serde(rename = "US_SOCIAL_SECURITY_NUMBER")]
    UsSocialSecurityNumber,
    #[serde(rename = "STREET_ADDRESS")]
    StreetAddress,
    #[serde(rename = "DATE_OF_BIRTH")]
    DateOfBirth,
    #[serde(rename = "ORGANIZATION_NAME")]
    OrganizationName,
}

impl PiiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::EmailAddress => "EMAIL_ADDRESS",
            PiiType::PhoneNumber => "PHONE_NUMBER",
            PiiType::PersonName => "PERSON_NAME",
            PiiType::CreditCardNumber => "CREDIT_CARD_NUMBER",
            PiiType::UsSocialSecurityNumber => "US_SOCIAL_SECURITY_NUMBER",
            PiiType::StreetAddress => "STREET_ADDRESS",
            PiiType::DateOfBirth => "DATE_OF_BIRTH",
            PiiType::OrganizationName => "ORGANIZATION_NAME",
        }
    }
}

/// A detected PII span before token assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFinding {
    pub pii_type: PiiType,
    pub text: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub confidence: f64,
}

/// A detected PII span with its assigned replacement token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiMatch {
    pub pii_type: PiiType,
    pub original_text: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub confidence: f64,
    pub replacement_token: String,
}

/// Result of redacting one document
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    pub masked_text: String,
    pub matches: Vec<PiiMatch>,
    pub summary: PiiSummary,
}

/// Pluggable PII scanner
#[async_trait]
pub trait PiiScanner: Send + Sync {
    async fn scan(&self, text: &str) -> Result<Vec<ScanFinding>, TextProcessingError>;
}

/// Regex-catalog scanner used as the fallback path
#[derive(Default)]
pub struct RegexScanner;

#[async_trait]
impl PiiScanner for RegexScanner {
    async fn scan(&self, text: &str) -> Result<Vec<ScanFinding>, TextProcessingError> {
        let mut findings = Vec::new();

        for pattern in FALLBACK_PATTERNS.iter() {
            for m in pattern.regex.find_iter(text) {
                // Short capitalized pairs are usually headings, not names
                if pattern.pii_type == PiiType::PersonName && m.as_str().len() < 5 {
                    continue;
                }
                findings.push(ScanFinding {
                    pii_type: pattern.pii_type,
                    text: m.as_str().to_string(),
                    start_byte: m.start(),
                    end_byte: m.end(),
                    confidence: estimate_confidence(pattern.pii_type, m.as_str()),
                });
            }
        }

        Ok(findings)
    }
}

/// Confidence for a regex hit, adjusted by match characteristics
fn estimate_confidence(pii_type: PiiType, matched: &str) -> f64 {
    let mut confidence = base_confidence(pii_type);

    if pii_type == PiiType::PersonName {
        if matched.len() > 10 {
            confidence += 0.2;
        }
        let lowered = matched.to_lowercase();
        if matches!(
            lowered.as_str(),
            "john doe" | "jane doe" | "test user" | "sample name"
        ) {
            confidence = 0.1;
        }
    }

    confidence.min(0.95)
}

/// PII redactor combining the external scanner with the regex fallback
pub struct PiiRedactor {
    scanner: Option<Arc<dyn PiiScanner>>,
    fallback: RegexScanner,
}

impl PiiRedactor {
    /// Redactor using the regex catalog only
    pub fn new() -> Self {
        Self {
            scanner: None,
            fallback: RegexScanner,
        }
    }

    /// Redactor preferring an external scanner
    pub fn with_scanner(scanner: Arc<dyn PiiScanner>) -> Self {
        Self {
            scanner: Some(scanner),
            fallback: RegexScanner,
        }
    }

    /// Detect and mask PII in `text`.
    ///
    /// Replacement tokens are unique per match within the call, numbered in
    /// document order, so the same input always produces the same output.
    pub async fn redact(&self, text: &str) -> Result<RedactionOutcome, TextProcessingError> {
        if text.trim().is_empty() {
            return Ok(RedactionOutcome {
                masked_text: text.to_string(),
                matches: Vec::new(),
                summary: PiiSummary::default(),
            });
        }

        let findings = match &self.scanner {
            Some(scanner) => match scanner.scan(text).await {
                Ok(findings) => {
                    tracing::debug!(count = findings.len(), "External scanner findings");
                    findings
                },
                Err(e) => {
                    tracing::warn!(error = %e, "PII scanner failed, using regex fallback");
                    self.fallback.scan(text).await?
                },
            },
            None => self.fallback.scan(text).await?,
        };

        let resolved = resolve_overlaps(findings);
        let matches = assign_tokens(resolved);
        let masked_text = apply_masking(text, &matches);
        let summary = summarize(&matches);

        tracing::info!(
            detected = matches.len(),
            masked = summary.masking_applied,
            "PII redaction complete"
        );

        Ok(RedactionOutcome {
            masked_text,
            matches,
            summary,
        })
    }

    /// Restore original PII given the full match table. Authorized use only.
    pub fn unmask(&self, masked_text: &str, matches: &[PiiMatch]) -> String {
        tracing::warn!("Text unmasking requested");
        let mut text = masked_text.to_string();
        for m in matches {
            text = text.replace(&m.replacement_token, &m.original_text);
        }
        text
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the most confident finding wherever spans overlap
fn resolve_overlaps(mut findings: Vec<ScanFinding>) -> Vec<ScanFinding> {
    findings.sort_by_key(|f| f.start_byte);

    let mut kept: Vec<ScanFinding> = Vec::with_capacity(findings.len());
    for finding in findings {
        let overlap = kept
            .iter()
            .position(|k| finding.start_byte < k.end_byte && finding.end_byte > k.start_byte);

        match overlap {
            Some(i) => {
                if finding.confidence > kept[i].confidence {
                    kept[i] = finding;
                }
            },
            None => kept.push(finding),
        }
    }

    kept.sort_by_key(|f| f.start_byte);
    kept
}

/// Number tokens in document order: `[EMAIL_ADDRESS_1]`, `[PHONE_NUMBER_2]`, ...
fn assign_tokens(findings: Vec<ScanFinding>) -> Vec<PiiMatch> {
    findings
        .into_iter()
        .enumerate()
        .map(|(i, f)| PiiMatch {
            replacement_token: format!("[{}_{}]", f.pii_type.as_str(), i + 1),
            pii_type: f.pii_type,
            original_text: f.text,
            start_byte: f.start_byte,
            end_byte: f.end_byte,
            confidence: f.confidence,
        })
        .collect()
}

/// Substitute tokens for spans, rightmost first so earlier offsets stay valid
fn apply_masking(text: &str, matches: &[PiiMatch]) -> String {
    let mut masked = text.to_string();
    let mut ordered: Vec<&PiiMatch> = matches.iter().collect();
    ordered.sort_by(|a, b| b.start_byte.cmp(&a.start_byte));

    for m in ordered {
        masked.replace_range(m.start_byte..m.end_byte, &m.replacement_token);
    }

    masked
}

fn summarize(matches: &[PiiMatch]) -> PiiSummary {
    if matches.is_empty() {
        return PiiSummary::default();
    }

    let mut summary = PiiSummary {
        total_pii_detected: matches.len(),
        masking_applied: true,
        ..Default::default()
    };

    let mut confidence_sum = 0.0;
    for m in matches {
        *summary
            .pii_types
            .entry(m.pii_type.as_str().to_string())
            .or_insert(0) += 1;
        if m.confidence > 0.7 {
            summary.high_confidence_count += 1;
        }
        confidence_sum += m.confidence;
    }
    summary.avg_confidence = (confidence_sum / matches.len() as f64) as f32;

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_email_masked_and_absent() {
        let redactor = PiiRedactor::new();
        let outcome = redactor
            .redact("Contact john.doe@example.com for details.")
            .await
            .unwrap();

        assert!(!outcome.masked_text.contains("john.doe@example.com"));
        assert!(outcome.masked_text.contains("[EMAIL_ADDRESS_"));
        assert!(outcome.summary.pii_types.get("EMAIL_ADDRESS").copied().unwrap_or(0) >= 1);
    }

    #[tokio::test]
    async fn test_no_raw_pii_survives_masking() {
        let redactor = PiiRedactor::new();
        let text = "Email a@b.com, phone (555) 123-4567, ssn 123-45-6789.";
        let outcome = redactor.redact(text).await.unwrap();

        for m in &outcome.matches {
            assert!(
                !outcome.masked_text.contains(&m.original_text),
                "raw PII {:?} leaked into masked text",
                m.original_text
            );
        }
    }

    #[tokio::test]
    async fn test_unmask_round_trip() {
        let redactor = PiiRedactor::new();
        let text = "Send invoices to billing@acme.test and call 555-123-4567.";
        let outcome = redactor.redact(text).await.unwrap();

        let restored = redactor.unmask(&outcome.masked_text, &outcome.matches);
        assert_eq!(restored, text);
    }

    #[tokio::test]
    async fn test_tokens_unique_and_deterministic() {
        let redactor = PiiRedactor::new();
        let text = "a@b.com then c@d.com";
        let first = redactor.redact(text).await.unwrap();
        let second = redactor.redact(text).await.unwrap();

        let tokens: Vec<_> = first.matches.iter().map(|m| &m.replacement_token).collect();
        assert_eq!(tokens.len(), 2);
        assert_ne!(tokens[0], tokens[1]);
        assert_eq!(first.masked_text, second.masked_text);
    }

    #[tokio::test]
    async fn test_empty_text_is_noop() {
        let redactor = PiiRedactor::new();
        let outcome = redactor.redact("   ").await.unwrap();
        assert!(outcome.matches.is_empty());
        assert!(!outcome.summary.masking_applied);
    }

    #[test]
    fn test_overlap_resolution_keeps_most_confident() {
        let findings = vec![
            ScanFinding {
                pii_type: PiiType::PersonName,
                text: "John Doe".into(),
                start_byte: 0,
                end_byte: 8,
                confidence: 0.4,
            },
            ScanFinding {
                pii_type: PiiType::EmailAddress,
                text: "John Doe@x.com".into(),
                start_byte: 0,
                end_byte: 14,
                confidence: 0.9,
            },
        ];
        let kept = resolve_overlaps(findings);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pii_type, PiiType::EmailAddress);
    }
}
