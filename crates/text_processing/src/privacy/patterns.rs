//! Regex catalog for fallback PII detection

use once_cell::sync::Lazy;
use regex::Regex;

use super::PiiType;

/// A compiled fallback pattern with its PII type
pub(crate) struct FallbackPattern {
    pub pii_type: PiiType,
    pub regex: Regex,
}

/// Compiled catalog, built once.
///
/// Pattern order matters only for overlap resolution, which is handled by
/// confidence afterwards.
pub(crate) static FALLBACK_PATTERNS: Lazy<Vec<FallbackPattern>> = Lazy::new(|| {
    let raw: Vec<(PiiType, &str)> = vec![
        (
            PiiType::EmailAddress,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ),
        (
            PiiType::PhoneNumber,
            r"\b(?:\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b",
        ),
        (PiiType::PhoneNumber, r"\(\d{3}\)\s?\d{3}-?\d{4}"),
        (PiiType::UsSocialSecurityNumber, r"\b\d{3}-\d{2}-\d{4}\b"),
        (
            PiiType::CreditCardNumber,
            r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
        ),
        // Capitalized first-plus-last name heuristic; low confidence by design of the caller
        (PiiType::PersonName, r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b"),
    ];

    raw.into_iter()
        .map(|(pii_type, pattern)| FallbackPattern {
            pii_type,
            regex: Regex::new(pattern).expect("invalid fallback PII pattern"),
        })
        .collect()
});

/// Base confidence for a regex hit of the given type
pub(crate) fn base_confidence(pii_type: PiiType) -> f64 {
    match pii_type {
        PiiType::EmailAddress => 0.9,
        PiiType::PhoneNumber => 0.7,
        PiiType::UsSocialSecurityNumber => 0.8,
        PiiType::CreditCardNumber => 0.9,
        PiiType::PersonName => 0.4,
        PiiType::StreetAddress => 0.5,
        _ => 0.5,
    }
}
