//! Risk keyword catalog

use once_cell::sync::Lazy;
use regex::Regex;

/// A risk-associated keyword pattern with its weight and mitigating contexts
pub struct RiskKeyword {
    /// Alternation of surface forms, compiled with word boundaries
    pub label: &'static str,
    pub regex: Regex,
    /// Contribution in [0, 1]
    pub weight: f64,
    /// Contexts that halve this keyword's contribution when present
    pub negative_contexts: &'static [&'static str],
}

fn keyword(label: &'static str, pattern: &str, weight: f64, negative: &'static [&'static str]) -> RiskKeyword {
    RiskKeyword {
        label,
        regex: Regex::new(&format!(r"(?i)\b(?:{})\b", pattern)).expect("invalid risk keyword"),
        weight,
        negative_contexts: negative,
    }
}

/// Compiled catalog, built once
pub static RISK_KEYWORDS: Lazy<Vec<RiskKeyword>> = Lazy::new(|| {
    vec![
        // Indemnification
        keyword(
            "indemnify",
            r"indemnify|indemnification|indemnities",
            0.8,
            &["mutual indemnification", "limited indemnification"],
        ),
        keyword("hold harmless", r"hold\s+harmless", 0.9, &[]),
        keyword(
            "defend",
            r"defend",
            0.7,
            &["right to defend", "option to defend"],
        ),
        // Unlimited liability
        keyword("unlimited", r"unlimited", 0.95, &[]),
        keyword("without limit", r"without\s+limit|no\s+limit", 0.9, &[]),
        keyword(
            "consequential damages",
            r"consequential\s+damages",
            0.8,
            &["excluding consequential", "no consequential"],
        ),
        keyword(
            "punitive damages",
            r"punitive\s+damages",
            0.85,
            &["excluding punitive", "no punitive"],
        ),
        // Automatic renewal
        keyword(
            "automatic renewal",
            r"automatic\s+renewal|auto.?renewal|automatically\s+renew",
            0.7,
            &[],
        ),
        keyword("perpetual", r"perpetual|in\s+perpetuity", 0.9, &[]),
        keyword(
            "successive periods",
            r"rolling\s+basis|successive\s+periods",
            0.6,
            &[],
        ),
        // Termination
        keyword(
            "terminate without cause",
            r"terminate\s+without\s+cause|terminate\s+for\s+convenience",
            0.8,
            &[],
        ),
        keyword(
            "immediate termination",
            r"immediate\s+termination|terminate\s+immediately",
            0.7,
            &[],
        ),
        keyword("sole discretion", r"sole\s+discretion", 0.75, &[]),
        // Payment
        keyword("liquidated damages", r"liquidated\s+damages", 0.8, &[]),
        keyword("penalty", r"penalty|penalties", 0.75, &[]),
        keyword(
            "late fees",
            r"late\s+fees|interest\s+on\s+overdue",
            0.5,
            &[],
        ),
        // Jurisdiction and dispute
        keyword("exclusive jurisdiction", r"exclusive\s+jurisdiction", 0.7, &[]),
        keyword("waiver", r"waive|waiver", 0.8, &[]),
        keyword(
            "jury trial waiver",
            r"jury\s+trial\s+waiver|waive\s+jury\s+trial",
            0.85,
            &[],
        ),
        // Assignment
        keyword(
            "assignment without consent",
            r"assignment\s+without\s+consent|assign\s+without\s+consent",
            0.7,
            &[],
        ),
        keyword("freely assign", r"freely\s+assign|assign\s+freely", 0.6, &[]),
        // IP and confidentiality
        keyword(
            "work for hire",
            r"work\s+for\s+hire|work\s+made\s+for\s+hire",
            0.8,
            &[],
        ),
        keyword(
            "exclusive rights",
            r"all\s+rights|exclusive\s+rights",
            0.7,
            &[],
        ),
        keyword(
            "perpetual confidentiality",
            r"perpetual\s+confidentiality|indefinite\s+confidentiality",
            0.6,
            &[],
        ),
        // Modification
        keyword("unilateral", r"unilateral|unilaterally", 0.75, &[]),
        keyword(
            "without notice",
            r"at\s+any\s+time|without\s+notice",
            0.65,
            &[],
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_weights_in_range() {
        for kw in RISK_KEYWORDS.iter() {
            assert!((0.0..=1.0).contains(&kw.weight), "{} weight", kw.label);
        }
    }

    #[test]
    fn test_hold_harmless_matches() {
        let kw = RISK_KEYWORDS
            .iter()
            .find(|k| k.label == "hold harmless")
            .unwrap();
        assert!(kw.regex.is_match("shall hold harmless the Customer"));
        assert!(kw.regex.is_match("Hold  Harmless"));
    }

    #[test]
    fn test_word_boundaries_respected() {
        let kw = RISK_KEYWORDS.iter().find(|k| k.label == "penalty").unwrap();
        assert!(!kw.regex.is_match("penaltyless"));
    }
}
