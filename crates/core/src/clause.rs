//! Clause records, categories, and risk types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of clause categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseCategory {
    Termination,
    Liability,
    Indemnity,
    Confidentiality,
    Payment,
    #[serde(rename = "IP Ownership")]
    IpOwnership,
    #[serde(rename = "Dispute Resolution")]
    DisputeResolution,
    #[serde(rename = "Governing Law")]
    GoverningLaw,
    Assignment,
    Modification,
    Warranties,
    #[serde(rename = "Force Majeure")]
    ForceMajeure,
    Definitions,
    Other,
}

impl ClauseCategory {
    /// All categories, in display order
    pub const ALL: [ClauseCategory; 14] = [
        ClauseCategory::Termination,
        ClauseCategory::Liability,
        ClauseCategory::Indemnity,
        ClauseCategory::Confidentiality,
        ClauseCategory::Payment,
        ClauseCategory::IpOwnership,
        ClauseCategory::DisputeResolution,
        ClauseCategory::GoverningLaw,
        ClauseCategory::Assignment,
        ClauseCategory::Modification,
        ClauseCategory::Warranties,
        ClauseCategory::ForceMajeure,
        ClauseCategory::Definitions,
        ClauseCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseCategory::Termination => "Termination",
            ClauseCategory::Liability => "Liability",
            ClauseCategory::Indemnity => "Indemnity",
            ClauseCategory::Confidentiality => "Confidentiality",
            ClauseCategory::Payment => "Payment",
            ClauseCategory::IpOwnership => "IP Ownership",
            ClauseCategory::DisputeResolution => "Dispute Resolution",
            ClauseCategory::GoverningLaw => "Governing Law",
            ClauseCategory::Assignment => "Assignment",
            ClauseCategory::Modification => "Modification",
            ClauseCategory::Warranties => "Warranties",
            ClauseCategory::ForceMajeure => "Force Majeure",
            ClauseCategory::Definitions => "Definitions",
            ClauseCategory::Other => "Other",
        }
    }

    /// Parse a category label, coercing anything unknown to `Other`
    pub fn parse_lenient(s: &str) -> Self {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "termination" => ClauseCategory::Termination,
            "liability" => ClauseCategory::Liability,
            "indemnity" | "indemnification" => ClauseCategory::Indemnity,
            "confidentiality" => ClauseCategory::Confidentiality,
            "payment" => ClauseCategory::Payment,
            "ip ownership" | "intellectual property" => ClauseCategory::IpOwnership,
            "dispute resolution" => ClauseCategory::DisputeResolution,
            "governing law" => ClauseCategory::GoverningLaw,
            "assignment" => ClauseCategory::Assignment,
            "modification" => ClauseCategory::Modification,
            "warranties" | "warranty" => ClauseCategory::Warranties,
            "force majeure" => ClauseCategory::ForceMajeure,
            "definitions" => ClauseCategory::Definitions,
            _ => ClauseCategory::Other,
        }
    }

    /// Category-specific risk multiplier applied during risk fusion
    pub fn risk_multiplier(&self) -> f64 {
        match self {
            ClauseCategory::Indemnity => 1.20,
            ClauseCategory::Liability => 1.15,
            ClauseCategory::Termination | ClauseCategory::Assignment => 1.10,
            ClauseCategory::DisputeResolution | ClauseCategory::IpOwnership => 1.05,
            ClauseCategory::GoverningLaw => 0.90,
            ClauseCategory::Modification => 0.95,
            ClauseCategory::Other => 0.90,
            _ => 1.0,
        }
    }
}

/// Risk level thresholds: low < 0.3 ≤ moderate < 0.6 ≤ attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    Attention,
}

impl RiskLevel {
    /// Map a risk score in [0, 1] to its level
    pub fn from_score(score: f64) -> Self {
        if score >= 0.6 {
            RiskLevel::Attention
        } else if score >= 0.3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// Numeric score an LLM label maps to during fusion
    pub fn llm_score(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.2,
            RiskLevel::Moderate => 0.5,
            RiskLevel::Attention => 0.8,
        }
    }

    /// Parse an LLM label, coercing anything unknown to `Moderate`
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "attention" | "high" | "critical" => RiskLevel::Attention,
            _ => RiskLevel::Moderate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Attention => "attention",
        }
    }
}

/// Readability comparison between a clause and its summary.
///
/// `delta = original_grade - summary_grade`; positive means the summary
/// reads at a lower grade level than the original.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityMetrics {
    pub original_grade: f64,
    pub summary_grade: f64,
    pub delta: f64,
    pub flesch_score: f64,
}

/// Outcome of risk fusion for a single clause
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub detected_keywords: Vec<String>,
    pub risk_factors: Vec<String>,
    pub needs_review: bool,
    pub explanation: String,
}

/// Persisted clause record, owned by exactly one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseRecord {
    pub clause_id: String,
    pub doc_id: String,
    /// 1-based, contiguous within the document
    pub order: usize,
    /// Already PII-redacted
    pub original_text: String,
    pub summary: String,
    pub category: ClauseCategory,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub needs_review: bool,
    pub readability_metrics: ReadabilityMetrics,
    pub negotiation_tip: Option<String>,
    pub confidence: f64,
    /// Which path produced the summary ("llm" or "fallback")
    pub processing_method: String,
    /// Dense vector of the configured dimension; absent until stage 10
    pub embedding: Option<Vec<f32>>,
    pub detected_keywords: Vec<String>,
    pub risk_factors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Opaque metadata bag
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ClauseRecord {
    /// Deterministic clause id within its parent document
    pub fn make_id(doc_id: &str, index: usize) -> String {
        format!("{}_clause_{}", doc_id, index)
    }

    /// Whether this clause carries a usable embedding
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.59), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::Attention);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Attention);
    }

    #[test]
    fn test_category_lenient_parse() {
        assert_eq!(
            ClauseCategory::parse_lenient("IP Ownership"),
            ClauseCategory::IpOwnership
        );
        assert_eq!(
            ClauseCategory::parse_lenient("dispute-resolution"),
            ClauseCategory::DisputeResolution
        );
        assert_eq!(
            ClauseCategory::parse_lenient("something else"),
            ClauseCategory::Other
        );
    }

    #[test]
    fn test_risk_level_lenient_parse() {
        assert_eq!(RiskLevel::parse_lenient("HIGH"), RiskLevel::Attention);
        assert_eq!(RiskLevel::parse_lenient("bogus"), RiskLevel::Moderate);
    }

    #[test]
    fn test_risk_multiplier_bounds() {
        for category in ClauseCategory::ALL {
            let m = category.risk_multiplier();
            assert!((0.8..=1.2).contains(&m), "{:?} multiplier {}", category, m);
        }
    }

    #[test]
    fn test_clause_id_is_deterministic() {
        assert_eq!(ClauseRecord::make_id("abc", 0), "abc_clause_0");
        assert_eq!(ClauseRecord::make_id("abc", 0), ClauseRecord::make_id("abc", 0));
    }
}
