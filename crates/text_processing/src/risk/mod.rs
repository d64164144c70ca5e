//! Risk fusion
//!
//! Combines keyword-weighted evidence with the LLM's risk label and a
//! category multiplier into a bounded risk score, level, and review flag.

mod keywords;

use std::collections::HashSet;

use clauselens_config::constants::risk::{
    KEYWORD_HEAVY_WEIGHT, KEYWORD_LIGHT_WEIGHT, REVIEW_DISAGREEMENT, REVIEW_KEYWORD_COUNT,
    REVIEW_SCORE_THRESHOLD,
};
use clauselens_core::{ClauseCategory, RiskAssessment, RiskLevel};

use keywords::RISK_KEYWORDS;

/// Outcome of the keyword phase
#[derive(Debug, Clone)]
struct KeywordAssessment {
    score: f64,
    detected_keywords: Vec<String>,
    risk_factors: Vec<String>,
    distinct_count: usize,
}

/// Risk fuser
#[derive(Debug, Default, Clone, Copy)]
pub struct RiskFuser;

impl RiskFuser {
    pub fn new() -> Self {
        Self
    }

    /// Fuse keyword evidence, the LLM label, and the category multiplier
    pub fn fuse(
        &self,
        clause_text: &str,
        summary: Option<&str>,
        llm_label: Option<RiskLevel>,
        category: ClauseCategory,
    ) -> RiskAssessment {
        let keyword = analyze_keywords(clause_text, summary);

        let llm_score = llm_label.map(|l| l.llm_score());
        let mut score = match llm_score {
            Some(llm) => {
                if keyword.distinct_count > 0 {
                    keyword.score * KEYWORD_HEAVY_WEIGHT + llm * (1.0 - KEYWORD_HEAVY_WEIGHT)
                } else {
                    keyword.score * KEYWORD_LIGHT_WEIGHT + llm * (1.0 - KEYWORD_LIGHT_WEIGHT)
                }
            },
            None => keyword.score,
        };

        score = (score * category.risk_multiplier()).clamp(0.0, 1.0);
        let risk_level = RiskLevel::from_score(score);

        let disagreement = llm_score
            .map(|llm| (keyword.score - llm).abs())
            .unwrap_or(0.0);
        let needs_review = score >= REVIEW_SCORE_THRESHOLD
            || keyword.distinct_count >= REVIEW_KEYWORD_COUNT
            || disagreement > REVIEW_DISAGREEMENT;

        let confidence = assessment_confidence(&keyword, llm_score);
        let explanation = build_explanation(risk_level, &keyword, needs_review);

        if disagreement > REVIEW_DISAGREEMENT {
            tracing::info!(
                keyword_score = keyword.score,
                llm_score = llm_score.unwrap_or_default(),
                "Risk assessment disagreement flagged for review"
            );
        }

        RiskAssessment {
            risk_level,
            risk_score: score,
            confidence,
            detected_keywords: keyword.detected_keywords,
            risk_factors: keyword.risk_factors,
            needs_review,
            explanation,
        }
    }

    /// Document-level risk profile aggregated from clause assessments
    pub fn document_profile(&self, assessments: &[RiskAssessment]) -> serde_json::Value {
        if assessments.is_empty() {
            return serde_json::json!({
                "overall_risk_level": "low",
                "total_clauses": 0,
                "risk_distribution": {"low": 0, "moderate": 0, "attention": 0},
                "needs_review_count": 0,
                "top_risks": [],
                "average_risk_score": 0.0,
            });
        }

        let mut distribution = [0usize; 3];
        let mut needs_review_count = 0usize;
        let mut total_score = 0.0;
        let mut top_risks: Vec<serde_json::Value> = Vec::new();

        for assessment in assessments {
            let slot = match assessment.risk_level {
                RiskLevel::Low => 0,
                RiskLevel::Moderate => 1,
                RiskLevel::Attention => 2,
            };
            distribution[slot] += 1;
            total_score += assessment.risk_score;
            if assessment.needs_review {
                needs_review_count += 1;
            }
            if assessment.risk_level == RiskLevel::Attention {
                top_risks.push(serde_json::json!({
                    "risk_factors": assessment.risk_factors.iter().take(2).collect::<Vec<_>>(),
                    "risk_score": assessment.risk_score,
                    "keywords": assessment.detected_keywords.iter().take(3).collect::<Vec<_>>(),
                }));
            }
        }

        top_risks.sort_by(|a, b| {
            let score = |v: &serde_json::Value| v["risk_score"].as_f64().unwrap_or(0.0);
            score(b).total_cmp(&score(a))
        });
        top_risks.truncate(5);

        let total = assessments.len() as f64;
        let attention_ratio = distribution[2] as f64 / total;
        let moderate_ratio = distribution[1] as f64 / total;

        let overall = if attention_ratio >= 0.3 {
            "attention"
        } else if attention_ratio >= 0.1 || moderate_ratio >= 0.5 {
            "moderate"
        } else {
            "low"
        };

        serde_json::json!({
            "overall_risk_level": overall,
            "total_clauses": assessments.len(),
            "risk_distribution": {
                "low": distribution[0],
                "moderate": distribution[1],
                "attention": distribution[2],
            },
            "needs_review_count": needs_review_count,
            "top_risks": top_risks,
            "average_risk_score": total_score / total,
            "risk_ratios": {
                "attention_ratio": attention_ratio,
                "moderate_ratio": moderate_ratio,
                "low_ratio": distribution[0] as f64 / total,
            },
        })
    }
}

/// Match the keyword catalog against clause text (and summary, when present)
fn analyze_keywords(clause_text: &str, summary: Option<&str>) -> KeywordAssessment {
    let analysis_text = match summary {
        Some(s) => format!("{}\n{}", clause_text, s),
        None => clause_text.to_string(),
    };

    let mut detected: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut risk_factors: Vec<String> = Vec::new();
    let mut total = 0.0;
    let mut hits = 0usize;

    for keyword in RISK_KEYWORDS.iter() {
        let matches: Vec<&str> = keyword
            .regex
            .find_iter(&analysis_text)
            .map(|m| m.as_str())
            .collect();
        if matches.is_empty() {
            continue;
        }

        hits += 1;
        for m in &matches {
            let lowered = m.to_lowercase();
            if seen.insert(lowered.clone()) {
                detected.push(lowered);
            }
        }

        let mut contribution = keyword.weight;
        for negative in keyword.negative_contexts {
            if analysis_text.to_lowercase().contains(negative) {
                contribution *= 0.5;
                risk_factors.push(format!("Mitigated: {}", negative));
                break;
            }
        }
        total += contribution;

        risk_factors.push(format!("High-risk keyword: {}", matches[0]));
    }

    let score = if hits > 0 {
        (total / hits as f64).min(1.0)
    } else {
        0.0
    };

    KeywordAssessment {
        score,
        distinct_count: detected.len(),
        detected_keywords: detected,
        risk_factors,
    }
}

/// Base 0.6; +0.2 for keyword evidence; +agreement-weighted 0.2 with an LLM label
fn assessment_confidence(keyword: &KeywordAssessment, llm_score: Option<f64>) -> f64 {
    let mut confidence = 0.6;
    if keyword.distinct_count > 0 {
        confidence += 0.2;
    }
    if let Some(llm) = llm_score {
        let agreement = 1.0 - (keyword.score - llm).abs();
        confidence += agreement * 0.2;
    }
    confidence.min(1.0)
}

fn build_explanation(
    risk_level: RiskLevel,
    keyword: &KeywordAssessment,
    needs_review: bool,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(
        match risk_level {
            RiskLevel::Low => "This clause appears to have minimal risk.",
            RiskLevel::Moderate => "This clause contains terms that require attention.",
            RiskLevel::Attention => "This clause contains potentially problematic terms.",
        }
        .to_string(),
    );

    if !keyword.detected_keywords.is_empty() {
        let shown: Vec<&str> = keyword
            .detected_keywords
            .iter()
            .take(3)
            .map(|s| s.as_str())
            .collect();
        let suffix = if keyword.detected_keywords.len() > 3 {
            "..."
        } else {
            ""
        };
        parts.push(format!(
            "Risk keywords detected: {}{}.",
            shown.join(", "),
            suffix
        ));
    }

    if !keyword.risk_factors.is_empty() {
        let top: Vec<&str> = keyword
            .risk_factors
            .iter()
            .take(2)
            .map(|s| s.as_str())
            .collect();
        parts.push(format!("Key concerns: {}.", top.join(". ")));
    }

    if needs_review {
        parts.push("Manual legal review recommended.".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indemnity_clause_scores_high() {
        let fuser = RiskFuser::new();
        let assessment = fuser.fuse(
            "Company shall indemnify and hold Customer harmless against all third-party claims, \
             including unlimited consequential damages.",
            None,
            Some(RiskLevel::Attention),
            ClauseCategory::Indemnity,
        );

        assert!(assessment.risk_score >= 0.8, "score {}", assessment.risk_score);
        assert_eq!(assessment.risk_level, RiskLevel::Attention);
        assert!(assessment.needs_review);
        assert!(!assessment.detected_keywords.is_empty());
    }

    #[test]
    fn test_benign_clause_scores_low() {
        let fuser = RiskFuser::new();
        let assessment = fuser.fuse(
            "Each party will designate a point of contact for day-to-day coordination.",
            None,
            Some(RiskLevel::Low),
            ClauseCategory::Other,
        );

        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(!assessment.needs_review);
        assert!(assessment.detected_keywords.is_empty());
    }

    #[test]
    fn test_level_matches_score_thresholds() {
        let fuser = RiskFuser::new();
        let texts = [
            "Each party will designate a coordinator.",
            "The vendor may terminate without cause at its sole discretion with penalties.",
            "Unlimited punitive damages and hold harmless obligations apply in perpetuity.",
        ];
        for text in texts {
            let a = fuser.fuse(text, None, None, ClauseCategory::Other);
            assert_eq!(a.risk_level, RiskLevel::from_score(a.risk_score));
        }
    }

    #[test]
    fn test_disagreement_triggers_review() {
        let fuser = RiskFuser::new();
        // No keywords (score 0) vs attention label (0.8): disagreement 0.8 > 0.4
        let assessment = fuser.fuse(
            "Each party will designate a point of contact for coordination purposes.",
            None,
            Some(RiskLevel::Attention),
            ClauseCategory::Other,
        );
        assert!(assessment.needs_review);
    }

    #[test]
    fn test_needs_review_implies_trigger() {
        let fuser = RiskFuser::new();
        let samples = [
            ("Company shall indemnify, defend, and hold harmless Customer with unlimited liability and penalties.", Some(RiskLevel::Attention)),
            ("Payment terms are net thirty with late fees on overdue balances.", Some(RiskLevel::Low)),
            ("This Agreement renews automatically in perpetuity and may be terminated immediately at sole discretion.", None),
        ];

        for (text, label) in samples {
            let a = fuser.fuse(text, None, label, ClauseCategory::Other);
            if a.needs_review {
                let llm = label.map(|l| l.llm_score());
                let keyword = analyze_keywords(text, None);
                let disagreement = llm.map(|l| (keyword.score - l).abs()).unwrap_or(0.0);
                assert!(
                    a.risk_score >= REVIEW_SCORE_THRESHOLD
                        || a.detected_keywords.len() >= REVIEW_KEYWORD_COUNT
                        || disagreement > REVIEW_DISAGREEMENT,
                    "needs_review without a triggering condition for: {}",
                    text
                );
            }
        }
    }

    #[test]
    fn test_negative_context_halves_contribution() {
        let fuser = RiskFuser::new();
        let plain = fuser.fuse(
            "Company is liable for consequential damages.",
            None,
            None,
            ClauseCategory::Other,
        );
        let mitigated = fuser.fuse(
            "Company is liable, excluding consequential damages of any kind (no consequential damages).",
            None,
            None,
            ClauseCategory::Other,
        );
        assert!(mitigated.risk_score < plain.risk_score);
        assert!(mitigated
            .risk_factors
            .iter()
            .any(|f| f.starts_with("Mitigated:")));
    }

    #[test]
    fn test_document_profile_ratios() {
        let fuser = RiskFuser::new();
        let high = fuser.fuse(
            "Unlimited punitive damages, hold harmless, indemnify everything in perpetuity.",
            None,
            Some(RiskLevel::Attention),
            ClauseCategory::Indemnity,
        );
        let low = fuser.fuse(
            "Coordinators will meet monthly.",
            None,
            Some(RiskLevel::Low),
            ClauseCategory::Other,
        );

        let profile = fuser.document_profile(&[high.clone(), low.clone(), low.clone()]);
        assert_eq!(profile["total_clauses"], 3);
        assert_eq!(profile["overall_risk_level"], "attention");
        assert!(profile["top_risks"].as_array().unwrap().len() <= 5);

        let empty = fuser.document_profile(&[]);
        assert_eq!(empty["overall_risk_level"], "low");
    }
}
