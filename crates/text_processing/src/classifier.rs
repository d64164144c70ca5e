//! Clause category classification
//!
//! Pattern rules score each candidate against weighted keyword sets; when the
//! winning category lacks confidence or evidence, an optional semantic
//! classifier compares the clause against pre-embedded canonical examples.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::OnceCell;

use clauselens_core::ClauseCategory;

use crate::segmenter::ClauseCandidate;
use crate::TextProcessingError;

/// Minimum separation-based confidence before the pattern winner is accepted
const CONFIDENCE_THRESHOLD: f64 = 0.2;
/// Minimum weighted evidence before the pattern winner is accepted
const EVIDENCE_THRESHOLD: f64 = 1.5;
/// Minimum cosine similarity for a semantic match
const SEMANTIC_THRESHOLD: f64 = 0.7;

/// Provider seam for the semantic fallback
#[async_trait]
pub trait ExampleEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TextProcessingError>;
}

/// Classifier tuning
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub confidence_threshold: f64,
    pub evidence_threshold: f64,
    pub semantic_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: CONFIDENCE_THRESHOLD,
            evidence_threshold: EVIDENCE_THRESHOLD,
            semantic_threshold: SEMANTIC_THRESHOLD,
        }
    }
}

struct CategoryPatterns {
    category: ClauseCategory,
    patterns: Vec<Regex>,
}

fn compile(category: ClauseCategory, patterns: &[&str]) -> CategoryPatterns {
    CategoryPatterns {
        category,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).expect("invalid category pattern"))
            .collect(),
    }
}

/// Weighted keyword pattern sets per category
static CATEGORY_PATTERNS: Lazy<Vec<CategoryPatterns>> = Lazy::new(|| {
    vec![
        compile(
            ClauseCategory::Termination,
            &[
                r"\bterminat\w*\b",
                r"\bexpir\w*\b",
                r"\bcancel\w*\b",
                r"\brescind\b",
                r"\bbreach\b",
                r"\bviolat\w*\b",
                r"\bdefault\b",
                r"\bdissol\w*\b",
                r"\bcease\b",
                r"\bend\s+(?:this|the|such)\s*(?:agreement|contract)\b",
            ],
        ),
        compile(
            ClauseCategory::Liability,
            &[
                r"\bliabilit\w*\b",
                r"\bliable\b",
                r"\bdamages?\b",
                r"\bloss(?:es)?\b",
                r"\bharm\b",
                r"\bnegligen\w*\b",
                r"\bconsequential\s+damage\w*\b",
                r"\bpunitive\s+damage\w*\b",
                r"\bcompensat\w*\b",
                r"\breimburse\w*\b",
            ],
        ),
        compile(
            ClauseCategory::Indemnity,
            &[
                r"\bindemnif\w*\b",
                r"\bindemnity\b",
                r"\bhold\s+(?:\w+\s+)?harmless\b",
                r"\bdefend\b",
                r"\bsave\s+harmless\b",
                r"\bthird\s+party\s+claim\w*\b",
                r"\battorney\s*'?s?\s+fee\w*\b",
                r"\blegal\s+fee\w*\b",
            ],
        ),
        compile(
            ClauseCategory::Confidentiality,
            &[
                r"\bconfidential\w*\b",
                r"\bnon.?disclosure\b",
                r"\bNDA\b",
                r"\bproprietary\b",
                r"\btrade\s+secret\w*\b",
                r"\bnot\s+disclos\w*\b",
                r"\bkeep\s+(?:confidential|secret)\b",
                r"\bpublicly\s+available\b",
            ],
        ),
        compile(
            ClauseCategory::Payment,
            &[
                r"\bpayment\w*\b",
                r"\bpay\b",
                r"\bfee\w*\b",
                r"\binvoice\w*\b",
                r"\bbilling\b",
                r"\bnet\s+\d+\b",
                r"\blate\s+(?:fee|payment|penalty)\b",
                r"\boverdue\b",
                r"\btax\w*\b",
                r"\bexpens\w*\b",
            ],
        ),
        compile(
            ClauseCategory::IpOwnership,
            &[
                r"\bintellectual\s+property\b",
                r"\bcopyright\w*\b",
                r"\btrademark\w*\b",
                r"\bpatent\w*\b",
                r"\bownership\b",
                r"\bwork\s+product\b",
                r"\bderivative\s+work\w*\b",
                r"\binvention\w*\b",
                r"\bmoral\s+right\w*\b",
            ],
        ),
        compile(
            ClauseCategory::DisputeResolution,
            &[
                r"\bdispute\w*\b",
                r"\barbitration\b",
                r"\bmediat\w*\b",
                r"\blitigation\b",
                r"\btribunal\w*\b",
                r"\bjury\b",
                r"\blawsuit\w*\b",
                r"\bbinding\s+(?:arbitration|decision)\b",
                r"\bescalat\w*\b",
            ],
        ),
        compile(
            ClauseCategory::GoverningLaw,
            &[
                r"\bgoverning\s+law\b",
                r"\bapplicable\s+law\b",
                r"\bconstrued\s+(?:under|in\s+accordance\s+with)\b",
                r"\bjurisdiction\b",
                r"\bvenue\b",
                r"\bchoice\s+of\s+law\b",
                r"\blaw\w*\s+of\s+(?:the\s+)?state\b",
            ],
        ),
        compile(
            ClauseCategory::Assignment,
            &[
                r"\bassign\w*\b",
                r"\btransfer\w*\b",
                r"\bdelegate\w*\b",
                r"\bsubcontract\w*\b",
                r"\bnovation\b",
                r"\bwritten\s+consent\b",
                r"\bsuccessor\w*\s+(?:and\s+)?assign\w*\b",
            ],
        ),
        compile(
            ClauseCategory::Modification,
            &[
                r"\bmodif\w*\b",
                r"\bamend\w*\b",
                r"\bwaiv\w*\b",
                r"\baddendum\b",
                r"\bin\s+writing\b",
                r"\bentire\s+agreement\b",
                r"\bsupersede\w*\b",
            ],
        ),
        compile(
            ClauseCategory::Warranties,
            &[
                r"\bwarrant\w*\b",
                r"\bguarantee\w*\b",
                r"\brepresent\w*\b",
                r"\bas\s+is\b",
                r"\bmerchantabilit\w*\b",
                r"\bfitness\s+for\s+(?:a\s+particular\s+)?purpose\b",
                r"\bnon.?infringement\b",
                r"\bdefect\w*\b",
            ],
        ),
        compile(
            ClauseCategory::ForceMajeure,
            &[
                r"\bforce\s+majeure\b",
                r"\bact\w*\s+of\s+god\b",
                r"\bbeyond\s+(?:reasonable\s+)?control\b",
                r"\bnatural\s+disaster\w*\b",
                r"\bwar\b",
                r"\bstrike\w*\b",
                r"\bexcus\w*\s+(?:performance|delay)\b",
            ],
        ),
        compile(
            ClauseCategory::Definitions,
            &[
                r"\bdefinition\w*\b",
                r"\bshall\s+mean\w*\b",
                r"\bmeans\b",
                r"\bcapitalized\s+term\w*\b",
                r"\bas\s+defined\s+(?:above|below|herein)\b",
                r"\bas\s+set\s+forth\s+herein\b",
            ],
        ),
    ]
});

/// Canonical example sentences for the semantic fallback, 3–4 per category
static CATEGORY_EXAMPLES: Lazy<Vec<(ClauseCategory, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            ClauseCategory::Termination,
            vec![
                "This Agreement shall terminate immediately upon material breach.",
                "Either party may terminate this Agreement with thirty (30) days written notice.",
                "This Agreement expires on December 31, 2025 unless renewed.",
                "Upon termination, all obligations and rights shall cease.",
            ],
        ),
        (
            ClauseCategory::Liability,
            vec![
                "Company shall not be liable for any indirect or consequential damages.",
                "Customer's liability for damages shall be limited to the amount paid.",
                "Each party shall be responsible for their own negligent acts.",
                "Liability is limited to direct damages not exceeding the contract value.",
            ],
        ),
        (
            ClauseCategory::Indemnity,
            vec![
                "Company shall indemnify Customer against third-party claims.",
                "Each party agrees to hold the other harmless from any losses.",
                "Contractor shall defend against all intellectual property claims.",
                "Indemnification includes attorney fees and court costs.",
            ],
        ),
        (
            ClauseCategory::Confidentiality,
            vec![
                "All confidential information must remain private and secure.",
                "Neither party shall disclose proprietary information to third parties.",
                "This non-disclosure agreement covers all trade secrets.",
                "Confidential information survives termination for five years.",
            ],
        ),
        (
            ClauseCategory::Payment,
            vec![
                "Payment is due within thirty (30) days of invoice receipt.",
                "All fees are non-refundable and payable in advance.",
                "Late payments incur interest at 1.5% per month.",
                "Expenses shall be reimbursed upon submission of receipts.",
            ],
        ),
        (
            ClauseCategory::IpOwnership,
            vec![
                "All work product shall be owned exclusively by Company.",
                "Customer retains all rights to their existing intellectual property.",
                "Contractor assigns all invention rights to Company.",
                "Copyrights in deliverables vest immediately in Client.",
            ],
        ),
        (
            ClauseCategory::DisputeResolution,
            vec![
                "Any disputes shall be resolved through binding arbitration.",
                "Parties agree to mediate before pursuing litigation.",
                "All claims must be filed in the courts of California.",
                "Disputes shall be resolved through good faith negotiation first.",
            ],
        ),
        (
            ClauseCategory::GoverningLaw,
            vec![
                "This Agreement is governed by California law.",
                "The laws of New York shall apply to this contract.",
                "Jurisdiction is exclusively in Delaware courts.",
                "This Agreement is construed under federal law.",
            ],
        ),
        (
            ClauseCategory::Assignment,
            vec![
                "This Agreement may not be assigned without written consent.",
                "Rights and obligations may be transferred with approval.",
                "No delegation of duties is permitted without permission.",
                "Assignment binds successors and assigns.",
            ],
        ),
        (
            ClauseCategory::Modification,
            vec![
                "This Agreement may only be modified in writing.",
                "No oral amendments or changes are permitted.",
                "Changes require signed agreement by both parties.",
                "Waivers must be in writing to be effective.",
            ],
        ),
        (
            ClauseCategory::Warranties,
            vec![
                "Company warrants the software will perform as described.",
                "All services are provided 'as is' without warranty.",
                "Contractor guarantees workmanship for twelve months.",
                "Products are warranted against defects in materials.",
            ],
        ),
        (
            ClauseCategory::ForceMajeure,
            vec![
                "Performance is excused due to acts of God.",
                "Delays caused by uncontrollable circumstances are excused.",
                "Force majeure includes natural disasters and government action.",
                "Performance may be suspended during force majeure events.",
            ],
        ),
        (
            ClauseCategory::Definitions,
            vec![
                "Confidential Information means all non-public technical data.",
                "Services shall include all activities described in Exhibit A.",
                "Effective Date means the date this Agreement is signed.",
                "Intellectual Property includes all copyrights and patents.",
            ],
        ),
    ]
});

/// Semantic nearest-neighbor fallback over canonical category examples
pub struct SemanticClassifier {
    embedder: Arc<dyn ExampleEmbedder>,
    threshold: f64,
    /// Category example embeddings, generated once on first use
    category_embeddings: OnceCell<Vec<(ClauseCategory, Vec<Vec<f32>>)>>,
}

impl SemanticClassifier {
    pub fn new(embedder: Arc<dyn ExampleEmbedder>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
            category_embeddings: OnceCell::new(),
        }
    }

    async fn embeddings(
        &self,
    ) -> Result<&Vec<(ClauseCategory, Vec<Vec<f32>>)>, TextProcessingError> {
        self.category_embeddings
            .get_or_try_init(|| async {
                let mut all = Vec::with_capacity(CATEGORY_EXAMPLES.len());
                for (category, examples) in CATEGORY_EXAMPLES.iter() {
                    let texts: Vec<String> = examples.iter().map(|s| s.to_string()).collect();
                    let embeddings = self.embedder.embed_batch(&texts).await?;
                    all.push((*category, embeddings));
                }
                Ok(all)
            })
            .await
    }

    /// Classify by maximum cosine similarity to any canonical example
    pub async fn classify(
        &self,
        clause_text: &str,
    ) -> Result<Option<ClauseCategory>, TextProcessingError> {
        if clause_text.trim().is_empty() {
            return Ok(None);
        }

        let clause_embedding = self
            .embedder
            .embed_batch(&[clause_text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TextProcessingError::Classification("empty embedding response".to_string())
            })?;

        let mut best: Option<(ClauseCategory, f64)> = None;
        for (category, example_embeddings) in self.embeddings().await? {
            for example in example_embeddings {
                let similarity = cosine_similarity(&clause_embedding, example);
                if best.map_or(true, |(_, s)| similarity > s) {
                    best = Some((*category, similarity));
                }
            }
        }

        match best {
            Some((category, similarity)) if similarity >= self.threshold => {
                tracing::debug!(
                    category = category.as_str(),
                    similarity,
                    "Semantic classification accepted"
                );
                Ok(Some(category))
            },
            _ => Ok(None),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Category classifier: pattern rules first, semantic fallback second
pub struct CategoryClassifier {
    config: ClassifierConfig,
    semantic: Option<SemanticClassifier>,
}

impl CategoryClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            semantic: None,
        }
    }

    pub fn with_semantic(mut self, semantic: SemanticClassifier) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Set `.category` on every candidate
    pub async fn classify(&self, candidates: &mut [ClauseCandidate]) {
        for candidate in candidates.iter_mut() {
            candidate.category = self.classify_one(&candidate.text).await;
        }
    }

    async fn classify_one(&self, text: &str) -> ClauseCategory {
        let scores = score_categories(text);

        if let Some((best_category, best_score)) = scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .copied()
        {
            let confidence = if scores.len() > 1 {
                let mut sorted: Vec<f64> = scores.iter().map(|(_, s)| *s).collect();
                sorted.sort_by(|a, b| b.total_cmp(a));
                if sorted[0] > 0.0 {
                    (sorted[0] - sorted[1]) / sorted[0]
                } else {
                    0.0
                }
            } else {
                (best_score / 2.0).min(1.0)
            };

            if confidence >= self.config.confidence_threshold
                && best_score >= self.config.evidence_threshold
            {
                return best_category;
            }
        }

        if let Some(semantic) = &self.semantic {
            match semantic.classify(text).await {
                Ok(Some(category)) => return category,
                Ok(None) => {},
                Err(e) => {
                    tracing::warn!(error = %e, "Semantic classification failed");
                },
            }
        }

        ClauseCategory::Other
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Score every category's pattern set against the clause text
fn score_categories(text: &str) -> Vec<(ClauseCategory, f64)> {
    let lowered = text.to_lowercase();
    let word_count = text.split_whitespace().count();
    // Longer clauses get a mild boost per hit, capped at 1.5x
    let length_factor = if word_count > 50 {
        (1.0 + (word_count as f64 - 50.0) / 200.0).min(1.5)
    } else {
        1.0
    };

    let mut scores = Vec::new();
    for category_patterns in CATEGORY_PATTERNS.iter() {
        let mut score = 0.0;
        let mut hits = 0usize;

        for pattern in &category_patterns.patterns {
            let matches = pattern.find_iter(&lowered).count();
            if matches > 0 {
                hits += matches;
                score += matches as f64 * length_factor;
            }
        }

        if score > 0.0 {
            // Normalize by pattern count so large sets don't dominate
            let normalized = score / category_patterns.patterns.len() as f64 * hits as f64;
            scores.push((category_patterns.category, normalized));
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder {
        value: Vec<f32>,
    }

    #[async_trait]
    impl ExampleEmbedder for FixedEmbedder {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, TextProcessingError> {
            Ok(texts.iter().map(|_| self.value.clone()).collect())
        }
    }

    fn candidate(text: &str) -> ClauseCandidate {
        ClauseCandidate {
            text: text.to_string(),
            start_position: 0,
            end_position: text.len(),
            heading: None,
            confidence: 0.8,
            page_number: None,
            bounding_box: None,
            order: 1,
            category: ClauseCategory::Other,
        }
    }

    #[tokio::test]
    async fn test_indemnity_clause_classified() {
        let classifier = CategoryClassifier::default();
        let mut candidates = vec![candidate(
            "Company shall indemnify and hold Customer harmless against all third party claims, \
             including reasonable attorney fees and court costs incurred in the defense thereof.",
        )];
        classifier.classify(&mut candidates).await;
        assert_eq!(candidates[0].category, ClauseCategory::Indemnity);
    }

    #[tokio::test]
    async fn test_payment_clause_classified() {
        let classifier = CategoryClassifier::default();
        let mut candidates = vec![candidate(
            "Payment is due within thirty days of invoice receipt. Late payment of any invoice \
             incurs a late fee and interest on the overdue amount, plus applicable taxes.",
        )];
        classifier.classify(&mut candidates).await;
        assert_eq!(candidates[0].category, ClauseCategory::Payment);
    }

    #[tokio::test]
    async fn test_unmatched_text_is_other() {
        let classifier = CategoryClassifier::default();
        let mut candidates = vec![candidate("The quick brown fox jumps over the lazy dog.")];
        classifier.classify(&mut candidates).await;
        assert_eq!(candidates[0].category, ClauseCategory::Other);
    }

    #[tokio::test]
    async fn test_semantic_fallback_accepts_identical_embedding() {
        // All embeddings identical: similarity 1.0 against every example
        let embedder = Arc::new(FixedEmbedder {
            value: vec![1.0, 0.0, 0.0],
        });
        let semantic = SemanticClassifier::new(embedder, 0.7);
        let category = semantic.classify("some clause text").await.unwrap();
        assert!(category.is_some());
    }

    #[tokio::test]
    async fn test_semantic_fallback_rejects_below_threshold() {
        // Zero vector has zero norm, so every similarity is 0
        let embedder = Arc::new(FixedEmbedder {
            value: vec![0.0, 0.0, 0.0],
        });
        let semantic = SemanticClassifier::new(embedder, 0.7);
        let category = semantic.classify("some clause text").await.unwrap();
        assert!(category.is_none());
    }

    #[test]
    fn test_cosine_similarity_properties() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        // Symmetric
        let c = vec![0.5f32, 0.1, 0.9];
        assert!((cosine_similarity(&a, &c) - cosine_similarity(&c, &a)).abs() < 1e-12);
    }
}
