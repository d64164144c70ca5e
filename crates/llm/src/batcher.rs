//! Batch clause summarization
//!
//! Packs clauses into token-bounded batches, issues all batches concurrently,
//! and validates the structured JSON output. A failing batch degrades to
//! fallback results for its clauses; it never fails the pipeline. Output
//! order always matches input order and `output.len() == input.len()`.

use std::sync::Arc;

use futures::future::join_all;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::json;

use clauselens_core::{ClauseCategory, RiskLevel};

use crate::backend::{estimate_tokens, LlmBackend};
use crate::prompt::{
    build_batch_prompt, build_summarization_system_prompt, enhance_advisor_language,
    extract_first_json_array,
};
use crate::LlmError;

/// Exact summary text used when summarization falls back
pub const FALLBACK_SUMMARY: &str =
    "This clause requires manual review. Automatic summarization failed.";

/// One clause going into a batch
#[derive(Debug, Clone)]
pub struct ClauseInput {
    pub text: String,
    /// Pattern-classified category, used as the fallback category
    pub category: ClauseCategory,
}

/// One clause's summarization result, positionally matched to its input
#[derive(Debug, Clone)]
pub struct ClauseSummary {
    pub summary: String,
    pub category: ClauseCategory,
    pub risk_level: RiskLevel,
    pub negotiation_tip: Option<String>,
    pub confidence: f64,
    pub processing_method: String,
    pub needs_review: bool,
}

/// Batching limits
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_clauses_per_batch: usize,
    pub max_prompt_tokens: usize,
    pub include_negotiation_tips: bool,
    /// Clause text is truncated to this many characters inside prompts
    pub max_clause_chars: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_clauses_per_batch: 10,
            max_prompt_tokens: 30_000,
            include_negotiation_tips: true,
            max_clause_chars: clauselens_config::constants::llm::CLAUSE_PROMPT_CHARS,
        }
    }
}

/// Schema each result item must satisfy before coercion
static ITEM_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let schema = json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "clause_category": {"type": "string"},
            "risk_level": {"type": "string"},
            "negotiation_tip": {"type": ["string", "null"]}
        },
        "required": ["summary"]
    });
    JSONSchema::compile(&schema).expect("invalid batch item schema")
});

/// Batch summarizer over an LLM backend
pub struct BatchSummarizer {
    backend: Arc<dyn LlmBackend>,
    config: BatchConfig,
}

impl BatchSummarizer {
    pub fn new(backend: Arc<dyn LlmBackend>, config: BatchConfig) -> Self {
        Self { backend, config }
    }

    /// Summarize all clauses. Results are positional: `output[i]` is `input[i]`.
    pub async fn summarize(&self, clauses: &[ClauseInput]) -> Vec<ClauseSummary> {
        if clauses.is_empty() {
            return Vec::new();
        }

        let batches = self.create_batches(clauses);
        tracing::info!(
            clauses = clauses.len(),
            batches = batches.len(),
            model = self.backend.model_name(),
            "Starting batch summarization"
        );

        // Batches run concurrently; join_all returns them in submission order,
        // and each batch is a contiguous, in-order slice of the input.
        let futures = batches
            .iter()
            .enumerate()
            .map(|(batch_num, batch)| self.process_batch_with_fallback(batch, batch_num + 1));
        let results: Vec<Vec<ClauseSummary>> = join_all(futures).await;

        let flattened: Vec<ClauseSummary> = results.into_iter().flatten().collect();
        debug_assert_eq!(flattened.len(), clauses.len());
        tracing::info!(results = flattened.len(), "Batch summarization complete");
        flattened
    }

    /// Greedy packing bounded by clause count and the token budget
    fn create_batches<'a>(&self, clauses: &'a [ClauseInput]) -> Vec<&'a [ClauseInput]> {
        let token_budget = (self.config.max_prompt_tokens as f64
            * clauselens_config::constants::llm::BATCH_TOKEN_BUFFER)
            as usize;

        let mut batches = Vec::new();
        let mut start = 0usize;
        let mut tokens = 0usize;

        for (i, clause) in clauses.iter().enumerate() {
            let clause_tokens = estimate_tokens(&clause.text);
            let full = i - start >= self.config.max_clauses_per_batch
                || (i > start && tokens + clause_tokens > token_budget);
            if full {
                batches.push(&clauses[start..i]);
                start = i;
                tokens = 0;
            }
            tokens += clause_tokens;
        }
        if start < clauses.len() {
            batches.push(&clauses[start..]);
        }

        batches
    }

    /// A failing batch yields one fallback result per clause
    async fn process_batch_with_fallback(
        &self,
        batch: &[ClauseInput],
        batch_num: usize,
    ) -> Vec<ClauseSummary> {
        match self.process_batch(batch).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(batch = batch_num, error = %e, "Batch failed, using fallbacks");
                batch.iter().map(fallback_result).collect()
            },
        }
    }

    /// Process one batch, recursively splitting when the prompt overflows
    fn process_batch<'a>(
        &'a self,
        batch: &'a [ClauseInput],
    ) -> futures::future::BoxFuture<'a, Result<Vec<ClauseSummary>, LlmError>> {
        Box::pin(async move {
            let system_prompt =
                build_summarization_system_prompt(self.config.include_negotiation_tips);
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let user_prompt = build_batch_prompt(&texts, self.config.max_clause_chars);

            let total_tokens = estimate_tokens(&system_prompt) + estimate_tokens(&user_prompt);
            if total_tokens > self.config.max_prompt_tokens && batch.len() > 1 {
                tracing::warn!(
                    tokens = total_tokens,
                    clauses = batch.len(),
                    "Prompt exceeds token limit, splitting batch"
                );
                let mid = batch.len() / 2;
                let mut first = self.process_batch(&batch[..mid]).await?;
                let second = self.process_batch(&batch[mid..]).await?;
                first.extend(second);
                return Ok(first);
            }

            let response = self.backend.generate(&system_prompt, &user_prompt).await?;
            Ok(parse_batch_response(&response, batch))
        })
    }
}

/// Parse and validate a batch response, padding misses with fallbacks
fn parse_batch_response(response: &str, batch: &[ClauseInput]) -> Vec<ClauseSummary> {
    let parsed: Vec<serde_json::Value> = extract_first_json_array(response)
        .and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or_default();

    if parsed.is_empty() {
        tracing::error!("No JSON array found in batch response, using fallbacks");
        return batch.iter().map(fallback_result).collect();
    }

    batch
        .iter()
        .enumerate()
        .map(|(i, clause)| match parsed.get(i) {
            Some(item) if ITEM_SCHEMA.is_valid(item) => validated_result(item, clause),
            _ => fallback_result(clause),
        })
        .collect()
}

/// Coerce a validated item onto the closed enums
fn validated_result(item: &serde_json::Value, clause: &ClauseInput) -> ClauseSummary {
    let summary = item["summary"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Summary not available");

    let category = item["clause_category"]
        .as_str()
        .map(ClauseCategory::parse_lenient)
        .unwrap_or(clause.category);

    let risk_level = item["risk_level"]
        .as_str()
        .map(RiskLevel::parse_lenient)
        .unwrap_or(RiskLevel::Moderate);

    let negotiation_tip = item["negotiation_tip"]
        .as_str()
        .filter(|s| !s.trim().is_empty() && *s != "null")
        .map(enhance_advisor_language);

    ClauseSummary {
        summary: enhance_advisor_language(summary),
        category,
        risk_level,
        negotiation_tip,
        confidence: 0.8,
        processing_method: "llm".to_string(),
        needs_review: false,
    }
}

/// Fallback result for a clause whose batch failed or came back short
fn fallback_result(clause: &ClauseInput) -> ClauseSummary {
    ClauseSummary {
        summary: FALLBACK_SUMMARY.to_string(),
        category: clause.category,
        risk_level: RiskLevel::Moderate,
        negotiation_tip: None,
        confidence: 0.3,
        processing_method: "fallback".to_string(),
        needs_review: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedBackend {
        response: Result<String, String>,
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.response
                .clone()
                .map_err(LlmError::Generation)
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn inputs(n: usize) -> Vec<ClauseInput> {
        (0..n)
            .map(|i| ClauseInput {
                text: format!("Clause number {} about payment terms and invoices.", i),
                category: ClauseCategory::Payment,
            })
            .collect()
    }

    fn summarizer(response: Result<String, String>) -> BatchSummarizer {
        BatchSummarizer::new(
            Arc::new(CannedBackend { response }),
            BatchConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_output_length_equals_input_length_on_success() {
        let response = serde_json::to_string(&json!([
            {"id": "clause_0", "summary": "You pay on time.", "clause_category": "Payment", "risk_level": "low", "negotiation_tip": null},
            {"id": "clause_1", "summary": "Late fees apply.", "clause_category": "Payment", "risk_level": "moderate", "negotiation_tip": "Ask to cap late fees."}
        ]))
        .unwrap();

        let clauses = inputs(2);
        let results = summarizer(Ok(response)).summarize(&clauses).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].summary, "You pay on time.");
        assert_eq!(results[0].processing_method, "llm");
        assert_eq!(results[1].negotiation_tip.as_deref(), Some("Ask to cap late fees."));
    }

    #[tokio::test]
    async fn test_output_length_equals_input_length_on_failure() {
        let clauses = inputs(7);
        let results = summarizer(Err("provider down".into())).summarize(&clauses).await;

        assert_eq!(results.len(), 7);
        for result in &results {
            assert_eq!(result.summary, FALLBACK_SUMMARY);
            assert_eq!(result.processing_method, "fallback");
            assert!(result.needs_review);
            assert!((result.confidence - 0.3).abs() < 1e-9);
            assert_eq!(result.category, ClauseCategory::Payment);
        }
    }

    #[tokio::test]
    async fn test_short_response_padded_with_fallbacks() {
        let response = serde_json::to_string(&json!([
            {"id": "clause_0", "summary": "Only one result."}
        ]))
        .unwrap();

        let clauses = inputs(3);
        let results = summarizer(Ok(response)).summarize(&clauses).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].summary, "Only one result.");
        assert_eq!(results[1].summary, FALLBACK_SUMMARY);
        assert_eq!(results[2].summary, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn test_enums_coerced_on_bad_values() {
        let response = serde_json::to_string(&json!([
            {"summary": "ok", "clause_category": "Nonsense", "risk_level": "catastrophic"}
        ]))
        .unwrap();

        let clauses = inputs(1);
        let results = summarizer(Ok(response)).summarize(&clauses).await;

        assert_eq!(results[0].category, ClauseCategory::Other);
        assert_eq!(results[0].risk_level, RiskLevel::Moderate);
    }

    #[tokio::test]
    async fn test_invalid_json_yields_fallbacks() {
        let clauses = inputs(2);
        let results = summarizer(Ok("not json at all".into())).summarize(&clauses).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.processing_method == "fallback"));
    }

    #[test]
    fn test_batches_respect_clause_limit() {
        let summarizer = summarizer(Ok(String::new()));
        let clauses = inputs(25);
        let batches = summarizer.create_batches(&clauses);

        assert!(batches.iter().all(|b| b.len() <= 10));
        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, 25);
    }

    #[test]
    fn test_batches_respect_token_budget() {
        let backend = Arc::new(CannedBackend {
            response: Ok(String::new()),
        });
        let summarizer = BatchSummarizer::new(
            backend,
            BatchConfig {
                max_prompt_tokens: 100,
                ..Default::default()
            },
        );
        // Each clause is ~50 tokens; budget 70, so one clause per batch
        let clauses: Vec<ClauseInput> = (0..4)
            .map(|_| ClauseInput {
                text: "x".repeat(200),
                category: ClauseCategory::Other,
            })
            .collect();
        let batches = summarizer.create_batches(&clauses);
        assert_eq!(batches.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results = summarizer(Ok(String::new())).summarize(&[]).await;
        assert!(results.is_empty());
    }
}
