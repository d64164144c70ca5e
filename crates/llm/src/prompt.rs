//! Prompt builders and structured-response parsing

use clauselens_core::Language;
use serde::Deserialize;
use serde_json::json;

/// Metadata about a retrieved clause included in a Q&A prompt
#[derive(Debug, Clone)]
pub struct QaClauseContext {
    pub clause_id: String,
    pub order: usize,
    pub category: String,
    pub summary: String,
    pub original_text: String,
}

/// Parsed Q&A model output
#[derive(Debug, Clone)]
pub struct QaResult {
    pub answer: String,
    pub used_clause_numbers: Vec<usize>,
    pub confidence: f64,
    pub additional_insights: Option<String>,
}

/// System prompt for batch clause summarization
pub fn build_summarization_system_prompt(include_negotiation_tips: bool) -> String {
    let mut prompt = String::from(
        "You are a trusted legal advisor who translates contract language into plain English \
         for everyday readers.\n\n\
         FOR EACH CLAUSE you must:\n\
         1. TRANSLATE: rewrite the clause in simple, everyday terms (8th grade level)\n\
         2. CATEGORIZE: classify the clause type accurately\n\
         3. ASSESS RISK: identify potential dangers or benefits for the reader\n\
         4. OUTPUT: return structured JSON only\n\n\
         TRANSLATION RULES:\n\
         - Replace 'herein' with 'in this document', 'whereas' with 'since', \
           'shall' with 'will' or 'must', 'notwithstanding' with 'despite'\n\
         - Turn passive voice into active voice and break up run-on sentences\n\
         - Focus on practical impact: what does this mean for the reader?\n\
         - Never add facts not present in the original text\n\
         - Always produce valid JSON that can be parsed programmatically",
    );

    if include_negotiation_tips {
        prompt.push_str(
            "\n\n5. NEGOTIATION GUIDANCE: give a specific, actionable tip for improving the \
             clause, with suggested language where possible, or null when nothing applies",
        );
    }

    prompt
}

/// User prompt for one batch of clauses
pub fn build_batch_prompt(clause_texts: &[&str], max_clause_chars: usize) -> String {
    let mut clauses_section = String::from("CLAUSES:\n");
    for (i, text) in clause_texts.iter().enumerate() {
        let truncated: String = text.chars().take(max_clause_chars).collect();
        clauses_section.push_str("===\n");
        clauses_section.push_str(
            &json!({"id": format!("clause_{}", i), "text": truncated}).to_string(),
        );
        clauses_section.push_str("\n===\n");
    }

    let output_format = json!([{
        "id": "clause_0",
        "summary": "Plain-language translation of what this clause really means",
        "clause_category": "One of: Termination, Liability, Indemnity, Confidentiality, Payment, IP Ownership, Dispute Resolution, Governing Law, Assignment, Modification, Warranties, Force Majeure, Definitions, Other",
        "risk_level": "One of: low, moderate, attention",
        "negotiation_tip": "Specific, actionable advice for improving this clause, or null"
    }]);

    format!(
        "{}\nReturn a JSON array with exactly one object per clause, in input order, using \
         this format:\n{}\n\n\
         CHECKLIST:\n\
         - All strings properly escaped for JSON\n\
         - Each clause gets exactly one result object\n\
         - risk levels: 'low' = no concern, 'moderate' = worth understanding, \
           'attention' = significant risk\n\
         - Must be valid, parseable JSON only",
        clauses_section,
        serde_json::to_string_pretty(&output_format).unwrap_or_default()
    )
}

/// System prompt for grounded Q&A
pub fn build_qa_system_prompt(language: Language) -> String {
    format!(
        "You are a helpful legal advisor answering questions about a contract.\n\n\
         ANSWER GUIDELINES:\n\
         - Base answers ONLY on the provided clauses; never invent facts\n\
         - If the clauses do not clearly address the question, say so and describe what \
           the related clauses do say\n\
         - Reference clauses as \"Clause X (Category)\" using the clause number, never \
           internal identifiers\n\
         - Use everyday language anyone can understand\n\
         - Point out related risks or clauses the reader should also look at\n\
         - Respond in {}\n\n\
         Always output a single JSON object and nothing else.",
        language.display_name()
    )
}

/// User prompt for grounded Q&A
pub fn build_qa_user_prompt(
    question: &str,
    clauses: &[QaClauseContext],
    conversation_context: Option<&str>,
) -> String {
    let mut clauses_section = String::from("CLAUSES:\n");
    for clause in clauses {
        clauses_section.push_str(&format!("Clause {} ({}):\n", clause.order, clause.category));
        clauses_section.push_str(&format!("Summary: {}\n", clause.summary));
        let original: String = clause.original_text.chars().take(500).collect();
        clauses_section.push_str(&format!("Original: {}...\n\n", original));
    }

    let output_format = json!({
        "answer": "Your helpful answer based only on the clauses above",
        "used_clause_numbers": [1, 2],
        "confidence": 0.85,
        "additional_insights": "Optional related risks or suggestions, or null"
    });

    let context_section = match conversation_context {
        Some(context) if !context.is_empty() => {
            format!("Previous context:\n{}\n\n", context)
        },
        _ => String::new(),
    };

    format!(
        "{}{}QUESTION: {}\n\n\
         Return your response in this exact JSON format:\n{}\n\n\
         - confidence is 0-1 based on how clearly the clauses answer the question\n\
         - used_clause_numbers lists the clause numbers your answer relies on\n\
         - cite clauses as \"Clause X (Category Name)\"",
        context_section,
        clauses_section,
        question,
        serde_json::to_string_pretty(&output_format).unwrap_or_default()
    )
}

/// Extract the first top-level JSON array from model output
pub fn extract_first_json_array(response: &str) -> Option<&str> {
    let start = response.find('[')?;
    let end = response.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

/// Extract the first top-level JSON object from model output
pub fn extract_first_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

#[derive(Deserialize)]
struct RawQaResponse {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    used_clause_numbers: Vec<serde_json::Value>,
    #[serde(default)]
    used_clause_ids: Vec<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    additional_insights: Option<String>,
}

/// Parse the Q&A model output into a `QaResult`.
///
/// Returns `None` when no JSON object can be recovered; the caller supplies
/// the canned apology in that case. Clause ids are mapped back to numbers via
/// the provided context when the model used the legacy id field.
pub fn parse_qa_response(response: &str, clauses: &[QaClauseContext]) -> Option<QaResult> {
    let json_text = extract_first_json_object(response)?;
    let raw: RawQaResponse = serde_json::from_str(json_text).ok()?;

    let mut numbers: Vec<usize> = raw
        .used_clause_numbers
        .iter()
        .filter_map(|v| v.as_u64().map(|n| n as usize))
        .collect();

    if numbers.is_empty() && !raw.used_clause_ids.is_empty() {
        numbers = raw
            .used_clause_ids
            .iter()
            .filter_map(|id| clauses.iter().find(|c| &c.clause_id == id).map(|c| c.order))
            .collect();
    }

    // Keep only numbers that refer to provided clauses
    numbers.retain(|n| clauses.iter().any(|c| c.order == *n));
    numbers.dedup();

    Some(QaResult {
        answer: enhance_advisor_language(&raw.answer),
        used_clause_numbers: numbers,
        confidence: raw.confidence.clamp(0.0, 1.0),
        additional_insights: raw
            .additional_insights
            .filter(|s| !s.trim().is_empty() && s.trim() != "null")
            .map(|s| enhance_advisor_language(&s)),
    })
}

/// Jargon translations applied to model output before it reaches the reader
const JARGON_TRANSLATIONS: &[(&str, &str)] = &[
    ("pursuant to", "according to"),
    ("in the event that", "if"),
    ("notwithstanding", "despite"),
    ("hereinafter", "from now on in this document"),
    ("aforementioned", "mentioned earlier"),
    ("force majeure", "uncontrollable events (like natural disasters)"),
    ("liquidated damages", "penalty fees"),
    ("hold harmless", "protect them from any costs"),
    ("sole discretion", "they decide everything"),
    ("indemnify", "protect and cover costs for"),
];

/// Replace residual legal jargon with plain-language equivalents
pub fn enhance_advisor_language(text: &str) -> String {
    let mut enhanced = text.to_string();
    for (term, plain) in JARGON_TRANSLATIONS {
        enhanced = enhanced.replace(term, plain);
    }
    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(order: usize) -> QaClauseContext {
        QaClauseContext {
            clause_id: format!("d1_clause_{}", order - 1),
            order,
            category: "Termination".to_string(),
            summary: "You can end the contract.".to_string(),
            original_text: "Either party may terminate.".to_string(),
        }
    }

    #[test]
    fn test_extract_json_array() {
        let response = "Sure! Here it is:\n[{\"id\": \"clause_0\"}]\nHope that helps.";
        assert_eq!(
            extract_first_json_array(response),
            Some("[{\"id\": \"clause_0\"}]")
        );
        assert_eq!(extract_first_json_array("no json here"), None);
    }

    #[test]
    fn test_parse_qa_response_with_numbers() {
        let clauses = vec![context(1), context(2)];
        let response = r#"{"answer": "See Clause 1.", "used_clause_numbers": [1], "confidence": 0.9}"#;
        let result = parse_qa_response(response, &clauses).unwrap();
        assert_eq!(result.used_clause_numbers, vec![1]);
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_parse_qa_response_with_legacy_ids() {
        let clauses = vec![context(1), context(2)];
        let response = r#"{"answer": "ok", "used_clause_ids": ["d1_clause_1"], "confidence": 0.5}"#;
        let result = parse_qa_response(response, &clauses).unwrap();
        assert_eq!(result.used_clause_numbers, vec![2]);
    }

    #[test]
    fn test_parse_qa_response_drops_unknown_numbers() {
        let clauses = vec![context(1)];
        let response = r#"{"answer": "ok", "used_clause_numbers": [1, 7], "confidence": 2.0}"#;
        let result = parse_qa_response(response, &clauses).unwrap();
        assert_eq!(result.used_clause_numbers, vec![1]);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_parse_qa_response_garbage_is_none() {
        assert!(parse_qa_response("total nonsense", &[]).is_none());
    }

    #[test]
    fn test_advisor_language() {
        let enhanced = enhance_advisor_language("Payment pursuant to schedule A.");
        assert_eq!(enhanced, "Payment according to schedule A.");
    }

    #[test]
    fn test_batch_prompt_truncates_clause_text() {
        let long = "x".repeat(5_000);
        let prompt = build_batch_prompt(&[long.as_str()], 2_000);
        assert!(prompt.len() < 4_000);
        assert!(prompt.contains("clause_0"));
    }

    #[test]
    fn test_qa_system_prompt_names_language() {
        let prompt = build_qa_system_prompt(Language::Spanish);
        assert!(prompt.contains("Respond in Spanish"));
    }
}
