//! LLM backend trait and generation configuration

use async_trait::async_trait;

use crate::LlmError;

/// Per-call generation constraints.
///
/// Low temperature and closed safety categories keep output parseable and
/// grounded; callers never relax these per request.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 50,
            max_output_tokens: 8_000,
        }
    }
}

/// Pluggable LLM backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate text from a system directive and a user prompt
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, LlmError>;

    /// Model identifier, used for logging
    fn model_name(&self) -> &str;
}

/// Rough token estimate: one token per four characters, minimum one.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }
}
