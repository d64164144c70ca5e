//! HTTP generation backend
//!
//! Speaks the provider's `generateContent` API with closed safety categories
//! and the platform's generation constraints. Transient failures are retried
//! by the embedded `RetryPolicy`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{GenerationConfig, LlmBackend};
use crate::retry::RetryPolicy;
use crate::LlmError;

/// Configuration for the HTTP backend
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub generation: GenerationConfig,
}

impl Default for HttpLlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            endpoint: "http://localhost:8089".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfigBody,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfigBody {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: usize,
}

#[derive(Serialize, Clone)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Closed safety category list sent with every request
const SAFETY_SETTINGS: [SafetySetting; 4] = [
    SafetySetting {
        category: "HARM_CATEGORY_DANGEROUS_CONTENT",
        threshold: "BLOCK_LOW_AND_ABOVE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_HARASSMENT",
        threshold: "BLOCK_LOW_AND_ABOVE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_HATE_SPEECH",
        threshold: "BLOCK_LOW_AND_ABOVE",
    },
    SafetySetting {
        category: "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        threshold: "BLOCK_LOW_AND_ABOVE",
    },
];

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// LLM backend over HTTP
pub struct HttpLlmBackend {
    config: HttpLlmConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpLlmBackend {
    pub fn new(config: HttpLlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/models/{}:generateContent",
            self.config.endpoint, self.config.model
        )
    }

    async fn generate_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: "system",
                parts: vec![Part { text: system_prompt }],
            },
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: user_prompt }],
            }],
            generation_config: GenerationConfigBody {
                temperature: self.config.generation.temperature,
                top_p: self.config.generation.top_p,
                top_k: self.config.generation.top_k,
                max_output_tokens: self.config.generation.max_output_tokens,
            },
            safety_settings: SAFETY_SETTINGS.to_vec(),
        };

        let mut builder = self.client.post(self.api_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse("empty response".to_string()));
        }

        Ok(text)
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        self.retry
            .run("llm_generate", || {
                self.generate_once(system_prompt, user_prompt)
            })
            .await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
