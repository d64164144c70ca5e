//! Text embeddings
//!
//! Generates dense vectors for clause summaries and questions. The HTTP
//! backend talks to the external embedding provider; `SimpleEmbedder` is a
//! deterministic hash embedder for tests and local development.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use clauselens_llm::RetryPolicy;

use crate::RagError;

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Vector dimension every embedding must have
    pub dimension: usize,
    /// Texts per provider request
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-004".to_string(),
            endpoint: "http://localhost:8090".to_string(),
            api_key: None,
            dimension: 768,
            batch_size: 100,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Pluggable embedding backend
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    /// Vector dimension this backend produces
    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding backend over HTTP
pub struct HttpEmbeddingBackend {
    config: EmbeddingConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpEmbeddingBackend {
    pub fn new(config: EmbeddingConfig) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        Ok(Self {
            config,
            client,
            retry: RetryPolicy::default(),
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/models/{}:batchEmbed",
            self.config.endpoint, self.config.model
        )
    }

    async fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut builder = self
            .client
            .post(self.api_url())
            .json(&EmbedRequest { texts: chunk });
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("HTTP {}: {}", status, message)));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if parsed.embeddings.len() != chunk.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} embeddings for {} texts",
                parsed.embeddings.len(),
                chunk.len()
            )));
        }

        for embedding in &parsed.embeddings {
            if embedding.len() != self.config.dimension {
                return Err(RagError::Dimension {
                    expected: self.config.dimension,
                    got: embedding.len(),
                });
            }
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let embeddings = self
                .retry
                .run("embed_batch", || self.embed_chunk(chunk))
                .await?;
            all.extend(embeddings);
        }
        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Deterministic hash-based embedder for tests (no provider required)
pub struct SimpleEmbedder {
    dimension: usize,
}

impl SimpleEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for (i, c) in text.chars().enumerate() {
            let index = (c as usize + i) % self.dimension;
            embedding[index] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingBackend for SimpleEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
