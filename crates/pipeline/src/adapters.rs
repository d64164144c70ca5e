//! Adapters bridging crate seams

use std::sync::Arc;

use async_trait::async_trait;

use clauselens_rag::EmbeddingBackend;
use clauselens_text_processing::{classifier::ExampleEmbedder, TextProcessingError};

/// Exposes the embedding backend to the semantic category classifier
pub struct SemanticEmbedder {
    inner: Arc<dyn EmbeddingBackend>,
}

impl SemanticEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingBackend>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ExampleEmbedder for SemanticEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TextProcessingError> {
        self.inner
            .embed_batch(texts)
            .await
            .map_err(|e| TextProcessingError::Classification(e.to_string()))
    }
}
