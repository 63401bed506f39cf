//! Hosted OpenAI embeddings.

use crate::Result;
use crate::embedding::{DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL, Embedder};
use crate::error::BuildError;
use crate::openai::{OpenAiClient, classify};
use async_openai::types::CreateEmbeddingRequestArgs;

/// Embedder backed by the OpenAI embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Creates an embedder using `text-embedding-ada-002`.
    #[must_use]
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the embedding model.
    #[must_use]
    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Sets how many texts go into one request. Zero means the default.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let input: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.as_str())
            .input(input)
            .build()
            .map_err(|e| BuildError::Embedding(e.to_string()))?;

        let response = self
            .client
            .block_on(async { self.client.client().embeddings().create(request).await })
            .map_err(|e| BuildError::Embedding(classify(e).to_string()))?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(BuildError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            ))
            .into());
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| BuildError::Embedding("empty embedding response".to_string()).into())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!(model = %self.model, batch = batch.len(), "embedding batch");
            out.extend(self.request(batch)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OpenAiEmbedder {
        OpenAiEmbedder::new(OpenAiClient::new("sk-test", None).unwrap())
    }

    #[test]
    fn test_defaults() {
        let embedder = embedder();
        assert_eq!(embedder.model_name(), "text-embedding-ada-002");
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_model_override() {
        let embedder = embedder().model("text-embedding-3-large").batch_size(0);
        assert_eq!(embedder.dimensions(), 3072);
        assert_eq!(embedder.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_empty_batch_makes_no_request() {
        assert!(embedder().embed_batch(&[]).unwrap().is_empty());
    }
}
