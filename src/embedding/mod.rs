//! Embedding generation for chunk retrieval.
//!
//! Three providers implement [`Embedder`]:
//!
//! - `openai`: hosted `text-embedding-ada-002` (feature `openai`, default)
//! - `fallback`: hash-based, offline and deterministic
//! - `fastembed`: local all-MiniLM-L6-v2 (feature `fastembed-embeddings`)
//!
//! Stored vectors are tagged with the provider's model name so a cache entry
//! built by one model is never queried with another.

mod fallback;

#[cfg(feature = "fastembed-embeddings")]
mod fastembed_impl;

#[cfg(feature = "openai")]
mod openai;

pub use fallback::FallbackEmbedder;

#[cfg(feature = "fastembed-embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

#[cfg(feature = "openai")]
pub use openai::OpenAiEmbedder;

use crate::Result;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Dimensions used by the fallback and fastembed providers.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Default hosted embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default number of texts sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Trait for embedding generators.
///
/// Implementations must be thread-safe (`Send + Sync`); the cache shares one
/// embedder across every build in a session.
///
/// # Examples
///
/// ```
/// use docqa_rs::embedding::{Embedder, FallbackEmbedder, DEFAULT_DIMENSIONS};
///
/// let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
/// let embedding = embedder.embed("Hello, world!").unwrap();
/// assert_eq!(embedding.len(), DEFAULT_DIMENSIONS);
/// ```
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifier of the model that produced the vectors.
    fn model_name(&self) -> &str;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BuildError::Embedding`] if generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts, in input order.
    ///
    /// The default implementation calls `embed` for each text sequentially.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Which embedding provider to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings.
    #[default]
    OpenAi,
    /// Hash-based offline embeddings.
    Fallback,
    /// Local ONNX model via fastembed.
    FastEmbed,
}

impl EmbeddingProvider {
    /// Whether this provider needs an API credential.
    #[must_use]
    pub const fn needs_credential(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "fallback" => Ok(Self::Fallback),
            "fastembed" => Ok(Self::FastEmbed),
            other => Err(ConfigError::InvalidValue {
                key: "embedding.provider".to_string(),
                reason: format!("unknown provider '{other}' (expected openai, fallback or fastembed)"),
            }),
        }
    }
}

/// Settings needed to construct an embedder.
#[derive(Debug, Clone, Default)]
pub struct EmbedderSettings<'a> {
    /// Provider to use.
    pub provider: EmbeddingProvider,
    /// Model override for hosted providers.
    pub model: Option<&'a str>,
    /// Texts per request.
    pub batch_size: usize,
    /// Resolved API credential, when the provider needs one.
    pub api_key: Option<&'a str>,
    /// Alternative API base URL.
    pub api_base: Option<&'a str>,
}

/// Creates an embedder for the configured provider.
///
/// # Errors
///
/// - [`ConfigError::MissingCredential`] when `openai` is selected without a key
/// - [`ConfigError::FeatureDisabled`] when the provider was not compiled in
pub fn create_embedder(settings: &EmbedderSettings<'_>) -> Result<Box<dyn Embedder>> {
    match settings.provider {
        EmbeddingProvider::Fallback => Ok(Box::new(FallbackEmbedder::new(DEFAULT_DIMENSIONS))),
        EmbeddingProvider::OpenAi => create_openai(settings),
        EmbeddingProvider::FastEmbed => create_fastembed(),
    }
}

#[cfg(feature = "openai")]
fn create_openai(settings: &EmbedderSettings<'_>) -> Result<Box<dyn Embedder>> {
    let api_key = settings.api_key.ok_or(ConfigError::MissingCredential)?;
    let client = crate::openai::OpenAiClient::new(api_key, settings.api_base)?;
    let mut embedder = OpenAiEmbedder::new(client).batch_size(settings.batch_size);
    if let Some(model) = settings.model {
        embedder = embedder.model(model);
    }
    Ok(Box::new(embedder))
}

#[cfg(not(feature = "openai"))]
fn create_openai(_settings: &EmbedderSettings<'_>) -> Result<Box<dyn Embedder>> {
    Err(ConfigError::FeatureDisabled {
        provider: "openai".to_string(),
        feature: "openai".to_string(),
    }
    .into())
}

#[cfg(feature = "fastembed-embeddings")]
fn create_fastembed() -> Result<Box<dyn Embedder>> {
    Ok(Box::new(FastEmbedEmbedder::new()?))
}

#[cfg(not(feature = "fastembed-embeddings"))]
fn create_fastembed() -> Result<Box<dyn Embedder>> {
    Err(ConfigError::FeatureDisabled {
        provider: "fastembed".to_string(),
        feature: "fastembed-embeddings".to_string(),
    }
    .into())
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical), or 0.0 if
/// the vectors have different lengths or zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
