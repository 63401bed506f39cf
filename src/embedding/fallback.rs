//! Hash-based fallback embedder.
//!
//! Deterministic pseudo-embeddings for offline use and tests. Vectors are
//! persisted in the embedding store, so hashing goes through SHA-256 rather
//! than `DefaultHasher`, whose output may change between toolchains.

use crate::Result;
use crate::embedding::Embedder;
use sha2::{Digest, Sha256};

const MODEL_NAME: &str = "fallback-hash-v1";

/// Hash-based fallback embedder.
///
/// Combines word-level hashing with character trigram hashing and normalizes
/// to unit length. Similarity reflects lexical overlap, not meaning.
///
/// # Examples
///
/// ```
/// use docqa_rs::embedding::{Embedder, FallbackEmbedder, DEFAULT_DIMENSIONS};
///
/// let embedder = FallbackEmbedder::new(DEFAULT_DIMENSIONS);
/// let emb1 = embedder.embed("hello world").unwrap();
/// let emb2 = embedder.embed("hello world").unwrap();
/// assert_eq!(emb1, emb2);
/// ```
#[derive(Debug, Clone)]
pub struct FallbackEmbedder {
    dimensions: usize,
}

impl FallbackEmbedder {
    /// Creates a new fallback embedder with the specified dimensions.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn stable_hash(s: &str) -> u64 {
        let digest = Sha256::digest(s.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_lowercase().next().unwrap_or(c)
                } else {
                    ' '
                }
            })
            .collect();

        // Words carry the primary signal
        for word in normalized.split_whitespace() {
            let hash = Self::stable_hash(word);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        let chars: Vec<char> = normalized.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            let hash = Self::stable_hash(&trigram);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
            embedding[idx] += sign;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Embedder for FallbackEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate_embedding(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;

        Ok(texts
            .par_iter()
            .map(|text| self.generate_embedding(text))
            .collect())
    }
}
