//! In-memory similarity retrieval over one document's chunks.
//!
//! A [`Retriever`] is built once per file identity and shared behind an
//! `Arc` by the content cache. It never changes after construction.

use crate::core::{Chunk, FileIdentity};
use crate::embedding::{Embedder, cosine_similarity};
use crate::error::{BuildError, Error, InvocationError, Result};
use crate::storage::CacheEntry;
use std::sync::Arc;

/// Default number of chunks handed to the model.
pub const DEFAULT_TOP_K: usize = 4;

/// A chunk ranked against a query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    /// The matching chunk.
    pub chunk: &'a Chunk,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Immutable similarity index for one document.
pub struct Retriever {
    entry: CacheEntry,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("identity", &self.entry.identity)
            .field("model", &self.entry.model_name)
            .field("chunks", &self.entry.chunks.len())
            .finish()
    }
}

impl Retriever {
    /// Wraps a cache entry. Queries are embedded with `embedder`, which must
    /// be the model that built the entry.
    #[must_use]
    pub fn new(entry: CacheEntry, embedder: Arc<dyn Embedder>) -> Self {
        Self { entry, embedder }
    }

    /// File this retriever was built from.
    #[must_use]
    pub const fn identity(&self) -> &FileIdentity {
        &self.entry.identity
    }

    /// Chunks in document order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.entry.chunks
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entry.chunks.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.chunks.is_empty()
    }

    /// Underlying cache entry.
    #[must_use]
    pub const fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    /// Returns up to `k` chunks most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Provider`] if the query cannot be embedded.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk<'_>>> {
        let vector = self.embedder.embed(query).map_err(|e| match e {
            Error::Build(BuildError::Embedding(msg)) => {
                InvocationError::Provider(format!("query embedding failed: {msg}")).into()
            }
            other => other,
        })?;
        Ok(self.search_vector(&vector, k))
    }

    /// Ranks chunks against an already embedded query.
    ///
    /// Ties keep document order.
    #[must_use]
    pub fn search_vector(&self, vector: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .entry
            .chunks
            .iter()
            .zip(&self.entry.embeddings)
            .map(|(chunk, embedding)| ScoredChunk {
                chunk,
                score: cosine_similarity(vector, embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(k);
        scored
    }
}
