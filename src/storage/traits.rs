//! Embedding store trait and record types.

use crate::core::{Chunk, FileIdentity};
use crate::error::{Result, StorageError};
use serde::Serialize;

/// Chunks and vectors built for one file identity with one embedding model.
///
/// Invariant: `chunks.len() == embeddings.len()` and every vector has
/// `dimensions` components. [`CacheEntry::new`] enforces both.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// File the entry was built from.
    pub identity: FileIdentity,
    /// Model that produced the vectors.
    pub model_name: String,
    /// Vector width.
    pub dimensions: usize,
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
    /// One vector per chunk, same order.
    pub embeddings: Vec<Vec<f32>>,
    /// Unix timestamp of the build.
    pub created_at: i64,
}

impl CacheEntry {
    /// Creates a validated entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if chunk and vector counts
    /// differ or a vector has the wrong width.
    pub fn new(
        identity: FileIdentity,
        model_name: impl Into<String>,
        dimensions: usize,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(StorageError::Serialization(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            ))
            .into());
        }
        if let Some(bad) = embeddings.iter().position(|e| e.len() != dimensions) {
            return Err(StorageError::Serialization(format!(
                "embedding {bad} has {} dimensions, expected {dimensions}",
                embeddings[bad].len()
            ))
            .into());
        }
        Ok(Self {
            identity,
            model_name: model_name.into(),
            dimensions,
            chunks,
            embeddings,
            created_at: crate::core::turn::current_timestamp(),
        })
    }

    /// Total bytes of chunk text.
    #[must_use]
    pub fn text_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Summary row for listings.
    #[must_use]
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            identity: self.identity.clone(),
            model_name: self.model_name.clone(),
            dimensions: self.dimensions,
            chunk_count: self.chunks.len(),
            text_bytes: self.text_bytes(),
            created_at: self.created_at,
        }
    }
}

/// Listing row for a stored entry, without chunk bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    /// File the entry was built from.
    pub identity: FileIdentity,
    /// Model that produced the vectors.
    pub model_name: String,
    /// Vector width.
    pub dimensions: usize,
    /// Number of chunks.
    pub chunk_count: usize,
    /// Total bytes of chunk text.
    pub text_bytes: usize,
    /// Unix timestamp of the build.
    pub created_at: i64,
}

impl EntrySummary {
    /// Whether `query` names this entry.
    ///
    /// Accepts the file name, the display form `name@<short hash>`, the full
    /// key, or a hash prefix of at least 8 characters.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let id = &self.identity;
        query == id.name
            || query == id.to_string()
            || query == id.key()
            || (query.len() >= 8 && id.content_hash.starts_with(query))
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Number of stored entries.
    pub entry_count: usize,
    /// Total chunks across entries.
    pub chunk_count: usize,
    /// Total bytes of chunk text.
    pub total_text_bytes: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}

/// Persistent, content-addressed store of cache entries.
///
/// Entries are keyed by file identity and embedding model. Writes are
/// all-or-nothing.
pub trait EmbeddingStore: Send {
    /// Initializes storage (creates schema, runs migrations). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Loads the entry built for `identity` with `model_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored vector is corrupt.
    fn load_entry(&self, identity: &FileIdentity, model_name: &str) -> Result<Option<CacheEntry>>;

    /// Saves an entry in one transaction, replacing any previous entry for
    /// the same identity and model.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing is stored in that case.
    fn save_entry(&mut self, entry: &CacheEntry) -> Result<()>;

    /// Deletes every entry for `identity`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete_entry(&mut self, identity: &FileIdentity) -> Result<usize>;

    /// Lists stored entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_entries(&self) -> Result<Vec<EntrySummary>>;

    /// Lists entries that [`EntrySummary::matches`] `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_entries(&self, query: &str) -> Result<Vec<EntrySummary>> {
        Ok(self
            .list_entries()?
            .into_iter()
            .filter(|e| e.matches(query))
            .collect())
    }

    /// Gets store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StoreStats>;

    /// Deletes all entries, keeping the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;
}
