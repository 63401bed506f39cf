//! Per-file retriever cache.
//!
//! Uploading the same bytes twice must not re-embed them. Lookups go through
//! two levels:
//!
//! 1. the session map, an LRU of built retrievers keyed by [`FileIdentity`]
//! 2. the optional persistent [`EmbeddingStore`], keyed by identity and
//!    embedding model
//!
//! Only when both miss is the document loaded, chunked and embedded. A
//! failed build leaves both levels untouched.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::chunking::Chunker;
use crate::core::FileIdentity;
use crate::embedding::Embedder;
use crate::error::{BuildError, Result};
use crate::loader::load_text;
use crate::retrieval::Retriever;
use crate::storage::{CacheEntry, EmbeddingStore};

/// Default number of retrievers kept per session.
pub const DEFAULT_CAPACITY: usize = 16;

/// Where a retriever came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Already built in this session.
    SessionHit,
    /// Rebuilt from the persistent store without embedding.
    StoreHit,
    /// Loaded, chunked and embedded.
    Built,
}

/// Retriever cache for one session.
pub struct ContentCache {
    retrievers: LruCache<FileIdentity, Arc<Retriever>>,
    embedder: Arc<dyn Embedder>,
    chunker: Box<dyn Chunker>,
    store: Option<Box<dyn EmbeddingStore>>,
    capacity: usize,
    builds: usize,
    last_outcome: Option<CacheOutcome>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("entries", &self.retrievers.len())
            .field("capacity", &self.capacity)
            .field("model", &self.embedder.model_name())
            .field("chunker", &self.chunker.name())
            .field("persistent", &self.store.is_some())
            .field("builds", &self.builds)
            .finish()
    }
}

fn new_lru(capacity: usize) -> LruCache<FileIdentity, Arc<Retriever>> {
    NonZeroUsize::new(capacity).map_or_else(LruCache::unbounded, LruCache::new)
}

impl ContentCache {
    /// Creates a session-only cache. A `capacity` of zero means unbounded.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, chunker: Box<dyn Chunker>, capacity: usize) -> Self {
        Self {
            retrievers: new_lru(capacity),
            embedder,
            chunker,
            store: None,
            capacity,
            builds: 0,
            last_outcome: None,
        }
    }

    /// Adds a persistent store consulted on session misses.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn EmbeddingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns the retriever for `identity`, building it from `bytes` on a
    /// miss.
    ///
    /// `bytes` are not read on a hit.
    ///
    /// # Errors
    ///
    /// - [`BuildError`] if the file type is unsupported, the content is
    ///   unreadable or empty, or embedding fails
    /// - [`crate::error::StorageError`] if the built entry cannot be
    ///   persisted
    ///
    /// Nothing is cached when an error is returned.
    pub fn get_or_build(&mut self, identity: &FileIdentity, bytes: &[u8]) -> Result<Arc<Retriever>> {
        if let Some(retriever) = self.retrievers.get(identity) {
            tracing::debug!(file = %identity, "session cache hit");
            self.last_outcome = Some(CacheOutcome::SessionHit);
            return Ok(Arc::clone(retriever));
        }

        if let Some(entry) = self.load_persisted(identity) {
            tracing::debug!(file = %identity, chunks = entry.chunks.len(), "store cache hit");
            self.last_outcome = Some(CacheOutcome::StoreHit);
            return Ok(self.insert(identity, entry));
        }

        tracing::debug!(file = %identity, "cache miss");
        let entry = self.build_entry(identity, bytes)?;
        if let Some(store) = self.store.as_mut() {
            store.save_entry(&entry)?;
        }
        self.builds += 1;
        self.last_outcome = Some(CacheOutcome::Built);
        tracing::info!(
            file = %identity,
            chunks = entry.chunks.len(),
            model = %entry.model_name,
            "document indexed"
        );
        Ok(self.insert(identity, entry))
    }

    fn load_persisted(&self, identity: &FileIdentity) -> Option<CacheEntry> {
        let store = self.store.as_ref()?;
        match store.load_entry(identity, self.embedder.model_name()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(file = %identity, error = %e, "stored entry unusable, rebuilding");
                None
            }
        }
    }

    fn build_entry(&self, identity: &FileIdentity, bytes: &[u8]) -> Result<CacheEntry> {
        let text = load_text(&identity.name, bytes)?;
        let chunks = self.chunker.chunk(&text)?;
        if chunks.is_empty() {
            return Err(BuildError::EmptyDocument {
                name: identity.name.clone(),
            }
            .into());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        CacheEntry::new(
            identity.clone(),
            self.embedder.model_name(),
            self.embedder.dimensions(),
            chunks,
            embeddings,
        )
        .map_err(|e| BuildError::Embedding(e.to_string()).into())
    }

    fn insert(&mut self, identity: &FileIdentity, entry: CacheEntry) -> Arc<Retriever> {
        let retriever = Arc::new(Retriever::new(entry, Arc::clone(&self.embedder)));
        if let Some((evicted, _)) = self.retrievers.push(identity.clone(), Arc::clone(&retriever))
            && &evicted != identity
        {
            tracing::debug!(file = %evicted, "evicted from session cache");
        }
        retriever
    }

    /// Whether `identity` is built in this session. Does not touch recency.
    #[must_use]
    pub fn contains(&self, identity: &FileIdentity) -> bool {
        self.retrievers.contains(identity)
    }

    /// Number of retrievers held in the session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.retrievers.len()
    }

    /// Whether the session holds no retrievers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retrievers.is_empty()
    }

    /// Session capacity; zero means unbounded.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops `identity` from the session. The persisted entry is kept.
    pub fn evict(&mut self, identity: &FileIdentity) -> bool {
        self.retrievers.pop(identity).is_some()
    }

    /// Drops every session retriever. Persisted entries are kept.
    pub fn clear(&mut self) {
        self.retrievers.clear();
        self.last_outcome = None;
    }

    /// Number of fresh builds (load, chunk, embed) performed.
    #[must_use]
    pub const fn build_count(&self) -> usize {
        self.builds
    }

    /// How the most recent successful lookup was served.
    #[must_use]
    pub const fn last_outcome(&self) -> Option<CacheOutcome> {
        self.last_outcome
    }

    /// Embedder used for builds and queries.
    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Persistent store, if configured.
    #[must_use]
    pub fn store(&self) -> Option<&dyn EmbeddingStore> {
        self.store.as_deref()
    }

    /// Mutable persistent store, if configured.
    pub fn store_mut(&mut self) -> Option<&mut (dyn EmbeddingStore + 'static)> {
        self.store.as_deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{SeparatorChunker, SizeUnit};
    use crate::embedding::FallbackEmbedder;
    use crate::error::Error;
    use crate::storage::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: FallbackEmbedder,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BuildError::Embedding("quota exceeded".to_string()).into());
            }
            self.inner.embed(text)
        }
    }

    fn counting(fail: bool) -> (Arc<dyn Embedder>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = CountingEmbedder {
            inner: FallbackEmbedder::new(16),
            calls: Arc::clone(&calls),
            fail,
        };
        (Arc::new(embedder), calls)
    }

    fn chunker() -> Box<dyn Chunker> {
        Box::new(SeparatorChunker::new(20, 0).unit(SizeUnit::Chars))
    }

    const DOC: &[u8] = b"Refunds are accepted within thirty days.\nShipping takes one week.";

    #[test]
    fn test_second_lookup_does_not_embed() {
        let (embedder, calls) = counting(false);
        let mut cache = ContentCache::new(embedder, chunker(), DEFAULT_CAPACITY);
        let id = FileIdentity::from_bytes("policy.txt", DOC);

        let first = cache.get_or_build(&id, DOC).unwrap();
        let embedded = calls.load(Ordering::SeqCst);
        assert!(embedded >= 2);
        assert_eq!(cache.last_outcome(), Some(CacheOutcome::Built));

        let second = cache.get_or_build(&id, b"").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), embedded);
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.last_outcome(), Some(CacheOutcome::SessionHit));
    }

    #[test]
    fn test_store_hit_skips_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cache.db");
        let id = FileIdentity::from_bytes("policy.txt", DOC);

        {
            let (embedder, _) = counting(false);
            let mut store = SqliteStore::open(&db).unwrap();
            store.init().unwrap();
            let mut cache = ContentCache::new(embedder, chunker(), 4).with_store(Box::new(store));
            cache.get_or_build(&id, DOC).unwrap();
            assert_eq!(cache.build_count(), 1);
        }

        let (embedder, calls) = counting(false);
        let mut store = SqliteStore::open(&db).unwrap();
        store.init().unwrap();
        let mut cache = ContentCache::new(embedder, chunker(), 4).with_store(Box::new(store));
        let retriever = cache.get_or_build(&id, DOC).unwrap();

        assert_eq!(cache.build_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.last_outcome(), Some(CacheOutcome::StoreHit));
        assert!(retriever.len() >= 2);
    }

    #[test]
    fn test_empty_document_caches_nothing() {
        let (embedder, calls) = counting(false);
        let mut store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        let mut cache = ContentCache::new(embedder, chunker(), 4).with_store(Box::new(store));
        let id = FileIdentity::from_bytes("blank.txt", b"  \n\n ");

        let err = cache.get_or_build(&id, b"  \n\n ").unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::EmptyDocument { .. })));
        assert!(!cache.contains(&id));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.store().unwrap().list_entries().unwrap().len(), 0);
    }

    #[test]
    fn test_unsupported_type() {
        let (embedder, _) = counting(false);
        let mut cache = ContentCache::new(embedder, chunker(), 4);
        let id = FileIdentity::from_bytes("image.png", b"\x89PNG");
        let err = cache.get_or_build(&id, b"\x89PNG").unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::UnsupportedFileType { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_embedding_failure_persists_nothing() {
        let (embedder, _) = counting(true);
        let mut store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        let mut cache = ContentCache::new(embedder, chunker(), 4).with_store(Box::new(store));
        let id = FileIdentity::from_bytes("policy.txt", DOC);

        let err = cache.get_or_build(&id, DOC).unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::Embedding(_))));
        assert!(!cache.contains(&id));
        assert_eq!(cache.build_count(), 0);
        assert!(cache.store().unwrap().list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        let (embedder, _) = counting(false);
        let mut cache = ContentCache::new(embedder, chunker(), 2);
        let a = FileIdentity::from_bytes("a.txt", b"alpha");
        let b = FileIdentity::from_bytes("b.txt", b"bravo");
        let c = FileIdentity::from_bytes("c.txt", b"charlie");

        cache.get_or_build(&a, b"alpha").unwrap();
        cache.get_or_build(&b, b"bravo").unwrap();
        cache.get_or_build(&a, b"alpha").unwrap();
        cache.get_or_build(&c, b"charlie").unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let (embedder, _) = counting(false);
        let mut cache = ContentCache::new(embedder, chunker(), 0);
        for i in 0..40 {
            let body = format!("document number {i}");
            let id = FileIdentity::from_bytes(&format!("{i}.txt"), body.as_bytes());
            cache.get_or_build(&id, body.as_bytes()).unwrap();
        }
        assert_eq!(cache.len(), 40);
    }

    #[test]
    fn test_evict_and_clear_keep_store() {
        let (embedder, calls) = counting(false);
        let mut store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        let mut cache = ContentCache::new(embedder, chunker(), 4).with_store(Box::new(store));
        let id = FileIdentity::from_bytes("policy.txt", DOC);

        cache.get_or_build(&id, DOC).unwrap();
        let embedded = calls.load(Ordering::SeqCst);
        assert!(cache.evict(&id));
        assert!(!cache.evict(&id));

        cache.get_or_build(&id, DOC).unwrap();
        assert_eq!(cache.last_outcome(), Some(CacheOutcome::StoreHit));
        cache.clear();
        assert!(cache.is_empty());
        cache.get_or_build(&id, DOC).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), embedded);
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn test_same_name_different_content_rebuilds() {
        let (embedder, _) = counting(false);
        let mut cache = ContentCache::new(embedder, chunker(), 4);
        let v1 = FileIdentity::from_bytes("notes.txt", b"version one");
        let v2 = FileIdentity::from_bytes("notes.txt", b"version two");

        cache.get_or_build(&v1, b"version one").unwrap();
        cache.get_or_build(&v2, b"version two").unwrap();
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.len(), 2);
    }
}
