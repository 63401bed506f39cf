//! One user's question-answering session.
//!
//! A [`Session`] exclusively owns its conversation memory, its retriever
//! cache and the pipeline used to answer. Handlers take `&mut Session`, so
//! two sessions never share state except through the persistent store.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::ContentCache;
use crate::core::{FileIdentity, Turn};
use crate::error::{Error, IoError, Result};
use crate::memory::ConversationMemory;
use crate::pipeline::RetrievalPipeline;
use crate::retrieval::Retriever;
use crate::streaming::MessageSurface;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Memory, cache and pipeline for one conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    memory: ConversationMemory,
    cache: ContentCache,
    pipeline: RetrievalPipeline,
    current: Option<Arc<Retriever>>,
}

impl Session {
    /// Creates a session with no document uploaded.
    #[must_use]
    pub fn new(cache: ContentCache, pipeline: RetrievalPipeline, memory: ConversationMemory) -> Self {
        let n = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{n}", std::process::id());
        tracing::debug!(session = %id, model = pipeline.model_name(), "session created");
        Self {
            id,
            memory,
            cache,
            pipeline,
            current: None,
        }
    }

    /// Session identifier, unique within the process.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Makes `name` with content `bytes` the document questions are asked
    /// against.
    ///
    /// On failure no document is selected until the next successful upload.
    ///
    /// # Errors
    ///
    /// Returns the build error from [`ContentCache::get_or_build`].
    pub fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<Arc<Retriever>> {
        let identity = FileIdentity::from_bytes(name, bytes);
        match self.cache.get_or_build(&identity, bytes) {
            Ok(retriever) => {
                self.current = Some(Arc::clone(&retriever));
                Ok(retriever)
            }
            Err(e) => {
                self.current = None;
                tracing::warn!(session = %self.id, file = %identity, error = %e, "upload failed");
                Err(e)
            }
        }
    }

    /// Reads `path` and uploads it under its file name.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, otherwise as
    /// [`Session::upload`].
    pub fn upload_path(&mut self, path: &Path) -> Result<Arc<Retriever>> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| IoError::ReadFailed {
                path: path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?
            .to_string();
        let bytes = crate::io::read_bytes(path)?;
        self.upload(&name, &bytes)
    }

    /// Answers `question` against the uploaded document.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if no document is uploaded or the question
    ///   is blank
    /// - errors from [`RetrievalPipeline::answer`]
    pub fn ask(&mut self, question: &str, surface: &mut dyn MessageSurface) -> Result<Turn> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidState {
                message: "question is empty".to_string(),
            });
        }
        let retriever = self.current.as_ref().ok_or_else(|| Error::InvalidState {
            message: "no document uploaded".to_string(),
        })?;
        self.pipeline
            .answer(question, retriever, &mut self.memory, surface)
    }

    /// Forgets the conversation and the session's retrievers.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.cache.clear();
        self.current = None;
        tracing::debug!(session = %self.id, "session reset");
    }

    /// Conversation so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        self.memory.all()
    }

    /// Conversation memory.
    #[must_use]
    pub const fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Clears the conversation but keeps the current document.
    pub fn clear_history(&mut self) {
        self.memory.clear();
    }

    /// Retriever cache.
    #[must_use]
    pub const fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Mutable retriever cache.
    pub fn cache_mut(&mut self) -> &mut ContentCache {
        &mut self.cache
    }

    /// Document questions are currently asked against.
    #[must_use]
    pub fn current(&self) -> Option<&Arc<Retriever>> {
        self.current.as_ref()
    }

    /// Answering pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &RetrievalPipeline {
        &self.pipeline
    }
}
