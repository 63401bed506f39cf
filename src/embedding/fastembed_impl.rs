//! `FastEmbed`-based local embedder.
//!
//! Runs all-MiniLM-L6-v2 through fastembed-rs. Only available when the
//! `fastembed-embeddings` feature is enabled.

use crate::Result;
use crate::embedding::{DEFAULT_DIMENSIONS, Embedder};
use crate::error::BuildError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, OnceLock};

/// Process-wide model, loaded on first use.
static EMBEDDING_MODEL: OnceLock<Mutex<fastembed::TextEmbedding>> = OnceLock::new();

/// `FastEmbed` embedder using all-MiniLM-L6-v2.
///
/// ```ignore
/// use docqa_rs::embedding::{Embedder, FastEmbedEmbedder};
///
/// let embedder = FastEmbedEmbedder::new()?;
/// assert_eq!(embedder.embed("Hello, world!")?.len(), 384);
/// ```
#[derive(Debug)]
pub struct FastEmbedEmbedder {
    model_name: &'static str,
}

impl FastEmbedEmbedder {
    /// Creates a new `FastEmbed` embedder. The model loads lazily.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible so model checks can move here.
    #[allow(clippy::missing_const_for_fn, clippy::unnecessary_wraps)]
    pub fn new() -> Result<Self> {
        Ok(Self {
            model_name: "all-MiniLM-L6-v2",
        })
    }

    fn get_model() -> Result<&'static Mutex<fastembed::TextEmbedding>> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| BuildError::Embedding(format!("failed to load embedding model: {e}")))?;

        let _ = EMBEDDING_MODEL.set(Mutex::new(model));

        EMBEDDING_MODEL
            .get()
            .ok_or_else(|| BuildError::Embedding("embedding model unavailable".to_string()).into())
    }

    fn run(texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.is_empty()) {
            return Err(BuildError::Embedding("cannot embed empty text".to_string()).into());
        }

        let model = Self::get_model()?;
        let mut model = model
            .lock()
            .map_err(|e| BuildError::Embedding(format!("embedding model lock poisoned: {e}")))?;

        // ONNX runtime can panic on malformed inputs
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(texts, None)));

        result
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                BuildError::Embedding(format!("ONNX runtime panic: {panic_msg}"))
            })?
            .map_err(|e| BuildError::Embedding(e.to_string()).into())
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        self.model_name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Self::run(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| BuildError::Embedding("no embedding returned".to_string()).into())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Self::run(texts)
    }
}
