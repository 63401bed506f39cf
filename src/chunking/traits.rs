//! Chunker trait definition.
//!
//! Defines the interface for all chunking strategies, enabling
//! pluggable text segmentation approaches.

use crate::core::{Chunk, estimate_tokens};
use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Trait for chunking document text into embeddable segments.
///
/// Implementations must be `Send + Sync` and deterministic: the same input
/// always yields the same chunks.
///
/// # Examples
///
/// ```
/// use docqa_rs::chunking::{Chunker, SeparatorChunker, SizeUnit};
///
/// let chunker = SeparatorChunker::new(10, 0).unit(SizeUnit::Chars);
/// let chunks = chunker.chunk("line one\nline two\nline three").unwrap();
/// assert_eq!(chunks.len(), 3);
/// ```
pub trait Chunker: Send + Sync {
    /// Chunks the input text into segments with byte offsets.
    ///
    /// Empty or whitespace-only text yields no chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunker configuration is invalid.
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>>;

    /// Returns the name of the chunking strategy.
    fn name(&self) -> &'static str;

    /// Returns a description of the chunking strategy.
    fn description(&self) -> &'static str {
        "No description available"
    }
}

/// Unit in which chunk size and overlap are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Estimated model tokens (~4 characters per token).
    #[default]
    Tokens,
    /// Unicode scalar values.
    Chars,
}

impl SizeUnit {
    /// Measures `text` in this unit.
    #[must_use]
    pub fn measure(self, text: &str) -> usize {
        match self {
            Self::Tokens => estimate_tokens(text),
            Self::Chars => text.chars().count(),
        }
    }

    /// Approximate number of characters covered by `units`.
    #[must_use]
    pub const fn to_chars(self, units: usize) -> usize {
        match self {
            Self::Tokens => units.saturating_mul(4),
            Self::Chars => units,
        }
    }
}

/// Validates a size/overlap pair shared by every strategy.
pub(crate) fn validate_sizes(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(BuildError::InvalidChunking {
            reason: "chunk_size must be > 0".to_string(),
        }
        .into());
    }
    if overlap >= chunk_size {
        return Err(BuildError::OverlapTooLarge {
            overlap,
            size: chunk_size,
        }
        .into());
    }
    Ok(())
}

/// Shrinks a byte span so it neither starts nor ends with whitespace.
pub(crate) fn trim_span(text: &str, span: Range<usize>) -> Range<usize> {
    let slice = &text[span.clone()];
    let start = span.start + (slice.len() - slice.trim_start().len());
    let end = span.start + slice.trim_end().len();
    if start >= end { start..start } else { start..end }
}
