//! Document chunk representation.
//!
//! A chunk is a contiguous span of a loaded document's text. Chunks are
//! produced once by the splitter, embedded, and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A contiguous text segment of a document.
///
/// # Examples
///
/// ```
/// use docqa_rs::core::Chunk;
///
/// let chunk = Chunk::new("Hello, world!".to_string(), 0..13, 0);
/// assert_eq!(chunk.len(), 13);
/// assert_eq!(chunk.start(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk content.
    pub content: String,

    /// Byte range in the loaded document text.
    pub byte_range: Range<usize>,

    /// Sequential index within the document (0-based).
    pub index: usize,

    /// Whether this chunk repeats trailing text of the previous chunk.
    #[serde(default)]
    pub has_overlap: bool,
}

impl Chunk {
    /// Creates a new chunk.
    #[must_use]
    pub const fn new(content: String, byte_range: Range<usize>, index: usize) -> Self {
        Self {
            content,
            byte_range,
            index,
            has_overlap: false,
        }
    }

    /// Marks this chunk as overlapping the previous one.
    #[must_use]
    pub const fn with_overlap(mut self, has_overlap: bool) -> Self {
        self.has_overlap = has_overlap;
        self
    }

    /// Returns the size of the chunk in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Checks if the chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Returns the start byte offset in the document.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.byte_range.start
    }

    /// Returns the end byte offset in the document.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.byte_range.end
    }

    /// Estimates token count using the ~4 characters per token heuristic.
    #[must_use]
    pub fn estimate_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }

    /// Returns a preview of the chunk content (first N bytes, char-aligned).
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let end = crate::io::find_char_boundary(&self.content, max_len);
            &self.content[..end]
        }
    }
}

/// Estimates the token count of a piece of text (~4 chars per token).
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
