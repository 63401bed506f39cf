//! Fixed-size chunking strategy.
//!
//! Provides simple character-window chunking with configurable size and
//! overlap.

use crate::chunking::traits::{Chunker, SizeUnit, trim_span, validate_sizes};
use crate::chunking::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::core::Chunk;
use crate::error::Result;

/// Fixed-size chunker that splits text into character windows.
///
/// Sizes are given in [`SizeUnit`]s and converted to characters, so
/// multi-byte text gets the same window as ASCII. With `line_aware` enabled
/// a window ends after the last newline within its final tenth when one
/// exists. Chunks are trimmed, and windows holding only whitespace are
/// skipped.
///
/// # Examples
///
/// ```
/// use docqa_rs::chunking::{Chunker, FixedChunker, SizeUnit};
///
/// let chunker = FixedChunker::with_size_and_overlap(100, 0).unit(SizeUnit::Chars);
/// let text = "Hello, world! ".repeat(20);
/// let chunks = chunker.chunk(&text).unwrap();
/// for chunk in &chunks {
///     assert!(chunk.len() <= 100);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FixedChunker {
    chunk_size: usize,
    overlap: usize,
    unit: SizeUnit,
    line_aware: bool,
}

impl Default for FixedChunker {
    fn default() -> Self {
        Self::with_size_and_overlap(DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
    }
}

impl FixedChunker {
    /// Creates a fixed chunker with custom size and overlap.
    #[must_use]
    pub const fn with_size_and_overlap(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            unit: SizeUnit::Tokens,
            line_aware: true,
        }
    }

    /// Sets the measuring unit.
    #[must_use]
    pub const fn unit(mut self, unit: SizeUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Sets whether to align chunks to line boundaries.
    #[must_use]
    pub const fn line_aware(mut self, enabled: bool) -> Self {
        self.line_aware = enabled;
        self
    }

    /// Pulls `end` (a char index) back to just after a newline in the last
    /// tenth of the window.
    fn line_end(&self, text: &str, offsets: &[usize], start: usize, end: usize, window: usize) -> usize {
        if !self.line_aware {
            return end;
        }
        let floor = end.saturating_sub(window / 10).max(start + 1);
        (floor..end)
            .rev()
            .find(|&i| text.as_bytes()[offsets[i]] == b'\n')
            .map_or(end, |i| i + 1)
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        validate_sizes(self.chunk_size, self.overlap)?;

        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        let window = self.unit.to_chars(self.chunk_size);
        let overlap = self.unit.to_chars(self.overlap);

        // byte offset of every char, plus the end of the text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = offsets.len() - 1;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut start = 0;

        while start < char_count {
            let mut end = (start + window).min(char_count);
            if end < char_count {
                end = self.line_end(text, &offsets, start, end, window);
            }

            let span = trim_span(text, offsets[start]..offsets[end]);
            if !span.is_empty() {
                let index = chunks.len();
                chunks.push(
                    Chunk::new(text[span.clone()].to_string(), span, index)
                        .with_overlap(index > 0 && overlap > 0),
                );
            }

            if end >= char_count {
                break;
            }

            let next = end.saturating_sub(overlap);
            // Ensure we don't go backwards
            start = if next <= start { end } else { next };
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn description(&self) -> &'static str {
        "Fixed-size chunking with optional line boundary alignment"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(size: usize, overlap: usize) -> FixedChunker {
        FixedChunker::with_size_and_overlap(size, overlap)
            .unit(SizeUnit::Chars)
            .line_aware(false)
    }

    #[test]
    fn test_fixed_chunker_empty_text() {
        assert!(chars(100, 0).chunk("").unwrap().is_empty());
    }

    #[test]
    fn test_fixed_chunker_small_text() {
        let chunks = chars(100, 0).chunk("Hello, world!").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
    }

    #[test]
    fn test_fixed_chunker_multiple_chunks() {
        let chunks = chars(10, 0).chunk("0123456789ABCDEFGHIJ").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].byte_range, 0..10);
        assert_eq!(chunks[1].byte_range, 10..20);
    }

    #[test]
    fn test_fixed_chunker_with_overlap() {
        let chunks = chars(10, 3).chunk("0123456789ABCDEFGHIJ").unwrap();
        assert_eq!(chunks[1].byte_range.start, 7);
        assert!(chunks[1].has_overlap);
    }

    #[test]
    fn test_fixed_chunker_line_aware() {
        let chunker = FixedChunker::with_size_and_overlap(21, 0).unit(SizeUnit::Chars);
        let text = "0123456789012345678\nabcdefghij";
        let chunks = chunker.chunk(text).unwrap();
        assert_eq!(chunks[0].content, "0123456789012345678");
        assert_eq!(chunks[0].byte_range, 0..19);
        assert_eq!(chunks[1].content, "abcdefghij");
    }

    #[test]
    fn test_fixed_chunker_unicode() {
        let text = "Hello世界Test";
        let chunks = chars(5, 0).chunk(text).unwrap();
        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_fixed_chunker_skips_whitespace_windows() {
        let text = format!("abc{}def", " ".repeat(40));
        let chunks = chars(10, 0).chunk(&text).unwrap();

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["abc", "def"]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(&text[chunks[1].byte_range.clone()], "def");
    }

    #[test]
    fn test_fixed_chunker_counts_chars_not_bytes() {
        let text = "가".repeat(25);
        let chunks = chars(10, 2).chunk(&text).unwrap();

        let lengths: Vec<usize> = chunks.iter().map(|c| c.content.chars().count()).collect();
        assert_eq!(lengths, [10, 10, 9]);
        assert_eq!(chunks[1].byte_range.start, 8 * "가".len());
    }

    #[test]
    fn test_fixed_chunker_invalid_config() {
        assert!(chars(0, 0).chunk("test").is_err());
        assert!(chars(10, 10).chunk("test content here").is_err());
    }

    #[test]
    fn test_fixed_chunker_strategy_name() {
        assert_eq!(FixedChunker::default().name(), "fixed");
    }
}
