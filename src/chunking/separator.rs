//! Separator-based chunking strategy.
//!
//! Splits text at a separator (newline by default), then greedily merges
//! consecutive pieces into chunks of at most `chunk_size` units, carrying up
//! to `overlap` units of trailing pieces into the next chunk. Pieces that are
//! larger than a whole chunk on their own are cut at grapheme boundaries.

use crate::chunking::traits::{Chunker, SizeUnit, trim_span, validate_sizes};
use crate::chunking::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, DEFAULT_SEPARATOR};
use crate::core::Chunk;
use crate::error::Result;
use std::collections::VecDeque;
use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

/// Chunker that prefers separator boundaries.
///
/// Every chunk's content is an exact, whitespace-trimmed slice of the input:
/// `&text[chunk.byte_range.clone()] == chunk.content`.
///
/// # Examples
///
/// ```
/// use docqa_rs::chunking::{Chunker, SeparatorChunker, SizeUnit};
///
/// let chunker = SeparatorChunker::new(9, 4).unit(SizeUnit::Chars);
/// let text = "aaaa\nbbbb\ncccc";
/// let chunks = chunker.chunk(text).unwrap();
/// assert_eq!(chunks[0].content, "aaaa\nbbbb");
/// assert_eq!(chunks[1].content, "bbbb\ncccc");
/// ```
#[derive(Debug, Clone)]
pub struct SeparatorChunker {
    chunk_size: usize,
    overlap: usize,
    separator: String,
    unit: SizeUnit,
}

impl Default for SeparatorChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
    }
}

impl SeparatorChunker {
    /// Creates a newline-separated chunker measuring in estimated tokens.
    #[must_use]
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            separator: DEFAULT_SEPARATOR.to_string(),
            unit: SizeUnit::Tokens,
        }
    }

    /// Sets the separator. An empty separator disables separator splitting.
    #[must_use]
    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    /// Sets the measuring unit.
    #[must_use]
    pub const fn unit(mut self, unit: SizeUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Target chunk size in units.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap in units.
    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    fn measure_span(&self, text: &str, start: usize, end: usize) -> usize {
        self.unit.measure(&text[start..end])
    }

    /// Splits at the separator and drops blank pieces.
    fn split_pieces(&self, text: &str) -> Vec<Range<usize>> {
        let mut raw = Vec::new();
        if self.separator.is_empty() {
            raw.push(0..text.len());
        } else {
            let mut start = 0;
            for (idx, _) in text.match_indices(self.separator.as_str()) {
                raw.push(start..idx);
                start = idx + self.separator.len();
            }
            raw.push(start..text.len());
        }

        let mut pieces = Vec::with_capacity(raw.len());
        for span in raw {
            let span = trim_span(text, span);
            if span.is_empty() {
                continue;
            }
            if self.unit.measure(&text[span.clone()]) > self.chunk_size {
                pieces.extend(self.hard_split(text, span));
            } else {
                pieces.push(span);
            }
        }
        pieces
    }

    /// Cuts an oversized piece into windows that each fit in one chunk.
    fn hard_split(&self, text: &str, span: Range<usize>) -> Vec<Range<usize>> {
        let max_chars = self.unit.to_chars(self.chunk_size).max(1);
        let slice = &text[span.clone()];
        let mut out = Vec::new();
        let mut start = 0;
        let mut chars = 0;

        for (offset, grapheme) in slice.grapheme_indices(true) {
            let count = grapheme.chars().count();
            if chars > 0 && chars + count > max_chars {
                out.push(span.start + start..span.start + offset);
                start = offset;
                chars = 0;
            }
            chars += count;
        }
        if start < slice.len() {
            out.push(span.start + start..span.end);
        }

        out.into_iter()
            .map(|r| trim_span(text, r))
            .filter(|r| !r.is_empty())
            .collect()
    }
}

impl Chunker for SeparatorChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        validate_sizes(self.chunk_size, self.overlap)?;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut window: VecDeque<Range<usize>> = VecDeque::new();

        for piece in self.split_pieces(text) {
            if let Some(front) = window.front()
                && self.measure_span(text, front.start, piece.end) > self.chunk_size
            {
                push_window(text, &window, &mut chunks);

                // Keep only as much trailing context as the overlap allows.
                let window_end = window.back().map_or(piece.start, |r| r.end);
                while let Some(front) = window.front() {
                    let kept = self.measure_span(text, front.start, window_end);
                    if kept <= self.overlap
                        && self.measure_span(text, front.start, piece.end) <= self.chunk_size
                    {
                        break;
                    }
                    window.pop_front();
                }
            }
            window.push_back(piece);
        }

        if !window.is_empty() {
            push_window(text, &window, &mut chunks);
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "separator"
    }

    fn description(&self) -> &'static str {
        "Separator-aligned chunking with greedy merge and trailing overlap"
    }
}

/// Emits the current window as one chunk.
fn push_window(text: &str, window: &VecDeque<Range<usize>>, chunks: &mut Vec<Chunk>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let range = first.start..last.end;
    let has_overlap = chunks.last().is_some_and(|prev| prev.end() > range.start);
    let index = chunks.len();
    chunks.push(Chunk::new(text[range.clone()].to_string(), range, index).with_overlap(has_overlap));
}
