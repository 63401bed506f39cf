//! Chunking strategies.
//!
//! Splits loaded document text into segments small enough to embed:
//!
//! - **Separator**: newline-aligned pieces merged up to a target size with
//!   trailing overlap (the default)
//! - **Fixed**: byte windows with optional line alignment

pub mod fixed;
pub mod separator;
pub mod traits;

pub use fixed::FixedChunker;
pub use separator::SeparatorChunker;
pub use traits::{Chunker, SizeUnit};

/// Default target chunk size, in [`SizeUnit`]s.
pub const DEFAULT_CHUNK_SIZE: usize = 600;

/// Default overlap between consecutive chunks, in [`SizeUnit`]s.
pub const DEFAULT_OVERLAP: usize = 100;

/// Default preferred split point.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Creates a chunker by strategy name.
///
/// # Errors
///
/// Returns [`crate::error::ConfigError::InvalidValue`] for unknown strategies.
pub fn create_chunker(
    name: &str,
    chunk_size: usize,
    overlap: usize,
    separator: &str,
    unit: SizeUnit,
) -> crate::error::Result<Box<dyn Chunker>> {
    match name.to_lowercase().as_str() {
        "separator" => Ok(Box::new(
            SeparatorChunker::new(chunk_size, overlap)
                .separator(separator)
                .unit(unit),
        )),
        "fixed" => Ok(Box::new(
            FixedChunker::with_size_and_overlap(chunk_size, overlap).unit(unit),
        )),
        _ => Err(crate::error::ConfigError::InvalidValue {
            key: "chunking.strategy".to_string(),
            reason: format!("unknown strategy '{name}' (expected one of: separator, fixed)"),
        }
        .into()),
    }
}

/// Lists available chunking strategy names.
#[must_use]
pub fn available_strategies() -> Vec<&'static str> {
    vec!["separator", "fixed"]
}
