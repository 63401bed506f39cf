//! File I/O utilities.
//!
//! Byte-oriented file reading with memory mapping for large uploads, plus
//! UTF-8 boundary helpers used by the chunkers.

pub mod reader;
pub mod unicode;

pub use reader::{FileReader, read_bytes, write_file};
pub use unicode::find_char_boundary;
