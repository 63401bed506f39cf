//! CLI layer for docqa-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, chatting, and managing the embedding cache.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
