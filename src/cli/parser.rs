//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docqa-rs: ask questions about a document.
///
/// Each file is split, embedded once, and cached by content. Answers come
/// from a chat-completion model and stream to the terminal.
#[derive(Parser, Debug)]
#[command(name = "docqa-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the embedding cache database.
    ///
    /// Defaults to `cache.db_path` from the config (`.docqa/cache.db`).
    #[arg(short, long, env = "DOCQA_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to the config file.
    #[arg(short, long, env = "DOCQA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// OpenAI API key (overrides `OPENAI_API_KEY` and secrets files).
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Embedding provider override (openai, fallback, fastembed).
    #[arg(long, global = true)]
    pub embedding: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question about a file.
    Ask {
        /// Document (.txt, .md, .pdf, .docx).
        file: PathBuf,

        /// The question.
        question: String,
    },

    /// Chat about a file; each line on stdin is a question.
    ///
    /// `/reset` clears the conversation, `/history` prints it, `/quit`
    /// exits.
    Chat {
        /// Document (.txt, .md, .pdf, .docx).
        file: PathBuf,
    },

    /// Embed files into the cache without asking anything.
    Index {
        /// Documents to index.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Inspect or manage the embedding cache.
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Manage the stored API key.
    #[command(subcommand)]
    Key(KeyCommands),
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// List cached files.
    #[command(alias = "ls")]
    List,

    /// Show a cached file.
    Show {
        /// File name, `name@hash`, or hash prefix.
        entry: String,

        /// Show chunks as well.
        #[arg(long)]
        chunks: bool,
    },

    /// Remove a cached file.
    #[command(alias = "rm")]
    Remove {
        /// File name, `name@hash`, or hash prefix.
        entry: String,
    },

    /// Show cache statistics.
    Stats,

    /// Delete every cached file.
    Clear {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Save an API key to the secrets file.
    Set {
        /// The API key.
        key: String,

        /// Write the per-user secrets file instead of `.docqa/secrets.toml`.
        #[arg(long)]
        user: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["docqa-rs", "ask", "notes.md", "what?", "--format", "json"])
            .unwrap();
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Ask { file, question } => {
                assert_eq!(file, PathBuf::from("notes.md"));
                assert_eq!(question, "what?");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_cache_clear() {
        let cli = Cli::try_parse_from(["docqa-rs", "cache", "clear", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheCommands::Clear { yes: true })
        ));
    }

    #[test]
    fn test_index_requires_files() {
        assert!(Cli::try_parse_from(["docqa-rs", "index"]).is_err());
    }
}
