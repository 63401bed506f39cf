//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::{Chunk, Turn};
use crate::error::Error;
use crate::storage::{EntrySummary, StoreStats};
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Result of indexing one file.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    /// File name.
    pub file: String,
    /// `name@hash` identity.
    pub identity: String,
    /// Number of chunks.
    pub chunks: usize,
    /// `built`, `store` or `session`.
    pub source: &'static str,
}

/// Result of one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerReport<'a> {
    /// `name@hash` identity of the document.
    pub file: String,
    /// Question as asked.
    pub question: &'a str,
    /// Full answer text.
    pub answer: &'a str,
    /// Chat model name.
    pub model: &'a str,
    /// Where the retriever came from.
    pub source: &'static str,
}

/// Formats the cached entry list.
#[must_use]
pub fn format_entry_list(entries: &[EntrySummary], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_entry_list_text(entries),
        OutputFormat::Json => format_json(&entries),
    }
}

fn format_entry_list_text(entries: &[EntrySummary]) -> String {
    if entries.is_empty() {
        return "No cached files.\n".to_string();
    }

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<30} {:<14} {:<8} {:<10} Model",
        "File", "Hash", "Chunks", "Size"
    );
    output.push_str(&"-".repeat(80));
    output.push('\n');

    for entry in entries {
        let _ = writeln!(
            output,
            "{:<30} {:<14} {:<8} {:<10} {}",
            truncate(&entry.identity.name, 30),
            entry.identity.short_hash(),
            entry.chunk_count,
            format_size(entry.text_bytes),
            entry.model_name
        );
    }

    output
}

/// Formats one cached entry, optionally with its chunks.
#[must_use]
pub fn format_entry(entry: &EntrySummary, chunks: Option<&[Chunk]>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_entry_text(entry, chunks),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct EntryWithChunks<'a> {
                entry: &'a EntrySummary,
                chunks: Option<&'a [Chunk]>,
            }
            format_json(&EntryWithChunks { entry, chunks })
        }
    }
}

fn format_entry_text(entry: &EntrySummary, chunks: Option<&[Chunk]>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "File: {}", entry.identity.name);
    let _ = writeln!(output, "  Hash:        {}", entry.identity.content_hash);
    let _ = writeln!(output, "  Model:       {}", entry.model_name);
    let _ = writeln!(output, "  Dimensions:  {}", entry.dimensions);
    let _ = writeln!(output, "  Chunks:      {}", entry.chunk_count);
    let _ = writeln!(output, "  Text size:   {}", format_size(entry.text_bytes));
    let _ = writeln!(output, "  Created:     {}", entry.created_at);

    if let Some(chunks) = chunks {
        output.push('\n');
        let _ = writeln!(
            output,
            "{:<6} {:<10} {:<10} {:<8} Preview",
            "Index", "Start", "End", "Tokens"
        );
        output.push_str(&"-".repeat(70));
        output.push('\n');

        for chunk in chunks {
            let _ = writeln!(
                output,
                "{:<6} {:<10} {:<10} {:<8} {}",
                chunk.index,
                chunk.start(),
                chunk.end(),
                chunk.estimate_tokens(),
                truncate(&chunk.content.replace('\n', "\\n"), 40)
            );
        }
    }

    output
}

/// Formats store statistics.
#[must_use]
pub fn format_stats(stats: &StoreStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str("Cache Status\n");
            output.push_str("============\n\n");
            let _ = writeln!(output, "  Files:         {}", stats.entry_count);
            let _ = writeln!(output, "  Chunks:        {}", stats.chunk_count);
            let _ = writeln!(
                output,
                "  Text size:     {}",
                format_size(stats.total_text_bytes)
            );
            let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
            if let Some(size) = stats.db_size {
                let _ = writeln!(output, "  DB size:       {size} bytes");
            }
            output
        }
        OutputFormat::Json => format_json(stats),
    }
}

/// Formats index results.
#[must_use]
pub fn format_index_reports(reports: &[IndexReport], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for r in reports {
                let verb = match r.source {
                    "built" => "indexed",
                    _ => "cached",
                };
                let _ = writeln!(output, "{verb} {} ({} chunks)", r.identity, r.chunks);
            }
            output
        }
        OutputFormat::Json => format_json(&reports),
    }
}

/// Formats a conversation transcript.
#[must_use]
pub fn format_history(turns: &[Turn], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if turns.is_empty() {
                return "(no messages)\n".to_string();
            }
            let mut output = String::new();
            for turn in turns {
                let _ = writeln!(output, "[{}] {}", turn.role, turn.text);
            }
            output
        }
        OutputFormat::Json => format_json(&turns),
    }
}

/// Formats an error for display.
///
/// Text output is the message alone; the caller adds the `Error:` prefix.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput<'a> {
                error: &'a str,
                kind: &'a str,
            }
            let message = error.to_string();
            serde_json::to_string(&ErrorOutput {
                error: &message,
                kind: error.kind(),
            })
            .unwrap_or_else(|_| "{\"error\":\"unknown\"}".to_string())
        }
    }
}

/// Formats a value as pretty JSON.
#[must_use]
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    json.push('\n');
    json
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Truncates a string to at most `max_len` bytes with an ellipsis, on a
/// character boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return s[..crate::io::find_char_boundary(s, max_len)].to_string();
    }
    let end = crate::io::find_char_boundary(s, max_len - 3);
    format!("{}...", &s[..end])
}
