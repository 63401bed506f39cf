//! CLI command implementations.
//!
//! Contains the business logic for each CLI command. Each action is an
//! error boundary: failures are returned once to the caller and never
//! retried. Inside `chat`, a failed question is reported and the session
//! continues.

use crate::cache::{CacheOutcome, ContentCache};
use crate::cli::output::{
    AnswerReport, IndexReport, OutputFormat, format_entry, format_entry_list, format_error,
    format_history, format_index_reports, format_json, format_stats,
};
use crate::cli::parser::{CacheCommands, Cli, Commands, KeyCommands};
use crate::config::{self, Config};
use crate::core::FileIdentity;
use crate::embedding::{Embedder, EmbeddingProvider, create_embedder};
use crate::error::{ConfigError, Error, Result, StorageError};
use crate::llm::create_chat_model;
use crate::memory::ConversationMemory;
use crate::pipeline::{PromptTemplate, RetrievalPipeline};
use crate::session::Session;
use crate::storage::{EmbeddingStore, EntrySummary, SqliteStore};
use crate::streaming::{BufferSurface, TerminalSurface};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Executes the CLI command.
///
/// Returns the text to print on stdout. Streamed answers are written
/// directly and not included.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Ask { file, question } => cmd_ask(cli, &config, file, question, format),
        Commands::Chat { file } => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let stdout = io::stdout();
            let mut out = stdout.lock();
            cmd_chat(cli, &config, file, &mut input, &mut out, format)
        }
        Commands::Index { files } => cmd_index(cli, &config, files, format),
        Commands::Cache(cache_cmd) => {
            let db_path = db_path(cli, &config);
            match cache_cmd {
                CacheCommands::List => cmd_cache_list(&db_path, format),
                CacheCommands::Show { entry, chunks } => {
                    cmd_cache_show(&db_path, entry, *chunks, format)
                }
                CacheCommands::Remove { entry } => cmd_cache_remove(&db_path, entry, format),
                CacheCommands::Stats => cmd_cache_stats(&db_path, format),
                CacheCommands::Clear { yes } => cmd_cache_clear(&db_path, *yes, format),
            }
        }
        Commands::Key(KeyCommands::Set { key, user }) => cmd_key_set(key, *user, format),
    }
}

/// Loads the config and applies command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(provider) = &cli.embedding {
        config.embedding.provider = provider.parse::<EmbeddingProvider>()?;
    }
    Ok(config)
}

fn db_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.db_path
        .clone()
        .unwrap_or_else(|| config.cache.db_path.clone())
}

/// Opens the store and ensures its schema is current.
fn open_store(db_path: &Path) -> Result<SqliteStore> {
    let mut store = SqliteStore::open(db_path)?;
    store.init()?;
    Ok(store)
}

fn build_cache(cli: &Cli, config: &Config, api_key: Option<&str>) -> Result<ContentCache> {
    let embedder: Arc<dyn Embedder> =
        Arc::from(create_embedder(&config.embedder_settings(api_key))?);
    let cache = ContentCache::new(embedder, config.chunker()?, config.cache.capacity);
    if !config.cache.persist {
        return Ok(cache);
    }
    let store = open_store(&db_path(cli, config))?;
    Ok(cache.with_store(Box::new(store)))
}

fn build_session(cli: &Cli, config: &Config) -> Result<Session> {
    let api_key = config::resolve_api_key(cli.api_key.as_deref())?;
    let model = create_chat_model(&config.chat_settings(api_key.as_deref()))?;
    let pipeline = RetrievalPipeline::new(model)
        .with_top_k(config.retrieval.top_k)
        .with_timeout(config.generation_timeout())
        .with_template(PromptTemplate::load(config.model.system_prompt.as_deref()));
    let cache = build_cache(cli, config, api_key.as_deref())?;
    let memory = ConversationMemory::with_max_turns(config.memory.max_turns);
    Ok(Session::new(cache, pipeline, memory))
}

const fn outcome_name(outcome: Option<CacheOutcome>) -> &'static str {
    match outcome {
        Some(CacheOutcome::SessionHit) => "session",
        Some(CacheOutcome::StoreHit) => "store",
        Some(CacheOutcome::Built) | None => "built",
    }
}

fn cmd_ask(
    cli: &Cli,
    config: &Config,
    file: &Path,
    question: &str,
    format: OutputFormat,
) -> Result<String> {
    let mut session = build_session(cli, config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_ask(&mut session, file, question, &mut out, format)
}

/// Uploads `file` and answers one question.
///
/// Text answers stream to `out` and nothing is returned; JSON answers are
/// returned as an [`AnswerReport`].
pub fn run_ask(
    session: &mut Session,
    file: &Path,
    question: &str,
    out: &mut dyn Write,
    format: OutputFormat,
) -> Result<String> {
    let retriever = session.upload_path(file)?;
    let source = outcome_name(session.cache().last_outcome());

    match format {
        OutputFormat::Text => {
            let mut surface = TerminalSurface::new(out);
            session.ask(question, &mut surface)?;
            Ok(String::new())
        }
        OutputFormat::Json => {
            let mut surface = BufferSurface::new();
            let turn = session.ask(question, &mut surface)?;
            Ok(format_json(&AnswerReport {
                file: retriever.identity().to_string(),
                question: question.trim(),
                answer: &turn.text,
                model: session.pipeline().model_name(),
                source,
            }))
        }
    }
}

fn cmd_chat(
    cli: &Cli,
    config: &Config,
    file: &Path,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    format: OutputFormat,
) -> Result<String> {
    let mut session = build_session(cli, config)?;
    let stderr = io::stderr();
    let mut err = stderr.lock();
    run_chat(&mut session, file, input, out, &mut err, format)?;
    Ok(String::new())
}

/// Uploads `file`, then treats each line of `input` as a question.
///
/// Answers and transcript go to `out`. A failed question is reported (to
/// `err` in text mode, as a JSON error object on `out` otherwise) and the
/// loop continues. `/reset` clears the conversation but keeps the document.
///
/// # Errors
///
/// Returns an error if the upload fails or `input` cannot be read.
pub fn run_chat(
    session: &mut Session,
    file: &Path,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    err: &mut dyn Write,
    format: OutputFormat,
) -> Result<()> {
    let retriever = session.upload_path(file)?;
    let interactive = format == OutputFormat::Text;
    if interactive {
        let _ = writeln!(
            out,
            "Ready: {} ({} chunks). Ask away! /reset, /history, /quit",
            retriever.identity(),
            retriever.len()
        );
    }

    let mut line = String::new();
    loop {
        if interactive {
            let _ = write!(out, "> ");
            let _ = out.flush();
        }
        line.clear();
        if input.read_line(&mut line).map_err(Error::from)? == 0 {
            break;
        }

        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => {
                session.clear_history();
                if interactive {
                    let _ = writeln!(out, "Conversation cleared.");
                }
            }
            "/history" => {
                let _ = write!(out, "{}", format_history(session.history(), format));
            }
            question => ask_line(session, question, out, err, format),
        }
    }

    Ok(())
}

/// Answers one chat line. Failures are reported and the session continues.
fn ask_line(
    session: &mut Session,
    question: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
    format: OutputFormat,
) {
    let result = match format {
        OutputFormat::Text => {
            let mut surface = TerminalSurface::new(&mut *out);
            session.ask(question, &mut surface)
        }
        OutputFormat::Json => {
            let mut surface = BufferSurface::new();
            session.ask(question, &mut surface).map(|turn| {
                let _ = write!(out, "{}", format_json(&turn));
                turn
            })
        }
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "question failed");
        let _ = match format {
            OutputFormat::Text => writeln!(err, "Error: {}", format_error(&e, format)),
            OutputFormat::Json => writeln!(out, "{}", format_error(&e, format)),
        };
    }
}

fn cmd_index(cli: &Cli, config: &Config, files: &[PathBuf], format: OutputFormat) -> Result<String> {
    let api_key = if config.embedding.provider.needs_credential() {
        config::resolve_api_key(cli.api_key.as_deref())?
    } else {
        None
    };
    let mut cache = build_cache(cli, config, api_key.as_deref())?;

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let bytes = crate::io::read_bytes(path)?;
        let identity = FileIdentity::from_bytes(&name, &bytes);
        let retriever = cache.get_or_build(&identity, &bytes)?;
        reports.push(IndexReport {
            file: name,
            identity: identity.to_string(),
            chunks: retriever.len(),
            source: outcome_name(cache.last_outcome()),
        });
    }

    Ok(format_index_reports(&reports, format))
}

/// Resolves a cache query to exactly the matching entries.
fn resolve_entries(store: &SqliteStore, query: &str) -> Result<Vec<EntrySummary>> {
    let entries = store.find_entries(query)?;
    if entries.is_empty() {
        return Err(StorageError::EntryNotFound {
            identifier: query.to_string(),
        }
        .into());
    }
    Ok(entries)
}

fn cmd_cache_list(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    let entries = store.list_entries()?;
    Ok(format_entry_list(&entries, format))
}

fn cmd_cache_show(db_path: &Path, query: &str, chunks: bool, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    let entries = resolve_entries(&store, query)?;

    let mut output = String::new();
    for entry in &entries {
        let loaded = if chunks {
            store.load_entry(&entry.identity, &entry.model_name)?
        } else {
            None
        };
        output.push_str(&format_entry(
            entry,
            loaded.as_ref().map(|e| e.chunks.as_slice()),
            format,
        ));
    }
    Ok(output)
}

fn cmd_cache_remove(db_path: &Path, query: &str, format: OutputFormat) -> Result<String> {
    let mut store = open_store(db_path)?;
    let entries = resolve_entries(&store, query)?;

    let mut removed = 0;
    let mut seen: Vec<&FileIdentity> = Vec::new();
    for entry in &entries {
        if seen.contains(&&entry.identity) {
            continue;
        }
        removed += store.delete_entry(&entry.identity)?;
        seen.push(&entry.identity);
    }

    Ok(match format {
        OutputFormat::Text => {
            let noun = if removed == 1 { "entry" } else { "entries" };
            format!("Removed {removed} cached {noun}.\n")
        }
        OutputFormat::Json => format_json(&serde_json::json!({ "removed": removed })),
    })
}

fn cmd_cache_stats(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    Ok(format_stats(&store.stats()?, format))
}

fn cmd_cache_clear(db_path: &Path, yes: bool, format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(Error::InvalidState {
            message: "use --yes to confirm. This deletes every cached file.".to_string(),
        });
    }

    let mut store = open_store(db_path)?;
    store.reset()?;

    Ok(match format {
        OutputFormat::Text => "Cache cleared.\n".to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({ "cleared": true })),
    })
}

fn cmd_key_set(key: &str, user: bool, format: OutputFormat) -> Result<String> {
    let path = if user {
        config::user_secrets_path().ok_or_else(|| ConfigError::InvalidValue {
            key: "--user".to_string(),
            reason: "no per-user config directory on this platform".to_string(),
        })?
    } else {
        PathBuf::from(config::LOCAL_SECRETS_PATH)
    };
    config::save_api_key(&path, key)?;

    Ok(match format {
        OutputFormat::Text => format!("API key saved to {}\n", path.display()),
        OutputFormat::Json => format_json(&serde_json::json!({ "saved": path })),
    })
}
