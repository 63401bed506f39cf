//! Integration tests for docqa-rs.

#![allow(clippy::expect_used)]

use docqa_rs::cache::{CacheOutcome, ContentCache};
use docqa_rs::chunking::{Chunker, SeparatorChunker, SizeUnit};
use docqa_rs::core::{FileIdentity, Role};
use docqa_rs::embedding::{Embedder, FallbackEmbedder};
use docqa_rs::error::{BuildError, Error, InvocationError, Result};
use docqa_rs::llm::{ChatModel, PromptMessage, TokenStream};
use docqa_rs::memory::ConversationMemory;
use docqa_rs::pipeline::RetrievalPipeline;
use docqa_rs::session::Session;
use docqa_rs::storage::{EmbeddingStore, SqliteStore};
use docqa_rs::streaming::{BufferSurface, SurfaceEvent};
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const POLICY: &[u8] = b"Refunds are accepted within thirty days.\nShipping takes one week.";

/// Embedder that counts `embed` calls.
struct CountingEmbedder {
    inner: FallbackEmbedder,
    calls: Arc<AtomicUsize>,
}

impl Embedder for CountingEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }
}

/// Chat model that answers with fixed tokens and can fail or stall on a
/// chosen invocation.
struct ScriptedModel {
    tokens: Vec<&'static str>,
    invocations: Rc<Cell<usize>>,
    fail_on: Option<usize>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    fn new(tokens: &[&'static str]) -> (Self, Rc<Cell<usize>>) {
        let invocations = Rc::new(Cell::new(0));
        let model = Self {
            tokens: tokens.to_vec(),
            invocations: Rc::clone(&invocations),
            fail_on: None,
            delay: None,
        };
        (model, invocations)
    }
}

impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn stream<'a>(
        &'a self,
        _messages: &[PromptMessage],
        _timeout: Duration,
    ) -> Result<TokenStream<'a>> {
        let n = self.invocations.get() + 1;
        self.invocations.set(n);
        let fail = self.fail_on == Some(n);
        let delay = self.delay;

        let tokens = self.tokens.iter().enumerate().map(move |(i, t)| -> Result<String> {
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            if fail && i == 1 {
                return Err(InvocationError::StreamInterrupted("connection reset".to_string()).into());
            }
            Ok((*t).to_string())
        });
        Ok(Box::new(tokens))
    }
}

fn counting_embedder() -> (Arc<dyn Embedder>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let embedder = CountingEmbedder {
        inner: FallbackEmbedder::new(32),
        calls: Arc::clone(&calls),
    };
    (Arc::new(embedder), calls)
}

fn line_chunker() -> Box<dyn Chunker> {
    Box::new(SeparatorChunker::new(45, 0).unit(SizeUnit::Chars))
}

fn open_store(path: &Path) -> SqliteStore {
    let mut store = SqliteStore::open(path).expect("open store");
    store.init().expect("init store");
    store
}

fn session_with(model: ScriptedModel, embedder: Arc<dyn Embedder>) -> Session {
    let cache = ContentCache::new(embedder, line_chunker(), 4);
    Session::new(
        cache,
        RetrievalPipeline::new(Box::new(model)),
        ConversationMemory::new(),
    )
}

#[test]
fn test_two_questions_embed_once() {
    let (embedder, calls) = counting_embedder();
    let (model, invocations) = ScriptedModel::new(&["Thirty", " days."]);
    let mut session = session_with(model, embedder);

    let retriever = session.upload("policy.txt", POLICY).expect("upload");
    assert_eq!(retriever.len(), 2);
    let after_upload = calls.load(Ordering::SeqCst);
    assert_eq!(after_upload, 2);

    let mut surface = BufferSurface::new();
    session.ask("How long for refunds?", &mut surface).expect("first");
    session.upload("policy.txt", POLICY).expect("re-upload");
    session.ask("And shipping?", &mut surface).expect("second");

    // one query embedding per question, no chunk re-embedding
    assert_eq!(calls.load(Ordering::SeqCst), after_upload + 2);
    assert_eq!(invocations.get(), 2);
    assert_eq!(session.cache().build_count(), 1);
    assert_eq!(session.cache().last_outcome(), Some(CacheOutcome::SessionHit));

    let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
    assert_eq!(roles, [Role::Human, Role::Ai, Role::Human, Role::Ai]);
    assert_eq!(session.history()[3].text, "Thirty days.");
}

#[test]
fn test_stream_failure_keeps_question_without_answer() {
    let (embedder, _) = counting_embedder();
    let (mut model, _) = ScriptedModel::new(&["Thirty", " days."]);
    model.fail_on = Some(2);
    let mut session = session_with(model, embedder);
    session.upload("policy.txt", POLICY).expect("upload");

    let mut surface = BufferSurface::new();
    session.ask("Refunds?", &mut surface).expect("first answer");
    let err = session.ask("Shipping?", &mut surface).unwrap_err();

    assert!(matches!(
        err,
        Error::Invocation(InvocationError::StreamInterrupted(_))
    ));
    let memory = session.memory();
    assert_eq!(memory.count(Role::Human), 2);
    assert_eq!(memory.count(Role::Ai), 1);
    assert_eq!(memory.last().map(|t| t.text.as_str()), Some("Shipping?"));
    assert!(matches!(
        surface.events().last(),
        Some(SurfaceEvent::Aborted(_))
    ));
}

#[test]
fn test_empty_document_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let (embedder, calls) = counting_embedder();
    let (model, invocations) = ScriptedModel::new(&["unused"]);
    let cache = ContentCache::new(embedder, line_chunker(), 4)
        .with_store(Box::new(open_store(&dir.path().join("cache.db"))));
    let mut session = Session::new(
        cache,
        RetrievalPipeline::new(Box::new(model)),
        ConversationMemory::new(),
    );

    session.upload("policy.txt", POLICY).expect("upload");
    let err = session.upload("blank.txt", b"   \n").unwrap_err();
    assert!(matches!(err, Error::Build(BuildError::EmptyDocument { .. })));
    assert!(session.current().is_none());

    let entries = session
        .cache()
        .store()
        .expect("store")
        .list_entries()
        .expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].identity.name, "policy.txt");

    let mut surface = BufferSurface::new();
    let before = calls.load(Ordering::SeqCst);
    let err = session.ask("Anything?", &mut surface).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), before);
    assert_eq!(invocations.get(), 0);
    assert!(session.history().is_empty());
}

#[test]
fn test_store_shared_across_sessions() {
    let dir = TempDir::new().expect("temp dir");
    let db = dir.path().join("cache.db");

    {
        let (embedder, _) = counting_embedder();
        let mut cache =
            ContentCache::new(embedder, line_chunker(), 4).with_store(Box::new(open_store(&db)));
        let id = FileIdentity::from_bytes("policy.txt", POLICY);
        cache.get_or_build(&id, POLICY).expect("build");
        assert_eq!(cache.build_count(), 1);
    }

    let (embedder, calls) = counting_embedder();
    let (model, _) = ScriptedModel::new(&["ok"]);
    let cache = ContentCache::new(embedder, line_chunker(), 4).with_store(Box::new(open_store(&db)));
    let mut session = Session::new(
        cache,
        RetrievalPipeline::new(Box::new(model)),
        ConversationMemory::new(),
    );

    let retriever = session.upload("policy.txt", POLICY).expect("upload");
    assert_eq!(retriever.len(), 2);
    assert_eq!(session.cache().build_count(), 0);
    assert_eq!(session.cache().last_outcome(), Some(CacheOutcome::StoreHit));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_same_content_different_name_builds_again() {
    let (embedder, _) = counting_embedder();
    let mut cache = ContentCache::new(embedder, line_chunker(), 4);

    let a = FileIdentity::from_bytes("a.txt", POLICY);
    let b = FileIdentity::from_bytes("b.txt", POLICY);
    cache.get_or_build(&a, POLICY).expect("a");
    cache.get_or_build(&b, POLICY).expect("b");

    assert_eq!(cache.build_count(), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_least_recently_used_retriever_is_evicted() {
    let (embedder, _) = counting_embedder();
    let mut cache = ContentCache::new(embedder, line_chunker(), 2);

    let docs: Vec<(FileIdentity, Vec<u8>)> = (0..3)
        .map(|i| {
            let bytes = format!("Document number {i} talks about topic {i}.").into_bytes();
            (FileIdentity::from_bytes(&format!("doc{i}.txt"), &bytes), bytes)
        })
        .collect();

    cache.get_or_build(&docs[0].0, &docs[0].1).expect("doc0");
    cache.get_or_build(&docs[1].0, &docs[1].1).expect("doc1");
    // touch doc0 so doc1 is the oldest
    cache.get_or_build(&docs[0].0, &docs[0].1).expect("doc0 again");
    cache.get_or_build(&docs[2].0, &docs[2].1).expect("doc2");

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&docs[0].0));
    assert!(!cache.contains(&docs[1].0));
    assert!(cache.contains(&docs[2].0));
    assert_eq!(cache.build_count(), 3);
}

#[test]
fn test_slow_generation_times_out() {
    let (embedder, _) = counting_embedder();
    let (mut model, _) = ScriptedModel::new(&["a", "b", "c", "d"]);
    model.delay = Some(Duration::from_millis(30));
    let cache = ContentCache::new(embedder, line_chunker(), 4);
    let mut session = Session::new(
        cache,
        RetrievalPipeline::new(Box::new(model)).with_timeout(Duration::from_millis(40)),
        ConversationMemory::new(),
    );
    session.upload("policy.txt", POLICY).expect("upload");

    let mut surface = BufferSurface::new();
    let err = session.ask("Refunds?", &mut surface).unwrap_err();

    assert!(matches!(
        err,
        Error::Invocation(InvocationError::TimedOut { .. })
    ));
    assert_eq!(session.memory().count(Role::Human), 1);
    assert_eq!(session.memory().count(Role::Ai), 0);
    assert!(matches!(
        surface.events().last(),
        Some(SurfaceEvent::Aborted(_))
    ));
}

#[test]
fn test_reset_forgets_conversation_and_documents() {
    let (embedder, _) = counting_embedder();
    let (model, _) = ScriptedModel::new(&["Thirty days."]);
    let mut session = session_with(model, embedder);
    session.upload("policy.txt", POLICY).expect("upload");
    session
        .ask("Refunds?", &mut BufferSurface::new())
        .expect("answer");

    session.reset();

    assert!(session.history().is_empty());
    assert!(session.current().is_none());
    assert!(session.cache().is_empty());
}

/// CLI command integration tests.
mod cli_tests {
    use docqa_rs::cli::commands::execute;
    use docqa_rs::cli::parser::{CacheCommands, Cli, Commands};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Helper to create a CLI struct using the offline embedder.
    fn make_cli(dir: &Path, format: &str, command: Commands) -> Cli {
        Cli {
            db_path: Some(dir.join("cache.db")),
            config: Some(dir.join("config.toml")),
            api_key: None,
            embedding: Some("fallback".to_string()),
            verbose: false,
            format: format.to_string(),
            command,
        }
    }

    fn write_doc(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).expect("write doc");
        path
    }

    #[test]
    fn test_cmd_index_then_cached() {
        let temp_dir = TempDir::new().expect("temp dir");
        let doc = write_doc(temp_dir.path(), "notes.md", "# Notes\n\nThe launch is on Friday.\n");

        let cli = make_cli(
            temp_dir.path(),
            "text",
            Commands::Index {
                files: vec![doc.clone()],
            },
        );
        let output = execute(&cli).expect("first index");
        assert!(output.starts_with("indexed notes.md@"));

        let output = execute(&cli).expect("second index");
        assert!(output.starts_with("cached notes.md@"));
    }

    #[test]
    fn test_cmd_cache_stats_json() {
        let temp_dir = TempDir::new().expect("temp dir");
        let doc = write_doc(temp_dir.path(), "a.txt", "alpha beta gamma");
        execute(&make_cli(
            temp_dir.path(),
            "text",
            Commands::Index { files: vec![doc] },
        ))
        .expect("index");

        let cli = make_cli(temp_dir.path(), "json", Commands::Cache(CacheCommands::Stats));
        let output = execute(&cli).expect("stats");
        let json: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(json["entry_count"], 1);
    }

    #[test]
    fn test_cmd_index_missing_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let cli = make_cli(
            temp_dir.path(),
            "text",
            Commands::Index {
                files: vec![temp_dir.path().join("absent.txt")],
            },
        );
        assert!(execute(&cli).is_err());
    }
}

/// Binary-level tests.
mod binary_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn docqa(dir: &TempDir) -> Command {
        let mut cmd = Command::cargo_bin("docqa-rs").expect("binary");
        cmd.env_remove("OPENAI_API_KEY")
            .env_remove("DOCQA_LOG")
            .arg("--db-path")
            .arg(dir.path().join("cache.db"))
            .arg("--config")
            .arg(dir.path().join("config.toml"));
        cmd
    }

    #[test]
    fn test_help_lists_commands() {
        let dir = TempDir::new().expect("temp dir");
        docqa(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("ask"))
            .stdout(predicate::str::contains("chat"))
            .stdout(predicate::str::contains("cache"));
    }

    #[test]
    fn test_empty_cache_stats() {
        let dir = TempDir::new().expect("temp dir");
        docqa(&dir)
            .args(["cache", "stats"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Files:         0"));
    }

    #[test]
    fn test_index_with_offline_embedder() {
        let dir = TempDir::new().expect("temp dir");
        let doc = dir.path().join("faq.txt");
        std::fs::write(&doc, "Opening hours are nine to five.").expect("write");

        docqa(&dir)
            .args(["--embedding", "fallback", "index"])
            .arg(&doc)
            .assert()
            .success()
            .stdout(predicate::str::starts_with("indexed faq.txt@"));

        docqa(&dir)
            .args(["cache", "ls"])
            .assert()
            .success()
            .stdout(predicate::str::contains("faq.txt"));
    }

    #[test]
    fn test_clear_without_yes_fails() {
        let dir = TempDir::new().expect("temp dir");
        docqa(&dir)
            .args(["cache", "clear"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn test_json_error_on_stdout() {
        let dir = TempDir::new().expect("temp dir");
        docqa(&dir)
            .args(["--format", "json", "cache", "show", "nothing"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"kind\""));
    }
}
