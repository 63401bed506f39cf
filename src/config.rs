//! Application configuration and credential resolution.
//!
//! Settings come from a TOML file (default `.docqa/config.toml`). Every
//! field has a default and a missing file means all defaults:
//!
//! ```toml
//! [model]
//! name = "gpt-3.5-turbo"
//! temperature = 0.1
//! generation_timeout_secs = 120
//!
//! [embedding]
//! provider = "openai"   # openai | fallback | fastembed
//!
//! [chunking]
//! chunk_size = 600
//! overlap = 100
//!
//! [retrieval]
//! top_k = 4
//!
//! [memory]
//! max_turns = 100
//!
//! [cache]
//! db_path = ".docqa/cache.db"
//! capacity = 16
//! ```
//!
//! The API key is resolved separately, see [`resolve_api_key`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CAPACITY;
use crate::chunking::{
    Chunker, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, DEFAULT_SEPARATOR, SizeUnit,
    available_strategies, create_chunker,
};
use crate::embedding::{DEFAULT_BATCH_SIZE, EmbedderSettings, EmbeddingProvider};
use crate::error::{ConfigError, Result};
use crate::llm::{ChatSettings, DEFAULT_CHAT_MODEL, DEFAULT_GENERATION_TIMEOUT, DEFAULT_TEMPERATURE};
use crate::memory::DEFAULT_MAX_TURNS;
use crate::retrieval::DEFAULT_TOP_K;
use crate::storage::DEFAULT_DB_PATH;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DOCQA_CONFIG";

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".docqa/config.toml";

/// Environment variable and secrets-file key holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Project-local secrets file.
pub const LOCAL_SECRETS_PATH: &str = ".docqa/secrets.toml";

const USER_SECRETS_DIR: &str = "docqa";
const SECRETS_FILE: &str = "secrets.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Chat model settings.
    pub model: ModelConfig,
    /// Embedding provider settings.
    pub embedding: EmbeddingConfig,
    /// Chunking settings.
    pub chunking: ChunkingConfig,
    /// Retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Conversation memory settings.
    pub memory: MemoryConfig,
    /// Retriever cache settings.
    pub cache: CacheConfig,
}

/// `[model]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Chat-completion model.
    pub name: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Alternative API base URL.
    pub api_base: Option<String>,
    /// Generation budget in seconds.
    pub generation_timeout_secs: u64,
    /// File holding a custom system prompt with a `{context}` placeholder.
    pub system_prompt: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_base: None,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT.as_secs(),
            system_prompt: None,
        }
    }
}

/// `[embedding]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Provider name.
    pub provider: EmbeddingProvider,
    /// Model override for the hosted provider.
    pub model: Option<String>,
    /// Texts per embedding request.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// `[chunking]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingConfig {
    /// Strategy name (`separator` or `fixed`).
    pub strategy: String,
    /// Target chunk size in `unit`s.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in `unit`s.
    pub overlap: usize,
    /// Preferred split point.
    pub separator: String,
    /// Measuring unit.
    pub unit: SizeUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: "separator".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
            unit: SizeUnit::default(),
        }
    }
}

/// `[retrieval]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Chunks handed to the model per question.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// `[memory]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Turn cap; 0 keeps every turn.
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Persistent store location.
    pub db_path: PathBuf,
    /// Retrievers kept per session; 0 is unbounded.
    pub capacity: usize,
    /// Whether built entries are persisted at all.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            capacity: DEFAULT_CAPACITY,
            persist: true,
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

impl Config {
    /// Loads and validates the config at `path`. A missing file yields the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable, malformed, or holds
    /// an out-of-range value.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            crate::Error::Config(ConfigError::Invalid { reason, .. }) => ConfigError::Invalid {
                path: path.display().to_string(),
                reason,
            }
            .into(),
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Loads from `explicit`, else [`CONFIG_ENV`], else
    /// [`DEFAULT_CONFIG_PATH`].
    ///
    /// # Errors
    ///
    /// As [`Config::load`].
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit.map_or_else(
            || {
                std::env::var_os(CONFIG_ENV)
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
            },
            Path::to_path_buf,
        );
        Self::load(&path)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed TOML and
    /// [`ConfigError::InvalidValue`] for rejected values.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Invalid {
            path: "<inline>".to_string(),
            reason: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(invalid("model.name", "must not be empty").into());
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(invalid("model.temperature", "must be between 0.0 and 2.0").into());
        }
        if self.model.generation_timeout_secs == 0 {
            return Err(invalid("model.generation_timeout_secs", "must be > 0").into());
        }
        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be > 0").into());
        }
        if !available_strategies().contains(&self.chunking.strategy.to_lowercase().as_str()) {
            return Err(invalid(
                "chunking.strategy",
                format!(
                    "unknown strategy '{}' (expected one of: {})",
                    self.chunking.strategy,
                    available_strategies().join(", ")
                ),
            )
            .into());
        }
        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size", "must be > 0").into());
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.overlap",
                format!(
                    "{} must be less than chunk_size {}",
                    self.chunking.overlap, self.chunking.chunk_size
                ),
            )
            .into());
        }
        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k", "must be >= 1").into());
        }
        Ok(())
    }

    /// Generation budget.
    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.model.generation_timeout_secs)
    }

    /// Builds the configured chunker.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unknown strategy.
    pub fn chunker(&self) -> Result<Box<dyn Chunker>> {
        create_chunker(
            &self.chunking.strategy,
            self.chunking.chunk_size,
            self.chunking.overlap,
            &self.chunking.separator,
            self.chunking.unit,
        )
    }

    /// Embedder construction settings.
    #[must_use]
    pub fn embedder_settings<'a>(&'a self, api_key: Option<&'a str>) -> EmbedderSettings<'a> {
        EmbedderSettings {
            provider: self.embedding.provider,
            model: self.embedding.model.as_deref(),
            batch_size: self.embedding.batch_size,
            api_key,
            api_base: self.model.api_base.as_deref(),
        }
    }

    /// Chat model construction settings.
    #[must_use]
    pub fn chat_settings<'a>(&'a self, api_key: Option<&'a str>) -> ChatSettings<'a> {
        ChatSettings {
            model: &self.model.name,
            temperature: self.model.temperature,
            api_key,
            api_base: self.model.api_base.as_deref(),
        }
    }
}

/// Per-user secrets file, if the platform has a config directory.
#[must_use]
pub fn user_secrets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_SECRETS_DIR).join(SECRETS_FILE))
}

/// Secrets files consulted for the API key, in order.
#[must_use]
pub fn secrets_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_SECRETS_PATH)];
    paths.extend(user_secrets_path());
    paths
}

/// Reads the API key from a secrets file. A missing file yields `None`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn read_secret(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let table = read_table(path)?;
    Ok(table
        .get(API_KEY_VAR)
        .and_then(toml::Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string))
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(content.parse::<toml::Table>().map_err(|e| ConfigError::Invalid {
        path: path.display().to_string(),
        reason: e.message().to_string(),
    })?)
}

/// Resolves the API key: `flag`, then `OPENAI_API_KEY`, then the secrets
/// files from [`secrets_paths`].
///
/// # Errors
///
/// Returns [`ConfigError`] if a secrets file exists but is malformed.
pub fn resolve_api_key(flag: Option<&str>) -> Result<Option<String>> {
    resolve_api_key_from(flag, std::env::var(API_KEY_VAR).ok(), &secrets_paths())
}

fn resolve_api_key_from(
    flag: Option<&str>,
    env: Option<String>,
    paths: &[PathBuf],
) -> Result<Option<String>> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    if let Some(key) = flag.and_then(non_empty) {
        tracing::debug!("api key from command line");
        return Ok(Some(key));
    }
    if let Some(key) = env.as_deref().and_then(non_empty) {
        tracing::debug!("api key from environment");
        return Ok(Some(key));
    }
    for path in paths {
        if let Some(key) = read_secret(path)? {
            tracing::debug!(path = %path.display(), "api key from secrets file");
            return Ok(Some(key));
        }
    }
    Ok(None)
}

/// Stores `key` in the secrets file at `path`, keeping other entries.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for a blank key, or an I/O error if
/// the file cannot be written.
pub fn save_api_key(path: &Path, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid(API_KEY_VAR, "must not be empty").into());
    }

    let mut table = if path.exists() {
        read_table(path)?
    } else {
        toml::Table::new()
    };
    table.insert(API_KEY_VAR.to_string(), toml::Value::String(key.to_string()));

    let content = toml::to_string(&table).map_err(|e| invalid(API_KEY_VAR, e.to_string()))?;
    crate::io::write_file(path, &content)?;
    tracing::info!(path = %path.display(), "api key saved");
    Ok(())
}
