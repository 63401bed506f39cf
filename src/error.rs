//! Error types for docqa operations.
//!
//! This module provides the error hierarchy using `thiserror`. The three
//! user-facing families are [`BuildError`] (a document could not be turned
//! into a retriever), [`InvocationError`] (the chat model call failed) and
//! [`ConfigError`] (settings or credentials are missing). Storage and I/O
//! errors cover the local cache and file access.

use thiserror::Error;

/// Result type alias for docqa operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Document could not be loaded, chunked or embedded.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Chat model invocation failed.
    #[error("invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// Configuration or credential error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },
}

impl Error {
    /// Short machine-readable kind, used by JSON error output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::Invocation(_) => "invocation",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Io(_) => "io",
            Self::InvalidState { .. } => "invalid_state",
        }
    }
}

/// Errors raised while turning an uploaded file into a retriever.
#[derive(Error, Debug)]
pub enum BuildError {
    /// File extension is not one of the supported document types.
    #[error("unsupported file type: {name} (expected .txt, .md, .pdf or .docx)")]
    UnsupportedFileType {
        /// File name as uploaded.
        name: String,
    },

    /// Content could not be decoded or extracted.
    #[error("unreadable content in {name}: {reason}")]
    Unreadable {
        /// File name as uploaded.
        name: String,
        /// Reason the content could not be read.
        reason: String,
    },

    /// Document contains no text to index.
    #[error("document is empty: {name}")]
    EmptyDocument {
        /// File name as uploaded.
        name: String,
    },

    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidChunking {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },

    /// Embedding provider failed.
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Errors raised by a chat model call.
#[derive(Error, Debug)]
pub enum InvocationError {
    /// Provider could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Credential rejected by the provider.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider refused the request because of rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Token stream broke off before the end-of-stream signal.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Generation exceeded the configured time budget.
    #[error("generation timed out after {secs}s")]
    TimedOut {
        /// Configured budget in seconds.
        secs: u64,
    },

    /// Provider returned no choices at all.
    #[error("empty response from {model}")]
    EmptyResponse {
        /// Model that was invoked.
        model: String,
    },

    /// Any other provider-side failure.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Configuration and credential errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No API credential could be resolved.
    #[error("missing API key. Pass --api-key, set OPENAI_API_KEY, or run: docqa-rs key set <KEY>")]
    MissingCredential,

    /// Config file exists but could not be read.
    #[error("failed to read config {path}: {reason}")]
    Unreadable {
        /// Path to the config file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Config file could not be parsed.
    #[error("invalid config {path}: {reason}")]
    Invalid {
        /// Path to the config file.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// A value is out of range or names an unknown option.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Dotted key, e.g. `embedding.provider`.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Requested provider was not compiled in.
    #[error("{provider} support is not enabled in this build (feature `{feature}`)")]
    FeatureDisabled {
        /// Provider name.
        provider: String,
        /// Cargo feature that enables it.
        feature: String,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Cache entry not found by identity or name.
    #[error("cache entry not found: {identifier}")]
    EntryNotFound {
        /// Identity or file name that was not found.
        identifier: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
