//! Persistent embedding store.
//!
//! Cache entries (chunks plus one vector per chunk) are kept in `SQLite` so
//! a file embedded in one process is not embedded again in the next.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStore;
pub use traits::{CacheEntry, EmbeddingStore, EntrySummary, StoreStats};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "cache.db";

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".docqa/cache.db";
