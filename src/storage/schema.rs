//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the embedding cache database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per (file identity, embedding model)
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    model_name TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    text_bytes INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (file_name, content_hash, model_name)
);

CREATE INDEX IF NOT EXISTS idx_entries_name ON entries(file_name);
CREATE INDEX IF NOT EXISTS idx_entries_hash ON entries(content_hash);

-- Ordered chunks with their vectors
CREATE TABLE IF NOT EXISTS entry_chunks (
    entry_id INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    byte_start INTEGER NOT NULL,
    byte_end INTEGER NOT NULL,
    has_overlap INTEGER NOT NULL DEFAULT 0,
    embedding BLOB NOT NULL,  -- f32 array, little-endian
    PRIMARY KEY (entry_id, chunk_index),
    FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// Migrations from older schema versions.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations, oldest first.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}
