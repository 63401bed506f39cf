//! `SQLite` embedding store.
//!
//! Persists cache entries with WAL journaling, foreign keys and schema
//! versioning. Each entry is written in a single transaction.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::core::{Chunk, FileIdentity};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
    get_migrations_from,
};
use crate::storage::traits::{CacheEntry, EmbeddingStore, EntrySummary, StoreStats};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

/// SQLite-based embedding store.
///
/// # Examples
///
/// ```no_run
/// use docqa_rs::storage::{EmbeddingStore, SqliteStore};
///
/// let mut store = SqliteStore::open(".docqa/cache.db").unwrap();
/// store.init().unwrap();
/// ```
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens or creates a database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        // journal_mode returns a row, so it goes through query_row
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn entry_id(&self, identity: &FileIdentity, model_name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM entries WHERE file_name = ? AND content_hash = ? AND model_name = ?",
                params![identity.name, identity.content_hash, model_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?)
    }
}

fn encode_vector(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    let expected = dimensions.checked_mul(4).ok_or_else(|| {
        StorageError::Serialization(format!("stored dimensions {dimensions} are out of range"))
    })?;
    if bytes.len() != expected {
        return Err(StorageError::Serialization(format!(
            "stored vector has {} bytes, expected {expected}",
            bytes.len()
        ))
        .into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

impl EmbeddingStore for SqliteStore {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            return Ok(());
        }

        match self.get_schema_version()? {
            Some(current) if current > CURRENT_SCHEMA_VERSION => {
                return Err(StorageError::Migration(format!(
                    "database schema v{current} is newer than supported v{CURRENT_SCHEMA_VERSION}"
                ))
                .into());
            }
            Some(current) if current < CURRENT_SCHEMA_VERSION => {
                for migration in get_migrations_from(current) {
                    self.conn
                        .execute_batch(migration.sql)
                        .map_err(|e| StorageError::Migration(e.to_string()))?;
                }
                self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn load_entry(&self, identity: &FileIdentity, model_name: &str) -> Result<Option<CacheEntry>> {
        let row: Option<(i64, i64, i64)> = self
            .conn
            .query_row(
                r"
                SELECT id, dimensions, created_at FROM entries
                WHERE file_name = ? AND content_hash = ? AND model_name = ?
            ",
                params![identity.name, identity.content_hash, model_name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(StorageError::from)?;

        let Some((entry_id, dimensions, created_at)) = row else {
            return Ok(None);
        };
        let dimensions = usize::try_from(dimensions).map_err(|_| {
            StorageError::Serialization(format!("stored dimensions {dimensions} are negative"))
        })?;

        let mut stmt = self
            .conn
            .prepare(
                r"
                SELECT chunk_index, content, byte_start, byte_end, has_overlap, embedding
                FROM entry_chunks WHERE entry_id = ? ORDER BY chunk_index
            ",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![entry_id], |row| {
                let index: i64 = row.get(0)?;
                let content: String = row.get(1)?;
                let start: i64 = row.get(2)?;
                let end: i64 = row.get(3)?;
                let has_overlap: i64 = row.get(4)?;
                let bytes: Vec<u8> = row.get(5)?;
                let chunk = Chunk::new(content, start as usize..end as usize, index as usize)
                    .with_overlap(has_overlap != 0);
                Ok((chunk, bytes))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        let mut chunks = Vec::with_capacity(rows.len());
        let mut embeddings = Vec::with_capacity(rows.len());
        for (chunk, bytes) in rows {
            embeddings.push(decode_vector(&bytes, dimensions)?);
            chunks.push(chunk);
        }

        let mut entry =
            CacheEntry::new(identity.clone(), model_name, dimensions, chunks, embeddings)?;
        entry.created_at = created_at;
        Ok(Some(entry))
    }

    fn save_entry(&mut self, entry: &CacheEntry) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;

        tx.execute(
            "DELETE FROM entries WHERE file_name = ? AND content_hash = ? AND model_name = ?",
            params![
                entry.identity.name,
                entry.identity.content_hash,
                entry.model_name
            ],
        )
        .map_err(StorageError::from)?;

        tx.execute(
            r"
            INSERT INTO entries (
                file_name, content_hash, model_name, dimensions,
                chunk_count, text_bytes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
            params![
                entry.identity.name,
                entry.identity.content_hash,
                entry.model_name,
                entry.dimensions as i64,
                entry.chunks.len() as i64,
                entry.text_bytes() as i64,
                entry.created_at,
            ],
        )
        .map_err(StorageError::from)?;
        let entry_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    r"
                INSERT INTO entry_chunks (
                    entry_id, chunk_index, content, byte_start, byte_end,
                    has_overlap, embedding
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
                )
                .map_err(StorageError::from)?;

            for (chunk, embedding) in entry.chunks.iter().zip(&entry.embeddings) {
                stmt.execute(params![
                    entry_id,
                    chunk.index as i64,
                    chunk.content,
                    chunk.byte_range.start as i64,
                    chunk.byte_range.end as i64,
                    i64::from(chunk.has_overlap),
                    encode_vector(embedding),
                ])
                .map_err(StorageError::from)?;
            }
        }

        tx.commit().map_err(StorageError::from)?;
        tracing::debug!(
            identity = %entry.identity,
            model = %entry.model_name,
            chunks = entry.chunks.len(),
            "stored cache entry"
        );
        Ok(())
    }

    fn delete_entry(&mut self, identity: &FileIdentity) -> Result<usize> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM entries WHERE file_name = ? AND content_hash = ?",
                params![identity.name, identity.content_hash],
            )
            .map_err(StorageError::from)?;
        Ok(removed)
    }

    fn list_entries(&self) -> Result<Vec<EntrySummary>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
                SELECT file_name, content_hash, model_name, dimensions,
                       chunk_count, text_bytes, created_at
                FROM entries ORDER BY created_at DESC, id DESC
            ",
            )
            .map_err(StorageError::from)?;

        let entries = stmt
            .query_map([], |row| {
                let dimensions: i64 = row.get(3)?;
                let chunk_count: i64 = row.get(4)?;
                let text_bytes: i64 = row.get(5)?;
                Ok(EntrySummary {
                    identity: FileIdentity {
                        name: row.get(0)?,
                        content_hash: row.get(1)?,
                    },
                    model_name: row.get(2)?,
                    dimensions: dimensions as usize,
                    chunk_count: chunk_count as usize,
                    text_bytes: text_bytes as usize,
                    created_at: row.get(6)?,
                })
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(entries)
    }

    fn stats(&self) -> Result<StoreStats> {
        let (entry_count, chunk_count, total_text_bytes): (i64, i64, i64) = self
            .conn
            .query_row(
                r"
                SELECT COUNT(*), COALESCE(SUM(chunk_count), 0), COALESCE(SUM(text_bytes), 0)
                FROM entries
            ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(StorageError::from)?;

        let schema_version = self.get_schema_version()?.unwrap_or(0);

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StoreStats {
            entry_count: entry_count as usize,
            chunk_count: chunk_count as usize,
            total_text_bytes: total_text_bytes as usize,
            schema_version,
            db_size,
        })
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM entry_chunks;
            DELETE FROM entries;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl SqliteStore {
    /// Whether an entry exists for `identity` and `model_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_entry(&self, identity: &FileIdentity, model_name: &str) -> Result<bool> {
        Ok(self.entry_id(identity, model_name)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    fn setup() -> SqliteStore {
        let mut store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store
    }

    fn entry(name: &str, bytes: &[u8], model: &str) -> CacheEntry {
        let chunks = vec![
            Chunk::new("alpha beta".to_string(), 0..10, 0),
            Chunk::new("beta gamma".to_string(), 6..16, 1).with_overlap(true),
        ];
        let embeddings = vec![vec![1.0, 0.0, -0.5], vec![0.25, 0.5, 0.75]];
        CacheEntry::new(FileIdentity::from_bytes(name, bytes), model, 3, chunks, embeddings)
            .unwrap()
    }

    #[test]
    fn test_init_idempotent() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(store.init().is_ok());
        assert!(store.init().is_ok());
        assert_eq!(store.stats().unwrap().schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_load_entry() {
        let mut store = setup();
        let saved = entry("notes.txt", b"content", "m1");
        store.save_entry(&saved).unwrap();

        let loaded = store
            .load_entry(&saved.identity, "m1")
            .unwrap()
            .expect("entry should exist");
        assert_eq!(loaded, saved);
        assert!(loaded.chunks[1].has_overlap);
    }

    #[test]
    fn test_load_missing_or_other_model() {
        let mut store = setup();
        let saved = entry("notes.txt", b"content", "m1");
        assert!(store.load_entry(&saved.identity, "m1").unwrap().is_none());

        store.save_entry(&saved).unwrap();
        assert!(store.load_entry(&saved.identity, "m2").unwrap().is_none());
        assert!(store.has_entry(&saved.identity, "m1").unwrap());
    }

    #[test]
    fn test_save_replaces_previous() {
        let mut store = setup();
        let saved = entry("notes.txt", b"content", "m1");
        store.save_entry(&saved).unwrap();
        store.save_entry(&saved).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.chunk_count, 2);
    }

    #[test]
    fn test_same_name_different_bytes_are_distinct() {
        let mut store = setup();
        store.save_entry(&entry("notes.txt", b"v1", "m")).unwrap();
        store.save_entry(&entry("notes.txt", b"v2", "m")).unwrap();

        assert_eq!(store.list_entries().unwrap().len(), 2);
        assert_eq!(store.find_entries("notes.txt").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_cascades_chunks() {
        let mut store = setup();
        let saved = entry("notes.txt", b"content", "m1");
        store.save_entry(&saved).unwrap();
        store.save_entry(&entry("notes.txt", b"content", "m2")).unwrap();

        assert_eq!(store.delete_entry(&saved.identity).unwrap(), 2);
        let remaining: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM entry_chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(store.delete_entry(&saved.identity).unwrap(), 0);
    }

    #[test]
    fn test_reset() {
        let mut store = setup();
        store.save_entry(&entry("a.txt", b"a", "m")).unwrap();
        store.save_entry(&entry("b.txt", b"b", "m")).unwrap();
        store.reset().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.chunk_count, 0);
        assert_eq!(stats.total_text_bytes, 0);
    }

    #[test]
    fn test_corrupt_vector_is_rejected() {
        let mut store = setup();
        let saved = entry("notes.txt", b"content", "m1");
        store.save_entry(&saved).unwrap();
        store
            .conn
            .execute("UPDATE entry_chunks SET embedding = x'0000'", [])
            .unwrap();

        assert!(store.load_entry(&saved.identity, "m1").is_err());
    }

    #[test]
    fn test_out_of_range_dimensions_are_rejected() {
        let mut store = setup();
        let saved = entry("notes.txt", b"content", "m1");
        store.save_entry(&saved).unwrap();

        store
            .conn
            .execute("UPDATE entries SET dimensions = -3", [])
            .unwrap();
        assert!(matches!(
            store.load_entry(&saved.identity, "m1"),
            Err(Error::Storage(StorageError::Serialization(_)))
        ));

        store
            .conn
            .execute("UPDATE entries SET dimensions = ?", params![i64::MAX])
            .unwrap();
        assert!(matches!(
            store.load_entry(&saved.identity, "m1"),
            Err(Error::Storage(StorageError::Serialization(_)))
        ));
    }

    #[test]
    fn test_decode_vector_overflow() {
        assert!(decode_vector(&[], usize::MAX).is_err());
        assert_eq!(decode_vector(&1.5f32.to_le_bytes(), 1).unwrap(), vec![1.5]);
    }

    #[test]
    fn test_persists_across_connections() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/cache.db");
        let saved = entry("notes.txt", b"content", "m1");

        {
            let mut store = SqliteStore::open(&db_path).unwrap();
            store.init().unwrap();
            store.save_entry(&saved).unwrap();
        }

        let mut store = SqliteStore::open(&db_path).unwrap();
        store.init().unwrap();
        assert!(store.load_entry(&saved.identity, "m1").unwrap().is_some());
        assert!(store.stats().unwrap().db_size.is_some());
        assert_eq!(store.path(), Some(db_path.as_path()));
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut store = setup();
        store.set_schema_version(CURRENT_SCHEMA_VERSION + 1).unwrap();
        assert!(store.init().is_err());
    }
}
