//! Content-addressed chunk cache.
//!
//! A durable exact-match store keyed by a hash over the source text, the
//! language pair, the pipeline mode, and the domain. No fuzzy semantics:
//! a read either hits the one stored value or misses.

use crate::error::{Result, StorageError};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// SQL schema for the chunk cache.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS chunk_cache (
    cache_key TEXT PRIMARY KEY,
    target TEXT NOT NULL,
    source_lang TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    mode TEXT NOT NULL,
    created_at REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunk_cache_created ON chunk_cache(created_at);
";

/// Computes the content-addressed cache key.
///
/// Fields are separated by a unit separator so adjacent fields can never
/// collide by concatenation.
#[must_use]
pub fn chunk_cache_key(
    source_text: &str,
    source_lang: &str,
    target_lang: &str,
    mode: &str,
    domain: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [source_text, source_lang, target_lang, mode, domain] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Durable exact-match cache of chunk translations.
///
/// # Examples
///
/// ```no_run
/// use doctrans::cache::{ChunkCache, chunk_cache_key};
///
/// let mut cache = ChunkCache::open("chunks.db").unwrap();
/// let key = chunk_cache_key("Hello", "en", "vi", "stem", "default");
/// cache.put(&key, "Xin chào", "en", "vi", "stem").unwrap();
/// assert_eq!(cache.get(&key).unwrap().as_deref(), Some("Xin chào"));
/// ```
pub struct ChunkCache {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ChunkCache {
    /// Opens or creates a chunk cache at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Database(e.to_string()))?;
            }
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory cache, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Looks up a cached translation. Reads have no side effects.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let target: Option<String> = self
            .conn
            .query_row(
                "SELECT target FROM chunk_cache WHERE cache_key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(target)
    }

    /// Stores a translation under the given key, overwriting any previous
    /// value. Idempotent for identical writes.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn put(
        &mut self,
        key: &str,
        target: &str,
        source_lang: &str,
        target_lang: &str,
        mode: &str,
    ) -> Result<()> {
        let now = crate::memory::now_secs();
        self.conn
            .execute(
                r"
                INSERT INTO chunk_cache (cache_key, target, source_lang, target_lang, mode, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(cache_key) DO UPDATE SET target = excluded.target
                ",
                params![key, target, source_lang, target_lang, mode, now],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunk_cache", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether the cache has no entries.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn clear(&mut self) -> Result<usize> {
        let count = self
            .conn
            .execute("DELETE FROM chunk_cache", [])
            .map_err(StorageError::from)?;
        Ok(count)
    }
}
