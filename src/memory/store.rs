//! SQLite-backed translation memory with FTS5 fuzzy retrieval.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{Result, StorageError};
use crate::memory::segment::{MatchKind, TmMatch, TmSegment, now_secs, source_hash};
use crate::memory::similarity::{composite_similarity, extract_keywords};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// SQL schema for the segments table and its FTS index.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS segments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_hash TEXT UNIQUE NOT NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    source_lang TEXT DEFAULT 'en',
    target_lang TEXT DEFAULT 'vi',
    domain TEXT DEFAULT 'default',
    quality_score REAL DEFAULT 1.0,
    created_at REAL NOT NULL,
    updated_at REAL NOT NULL,
    use_count INTEGER DEFAULT 0,
    context_before TEXT,
    context_after TEXT,
    project_name TEXT,
    created_by TEXT DEFAULT 'doctrans',
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_segments_hash ON segments(source_hash);
CREATE INDEX IF NOT EXISTS idx_segments_domain ON segments(domain);
CREATE INDEX IF NOT EXISTS idx_segments_quality ON segments(quality_score);

CREATE VIRTUAL TABLE IF NOT EXISTS segments_fts USING fts5(
    source,
    target,
    content='segments',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS segments_ai AFTER INSERT ON segments BEGIN
    INSERT INTO segments_fts(rowid, source, target)
    VALUES (new.id, new.source, new.target);
END;

CREATE TRIGGER IF NOT EXISTS segments_ad AFTER DELETE ON segments BEGIN
    INSERT INTO segments_fts(segments_fts, rowid, source, target)
    VALUES ('delete', old.id, old.source, old.target);
END;

CREATE TRIGGER IF NOT EXISTS segments_au AFTER UPDATE ON segments BEGIN
    INSERT INTO segments_fts(segments_fts, rowid, source, target)
    VALUES ('delete', old.id, old.source, old.target);
    INSERT INTO segments_fts(rowid, source, target)
    VALUES (new.id, new.source, new.target);
END;
";

/// Aggregate TM statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TmStatistics {
    /// Total stored segments.
    pub total_segments: usize,
    /// Segment counts per domain.
    pub by_domain: BTreeMap<String, usize>,
    /// Segment counts per `src→tgt` pair.
    pub by_language_pair: BTreeMap<String, usize>,
    /// Mean quality score.
    pub avg_quality: f64,
    /// Segments served at least once.
    pub segments_used: usize,
    /// Sum of use counters.
    pub total_uses: i64,
}

/// SQLite-based translation memory with exact and fuzzy lookup.
///
/// # Examples
///
/// ```no_run
/// use doctrans::memory::{TmSegment, TranslationMemory};
///
/// let mut tm = TranslationMemory::open("tm.db").unwrap();
/// tm.add_segment(&TmSegment::new("Hello", "Xin chào", "en", "vi")).unwrap();
/// let hit = tm.exact_match("Hello", "en", "vi").unwrap();
/// assert!(hit.is_some());
/// ```
pub struct TranslationMemory {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for TranslationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationMemory")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TranslationMemory {
    /// Opens or creates a TM database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
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

    /// Creates an in-memory TM, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// The database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Adds a segment, or updates the existing row with the same source
    /// hash in place.
    ///
    /// On update: target, quality, domain, context, project, and notes are
    /// replaced, `updated_at` is refreshed, `use_count` is incremented, and
    /// `created_at` is preserved. Never creates a duplicate.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn add_segment(&mut self, segment: &TmSegment) -> Result<i64> {
        let hash = segment.hash();
        let tx = self.conn.transaction().map_err(StorageError::from)?;

        let existing: Option<(i64, i64)> = tx
            .query_row(
                "SELECT id, use_count FROM segments WHERE source_hash = ?",
                params![hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(StorageError::from)?;

        let id = if let Some((id, use_count)) = existing {
            tx.execute(
                r"
                UPDATE segments
                SET target = ?, quality_score = ?, updated_at = ?, use_count = ?,
                    domain = ?, context_before = ?, context_after = ?,
                    project_name = ?, notes = ?
                WHERE id = ?
                ",
                params![
                    segment.target,
                    segment.quality_score,
                    now_secs(),
                    use_count + 1,
                    segment.domain,
                    segment.context_before,
                    segment.context_after,
                    segment.project_name,
                    segment.notes,
                    id,
                ],
            )
            .map_err(StorageError::from)?;
            id
        } else {
            tx.execute(
                r"
                INSERT INTO segments (
                    source_hash, source, target, source_lang, target_lang,
                    domain, quality_score, created_at, updated_at,
                    use_count, context_before, context_after,
                    project_name, created_by, notes
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    hash,
                    segment.source,
                    segment.target,
                    segment.source_lang,
                    segment.target_lang,
                    segment.domain,
                    segment.quality_score,
                    segment.created_at,
                    segment.updated_at,
                    segment.use_count,
                    segment.context_before,
                    segment.context_after,
                    segment.project_name,
                    segment.created_by,
                    segment.notes,
                ],
            )
            .map_err(StorageError::from)?;
            tx.last_insert_rowid()
        };

        tx.commit()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(id)
    }

    /// Exact lookup by content hash. Increments the segment's use counter
    /// on a hit.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn exact_match(
        &mut self,
        source: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Option<TmMatch>> {
        let hash = source_hash(source_lang, target_lang, source);

        let segment = self
            .conn
            .query_row(
                r"
                SELECT * FROM segments
                WHERE source_hash = ? AND source_lang = ? AND target_lang = ?
                ORDER BY quality_score DESC, use_count DESC
                LIMIT 1
                ",
                params![hash, source_lang, target_lang],
                row_to_segment,
            )
            .optional()
            .map_err(StorageError::from)?;

        let Some(mut segment) = segment else {
            return Ok(None);
        };

        self.conn
            .execute(
                "UPDATE segments SET use_count = use_count + 1 WHERE id = ?",
                params![segment.id],
            )
            .map_err(StorageError::from)?;
        segment.use_count += 1;

        Ok(Some(TmMatch {
            segment,
            similarity: 1.0,
            match_type: MatchKind::Exact,
        }))
    }

    /// Fuzzy lookup: retrieve up to `3 * max_results` FTS candidates using
    /// the top five non-stop keywords, rescore with the composite
    /// similarity, keep those at or above `threshold`, and return the top
    /// `max_results` sorted descending.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn fuzzy_match(
        &self,
        source: &str,
        source_lang: &str,
        target_lang: &str,
        threshold: f64,
        max_results: usize,
        domain: Option<&str>,
    ) -> Result<Vec<TmMatch>> {
        let keywords = extract_keywords(source);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let fts_query = keywords
            .iter()
            .take(5)
            .map(|k| format!("\"{k}\""))
            .collect::<Vec<_>>()
            .join(" OR ");

        let limit = i64::try_from(max_results * 3).unwrap_or(i64::MAX);
        let candidates: Vec<TmSegment> = if let Some(domain) = domain {
            let mut stmt = self
                .conn
                .prepare(
                    r"
                    SELECT * FROM segments
                    WHERE source_lang = ? AND target_lang = ? AND domain = ?
                    AND id IN (SELECT rowid FROM segments_fts WHERE segments_fts MATCH ?)
                    ORDER BY quality_score DESC, use_count DESC
                    LIMIT ?
                    ",
                )
                .map_err(StorageError::from)?;
            let rows = stmt
                .query_map(
                    params![source_lang, target_lang, domain, fts_query, limit],
                    row_to_segment,
                )
                .map_err(StorageError::from)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?
        } else {
            let mut stmt = self
                .conn
                .prepare(
                    r"
                    SELECT * FROM segments
                    WHERE source_lang = ? AND target_lang = ?
                    AND id IN (SELECT rowid FROM segments_fts WHERE segments_fts MATCH ?)
                    ORDER BY quality_score DESC, use_count DESC
                    LIMIT ?
                    ",
                )
                .map_err(StorageError::from)?;
            let rows = stmt
                .query_map(
                    params![source_lang, target_lang, fts_query, limit],
                    row_to_segment,
                )
                .map_err(StorageError::from)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(StorageError::from)?
        };

        let mut matches: Vec<TmMatch> = Vec::new();
        for segment in candidates {
            let similarity = composite_similarity(source, &segment.source);
            if similarity >= threshold {
                matches.push(TmMatch {
                    segment,
                    similarity,
                    match_type: MatchKind::Fuzzy,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(max_results);
        Ok(matches)
    }

    /// Aggregate statistics over the stored segments.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn statistics(&self) -> Result<TmStatistics> {
        let total_segments: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        let mut by_domain = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT domain, COUNT(*) FROM segments GROUP BY domain")
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(StorageError::from)?;
        for row in rows {
            let (domain, count) = row.map_err(StorageError::from)?;
            by_domain.insert(domain, count as usize);
        }

        let mut by_language_pair = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare(
                "SELECT source_lang, target_lang, COUNT(*) FROM segments
                 GROUP BY source_lang, target_lang",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(StorageError::from)?;
        for row in rows {
            let (src, tgt, count) = row.map_err(StorageError::from)?;
            by_language_pair.insert(format!("{src}→{tgt}"), count as usize);
        }

        let avg_quality: f64 = self
            .conn
            .query_row(
                "SELECT COALESCE(AVG(quality_score), 0.0) FROM segments",
                [],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;

        let (segments_used, total_uses): (i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(use_count), 0)
                 FROM segments WHERE use_count > 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(StorageError::from)?;

        Ok(TmStatistics {
            total_segments: total_segments as usize,
            by_domain,
            by_language_pair,
            avg_quality,
            segments_used: segments_used as usize,
            total_uses,
        })
    }

    /// Deletes all segments in a domain.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn clear_domain(&mut self, domain: &str) -> Result<usize> {
        let count = self
            .conn
            .execute("DELETE FROM segments WHERE domain = ?", params![domain])
            .map_err(StorageError::from)?;
        Ok(count)
    }

    /// Deletes every segment.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn clear_all(&mut self) -> Result<usize> {
        let count = self
            .conn
            .execute("DELETE FROM segments", [])
            .map_err(StorageError::from)?;
        Ok(count)
    }
}

/// Maps a `SELECT *` row to a segment.
fn row_to_segment(row: &Row<'_>) -> rusqlite::Result<TmSegment> {
    Ok(TmSegment {
        id: Some(row.get("id")?),
        source: row.get("source")?,
        target: row.get("target")?,
        source_lang: row.get("source_lang")?,
        target_lang: row.get("target_lang")?,
        domain: row.get("domain")?,
        quality_score: row.get("quality_score")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        use_count: row.get("use_count")?,
        context_before: row.get::<_, Option<String>>("context_before")?.unwrap_or_default(),
        context_after: row.get::<_, Option<String>>("context_after")?.unwrap_or_default(),
        project_name: row.get::<_, Option<String>>("project_name")?.unwrap_or_default(),
        created_by: row.get("created_by")?,
        notes: row.get::<_, Option<String>>("notes")?.unwrap_or_default(),
    })
}
