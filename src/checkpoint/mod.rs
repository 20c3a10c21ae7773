//! Crash-safe job state persistence.
//!
//! A checkpoint records which chunks of a job have completed and their
//! results, so an interrupted job resumes instead of re-translating. Every
//! write is one transaction: it commits whole or leaves the store
//! untouched.

use crate::core::TranslationResult;
use crate::error::{Result, StorageError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// SQL schema for the checkpoints table.
const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS checkpoints (
    job_id TEXT PRIMARY KEY,
    input_file TEXT NOT NULL,
    output_file TEXT NOT NULL,
    total_chunks INTEGER NOT NULL,
    completed_chunk_ids TEXT NOT NULL,
    results_data TEXT NOT NULL,
    job_metadata TEXT,
    created_at REAL NOT NULL,
    updated_at REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_updated ON checkpoints(updated_at);
";

/// Saved state of one translation job.
///
/// Chunk ids are `u64` end-to-end; `serde_json` writes them as string keys
/// in the stored JSON object and rehydrates them on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Job identifier.
    pub job_id: String,
    /// Input document path.
    pub input_file: String,
    /// Output document path.
    pub output_file: String,
    /// Total chunks in the job.
    pub total_chunks: usize,
    /// Ids of chunks already translated.
    pub completed_chunk_ids: Vec<u64>,
    /// Completed results keyed by chunk id.
    pub results_data: BTreeMap<u64, TranslationResult>,
    /// Arbitrary job metadata.
    pub job_metadata: BTreeMap<String, serde_json::Value>,
    /// Unix seconds of first save.
    pub created_at: f64,
    /// Unix seconds of last save.
    pub updated_at: f64,
}

impl CheckpointState {
    /// Completion ratio in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_percentage(&self) -> f64 {
        if self.total_chunks == 0 {
            0.0
        } else {
            self.completed_chunk_ids.len() as f64 / self.total_chunks as f64
        }
    }

    /// Chunks still to translate.
    #[must_use]
    pub fn remaining_chunks(&self) -> usize {
        self.total_chunks.saturating_sub(self.completed_chunk_ids.len())
    }
}

/// Resume summary for a job.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeInfo {
    /// Job identifier.
    pub job_id: String,
    /// Total chunks in the job.
    pub total_chunks: usize,
    /// Chunks already completed.
    pub completed_chunks: usize,
    /// Chunks remaining.
    pub remaining_chunks: usize,
    /// Completion ratio in `[0, 1]`.
    pub completion_percentage: f64,
    /// Unix seconds of the last save.
    pub last_updated: f64,
    /// Whether there is anything left to do.
    pub can_resume: bool,
}

/// SQLite-backed checkpoint store.
///
/// Single-writer per `job_id`: the store neither locks nor arbitrates
/// concurrent writers.
///
/// # Examples
///
/// ```no_run
/// use doctrans::checkpoint::CheckpointStore;
///
/// let store = CheckpointStore::open("checkpoints.db").unwrap();
/// if let Some(info) = store.resume_info("job_1").unwrap() {
///     println!("{:.0}% done", info.completion_percentage * 100.0);
/// }
/// ```
pub struct CheckpointStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl CheckpointStore {
    /// Opens or creates a checkpoint database.
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

    /// Creates an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Upserts a job's checkpoint.
    ///
    /// A pre-existing row keeps its `created_at`; `updated_at` always
    /// refreshes. The write commits as a unit or leaves the store
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or database failure.
    #[allow(clippy::too_many_arguments, clippy::cast_possible_wrap)]
    pub fn save(
        &mut self,
        job_id: &str,
        input_file: &str,
        output_file: &str,
        total_chunks: usize,
        completed_chunk_ids: &[u64],
        results_data: &BTreeMap<u64, TranslationResult>,
        job_metadata: &BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        let now = crate::memory::now_secs();
        let ids_json = serde_json::to_string(completed_chunk_ids).map_err(StorageError::from)?;
        let results_json = serde_json::to_string(results_data).map_err(StorageError::from)?;
        let metadata_json = serde_json::to_string(job_metadata).map_err(StorageError::from)?;

        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let created_at: f64 = tx
            .query_row(
                "SELECT created_at FROM checkpoints WHERE job_id = ?",
                params![job_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?
            .unwrap_or(now);

        tx.execute(
            r"
            INSERT OR REPLACE INTO checkpoints (
                job_id, input_file, output_file, total_chunks,
                completed_chunk_ids, results_data, job_metadata,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                job_id,
                input_file,
                output_file,
                total_chunks as i64,
                ids_json,
                results_json,
                metadata_json,
                created_at,
                now,
            ],
        )
        .map_err(StorageError::from)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(())
    }

    /// Loads a job's checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on database or deserialization failure.
    #[allow(clippy::cast_sign_loss)]
    pub fn load(&self, job_id: &str) -> Result<Option<CheckpointState>> {
        let row = self
            .conn
            .query_row(
                r"
                SELECT job_id, input_file, output_file, total_chunks,
                       completed_chunk_ids, results_data, job_metadata,
                       created_at, updated_at
                FROM checkpoints WHERE job_id = ?
                ",
                params![job_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, f64>(7)?,
                        row.get::<_, f64>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(StorageError::from)?;

        let Some((
            job_id,
            input_file,
            output_file,
            total_chunks,
            ids_json,
            results_json,
            metadata_json,
            created_at,
            updated_at,
        )) = row
        else {
            return Ok(None);
        };

        let completed_chunk_ids: Vec<u64> =
            serde_json::from_str(&ids_json).map_err(StorageError::from)?;
        let results_data: BTreeMap<u64, TranslationResult> =
            serde_json::from_str(&results_json).map_err(StorageError::from)?;
        let job_metadata: BTreeMap<String, serde_json::Value> = metadata_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(StorageError::from)?
            .unwrap_or_default();

        Ok(Some(CheckpointState {
            job_id,
            input_file,
            output_file,
            total_chunks: total_chunks as usize,
            completed_chunk_ids,
            results_data,
            job_metadata,
            created_at,
            updated_at,
        }))
    }

    /// Whether a checkpoint exists for the job.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn has(&self, job_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM checkpoints WHERE job_id = ? LIMIT 1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(found.is_some())
    }

    /// Deletes a job's checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn delete(&mut self, job_id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM checkpoints WHERE job_id = ?", params![job_id])
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    /// Lists checkpoints, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn list(&self, limit: usize) -> Result<Vec<CheckpointState>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT job_id FROM checkpoints ORDER BY updated_at DESC LIMIT ?",
            )
            .map_err(StorageError::from)?;
        let ids: Vec<String> = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                row.get(0)
            })
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<_>>()
            .map_err(StorageError::from)?;

        let mut states = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(state) = self.load(&id)? {
                states.push(state);
            }
        }
        Ok(states)
    }

    /// Resume summary for a job, None when no checkpoint exists.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn resume_info(&self, job_id: &str) -> Result<Option<ResumeInfo>> {
        let Some(state) = self.load(job_id)? else {
            return Ok(None);
        };
        Ok(Some(ResumeInfo {
            job_id: state.job_id.clone(),
            total_chunks: state.total_chunks,
            completed_chunks: state.completed_chunk_ids.len(),
            remaining_chunks: state.remaining_chunks(),
            completion_percentage: state.completion_percentage(),
            last_updated: state.updated_at,
            can_resume: state.remaining_chunks() > 0,
        }))
    }

    /// Deletes checkpoints last updated more than `days` days ago.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn cleanup_older_than(&mut self, days: u32) -> Result<usize> {
        let cutoff = crate::memory::now_secs() - f64::from(days) * 86_400.0;
        let count = self
            .conn
            .execute(
                "DELETE FROM checkpoints WHERE updated_at < ?",
                params![cutoff],
            )
            .map_err(StorageError::from)?;
        Ok(count)
    }
}
