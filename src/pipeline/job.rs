//! End-to-end job execution.
//!
//! Wires the whole pipeline: read → detect protected regions → substitute
//! placeholders → chunk → (resume-filter) → dispatch translations →
//! restore placeholders → checkpoint → stream batches into the output
//! writer → merge. A cancelled or crashed job resumes from its checkpoint.

use crate::checkpoint::CheckpointStore;
use crate::chunking::SmartChunker;
use crate::core::{ProcessingStats, TranslationChunk, TranslationResult};
use crate::error::{CommandError, Result};
use crate::io::DocumentReader;
use crate::output::{OutputFormat, create_writer};
use crate::pipeline::dispatch::{CancellationFlag, DispatcherConfig, ParallelDispatcher};
use crate::pipeline::progress::{NullSink, ProgressEvent, ProgressSink, emit};
use crate::pipeline::translator::TranslatorEngine;
use crate::quality::LanguagePair;
use crate::stem::{PlaceholderManager, detect_regions};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Instant;

/// Everything a job needs beyond the engine's own settings.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Job identifier, the checkpoint key.
    pub job_id: String,
    /// Source document path.
    pub input_file: PathBuf,
    /// Output document path.
    pub output_file: PathBuf,
    /// Output format.
    pub format: OutputFormat,
    /// Maximum characters per chunk.
    pub max_chars: usize,
    /// Context excerpt width.
    pub context_window: usize,
    /// Chunks per output batch.
    pub batch_size: usize,
    /// Dispatcher settings.
    pub dispatcher: DispatcherConfig,
    /// STEM-aware chunking; `None` decides from the detected content.
    pub stem_mode: Option<bool>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job_id: "job".to_string(),
            input_file: PathBuf::new(),
            output_file: PathBuf::new(),
            format: OutputFormat::Txt,
            max_chars: crate::chunking::DEFAULT_MAX_CHARS,
            context_window: crate::chunking::DEFAULT_CONTEXT_WINDOW,
            batch_size: 100,
            dispatcher: DispatcherConfig::default(),
            stem_mode: None,
        }
    }
}

/// Summary of a finished job.
#[derive(Debug)]
pub struct JobReport {
    /// Job identifier.
    pub job_id: String,
    /// Chunks in the whole job.
    pub total_chunks: usize,
    /// Chunks served from the checkpoint instead of translated.
    pub resumed_chunks: usize,
    /// Dispatcher counters.
    pub stats: ProcessingStats,
    /// Fraction of protected regions restored into the output.
    pub preservation_rate: f64,
    /// Chunk ids whose translation ultimately failed.
    pub failed_chunks: Vec<u64>,
    /// Final output path.
    pub output_path: PathBuf,
    /// Wall time of this run.
    pub elapsed: std::time::Duration,
}

/// Runs translation jobs end to end.
pub struct JobRunner {
    engine: TranslatorEngine,
    checkpoints: RefCell<CheckpointStore>,
    sink: Box<dyn ProgressSink>,
    cancellation: CancellationFlag,
    source_lang: String,
    target_lang: String,
}

impl JobRunner {
    /// Creates a runner. The language pair drives the merger's expansion
    /// factor and must match the engine's configuration.
    #[must_use]
    pub fn new(
        engine: TranslatorEngine,
        checkpoints: CheckpointStore,
        sink: Option<Box<dyn ProgressSink>>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            checkpoints: RefCell::new(checkpoints),
            sink: sink.unwrap_or_else(|| Box::new(NullSink)),
            cancellation: CancellationFlag::new(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    /// A clone of the runner's cancellation flag, for signal handlers.
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Expansion factor for the configured language pair.
    #[must_use]
    pub fn expansion_factor(&self) -> f64 {
        LanguagePair::expansion(&self.source_lang, &self.target_lang)
    }

    /// Concatenates results into one text, cutting translated overlap.
    ///
    /// For consumers that need the document as a single string rather
    /// than a written file; the cut estimate uses this pair's expansion
    /// factor.
    #[must_use]
    pub fn merge_results(&self, results: &[TranslationResult]) -> String {
        crate::merge::OverlapMerger::new(self.expansion_factor()).merge(results)
    }

    /// Reads the input document and runs the job.
    ///
    /// # Errors
    ///
    /// Propagates read, storage, and writer errors; cancellation surfaces
    /// as [`CommandError::Cancelled`] with the checkpoint intact.
    pub async fn run(&self, config: &JobConfig) -> Result<JobReport> {
        let text = DocumentReader::new().read(&config.input_file)?;
        self.run_text(config, &text).await
    }

    /// Runs the job over already-loaded text.
    ///
    /// # Errors
    ///
    /// See [`JobRunner::run`].
    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    pub async fn run_text(&self, config: &JobConfig, text: &str) -> Result<JobReport> {
        let started = Instant::now();

        // Detection and placeholder substitution.
        let regions = detect_regions(text);
        let formula_count = regions.iter().filter(|r| r.kind.is_formula()).count();
        let code_count = regions.iter().filter(|r| r.kind.is_code()).count();
        let stem_mode = config.stem_mode.unwrap_or_else(|| {
            PlaceholderManager::is_stem_heavy(formula_count, code_count, text.len())
        });

        let manager = PlaceholderManager::new();
        let chunker = SmartChunker::new(config.max_chars, config.context_window)?;

        let (chunks, mapping) = if stem_mode {
            let processed = manager.substitute(text, &regions);
            for warning in &processed.warnings {
                tracing::warn!(job_id = %config.job_id, "{warning}");
            }
            let sentinel_regions = processed.sentinel_regions();
            let chunks = chunker.create_stem_chunks(&processed.text, &sentinel_regions)?;
            (chunks, processed.mapping)
        } else {
            (chunker.create_chunks(text)?, BTreeMap::new())
        };

        let total_chunks = chunks.len();
        let total_batches = total_chunks.div_ceil(config.batch_size.max(1));
        tracing::info!(
            job_id = %config.job_id,
            total_chunks,
            total_batches,
            stem_mode,
            formulas = formula_count,
            code_blocks = code_count,
            "job prepared"
        );

        // Resume state.
        let mut completed: BTreeMap<u64, TranslationResult> = self
            .checkpoints
            .borrow()
            .load(&config.job_id)?
            .map(|state| state.results_data)
            .unwrap_or_default();
        let resumed_chunks = completed.len();
        if resumed_chunks > 0 {
            tracing::info!(
                job_id = %config.job_id,
                resumed_chunks,
                "resuming from checkpoint"
            );
        }

        emit(
            self.sink.as_ref(),
            &ProgressEvent::JobStarted {
                job_id: config.job_id.clone(),
                total_chunks,
                total_batches,
                timestamp: crate::memory::now_secs(),
            },
        );

        let dispatcher =
            ParallelDispatcher::new(config.dispatcher.clone(), self.cancellation.clone());
        let mut writer = create_writer(config.format, &config.output_file);
        let mut stats = ProcessingStats::new(total_chunks);
        let mut failed_chunks: Vec<u64> = Vec::new();
        let mut preserved: BTreeSet<String> = BTreeSet::new();
        let mut max_batch_bytes = 0usize;
        let mut total_bytes = 0usize;

        // Results carried over from a previous run already hold restored
        // content; they count toward preservation too.
        for result in completed.values() {
            Self::mark_preserved(&result.translated, &mapping, &mut preserved);
        }

        for (batch_idx, batch) in chunks.chunks(config.batch_size.max(1)).enumerate() {
            if self.cancellation.is_cancelled() {
                self.save_checkpoint(config, total_chunks, &completed)?;
                return Err(CommandError::Cancelled.into());
            }

            let pending: Vec<TranslationChunk> = batch
                .iter()
                .filter(|c| !completed.contains_key(&c.id))
                .cloned()
                .collect();

            if !pending.is_empty() {
                let outcome = dispatcher
                    .run(&pending, |chunk| self.engine.translate_chunk(chunk), |_| {})
                    .await;
                stats.absorb(&outcome.stats);

                for mut result in outcome.results {
                    let (restored, _) = manager.restore(&result.translated, &mapping);
                    result.translated = restored;
                    Self::mark_preserved(&result.translated, &mapping, &mut preserved);

                    emit(
                        self.sink.as_ref(),
                        &ProgressEvent::ChunkTranslated {
                            job_id: config.job_id.clone(),
                            chunk_id: result.chunk_id,
                            preview: result.preview(200).to_string(),
                            quality_score: result.quality_score,
                            timestamp: crate::memory::now_secs(),
                        },
                    );
                    completed.insert(result.chunk_id, result);
                }

                let cancelled = outcome.failures.iter().any(|f| f.error.contains("cancelled"));
                for failure in outcome.failures {
                    tracing::error!(
                        job_id = %config.job_id,
                        chunk_id = failure.chunk_id,
                        "chunk failed: {}",
                        failure.error
                    );
                    failed_chunks.push(failure.chunk_id);
                }

                self.save_checkpoint(config, total_chunks, &completed)?;

                if cancelled || self.cancellation.is_cancelled() {
                    return Err(CommandError::Cancelled.into());
                }
            }

            // Fold the batch into the output: checkpointed results plus
            // fallback markers for chunks with no translation at all.
            let batch_results: Vec<TranslationResult> = batch
                .iter()
                .map(|chunk| {
                    completed.get(&chunk.id).cloned().unwrap_or_else(|| {
                        let mut fallback = TranslationResult::failed(
                            chunk.id,
                            chunk.text.clone(),
                            "translation unavailable",
                            chunk.overlap_char_count,
                        );
                        let (restored, _) = manager.restore(&fallback.translated, &mapping);
                        fallback.translated = restored;
                        fallback
                    })
                })
                .collect();

            let batch_bytes: usize = batch_results.iter().map(|r| r.translated.len()).sum();
            total_bytes += batch_bytes;
            max_batch_bytes = max_batch_bytes.max(batch_bytes);

            let artifact = writer.add_batch(&batch_results, batch_idx)?;
            emit(
                self.sink.as_ref(),
                &ProgressEvent::BatchExported {
                    job_id: config.job_id.clone(),
                    batch: batch_idx + 1,
                    partial_file: artifact.display().to_string(),
                    timestamp: crate::memory::now_secs(),
                },
            );

            let chunks_completed = completed.len().min(total_chunks);
            emit(
                self.sink.as_ref(),
                &ProgressEvent::BatchCompleted {
                    job_id: config.job_id.clone(),
                    batch: batch_idx + 1,
                    total_batches,
                    progress: if total_chunks == 0 {
                        1.0
                    } else {
                        chunks_completed as f64 / total_chunks as f64
                    },
                    chunks_completed,
                    timestamp: crate::memory::now_secs(),
                },
            );
        }

        let output_path = writer.merge_all()?;

        // Lookup counters belong to the job-level stats.
        let counters = self.engine.counters();
        stats.cache_hits = self.engine.cache_hit_total();
        stats.cache_misses = counters.cache_misses;

        let preservation_rate = if mapping.is_empty() {
            1.0
        } else {
            preserved.len() as f64 / mapping.len() as f64
        };

        emit(
            self.sink.as_ref(),
            &ProgressEvent::JobCompleted {
                job_id: config.job_id.clone(),
                total_chunks,
                memory_saved_mb: total_bytes.saturating_sub(max_batch_bytes) as f64 / 1_048_576.0,
                timestamp: crate::memory::now_secs(),
            },
        );

        self.checkpoints.borrow_mut().delete(&config.job_id)?;
        failed_chunks.sort_unstable();

        Ok(JobReport {
            job_id: config.job_id.clone(),
            total_chunks,
            resumed_chunks,
            stats,
            preservation_rate,
            failed_chunks,
            output_path,
            elapsed: started.elapsed(),
        })
    }

    /// Records which protected contents appear in a restored translation.
    fn mark_preserved(
        restored: &str,
        mapping: &BTreeMap<String, crate::stem::PlaceholderEntry>,
        preserved: &mut BTreeSet<String>,
    ) {
        for (sentinel, entry) in mapping {
            if !preserved.contains(sentinel) && restored.contains(&entry.content) {
                preserved.insert(sentinel.clone());
            }
        }
    }

    /// Persists the job state; failures surface to the caller while the
    /// in-memory results stay valid.
    fn save_checkpoint(
        &self,
        config: &JobConfig,
        total_chunks: usize,
        completed: &BTreeMap<u64, TranslationResult>,
    ) -> Result<()> {
        let ids: Vec<u64> = completed.keys().copied().collect();
        self.checkpoints.borrow_mut().save(
            &config.job_id,
            &config.input_file.display().to_string(),
            &config.output_file.display().to_string(),
            total_chunks,
            &ids,
            completed,
            &BTreeMap::new(),
        )
    }
}
