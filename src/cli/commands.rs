//! Command execution.

use crate::cache::ChunkCache;
use crate::checkpoint::CheckpointStore;
use crate::cli::parser::{CheckpointAction, Cli, Commands, TmAction};
use crate::error::{CommandError, ProviderError, Result};
use crate::glossary::Glossary;
use crate::io::DocumentReader;
use crate::memory::TranslationMemory;
use crate::output::OutputFormat;
use crate::pipeline::{
    DispatcherConfig, EngineConfig, JobConfig, JobRunner, ProgressEvent, ProgressSink,
    TranslatorEngine,
};
use crate::provider::{ProviderConfig, create_provider};
use crate::quality::Domain;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Progress sink that narrates events through the log.
struct LogSink;

impl ProgressSink for LogSink {
    fn broadcast(&self, event: &ProgressEvent) -> std::result::Result<(), String> {
        match event {
            ProgressEvent::JobStarted {
                job_id,
                total_chunks,
                total_batches,
                ..
            } => tracing::info!(%job_id, total_chunks, total_batches, "job started"),
            ProgressEvent::ChunkTranslated {
                chunk_id,
                quality_score,
                ..
            } => tracing::debug!(chunk_id, quality_score, "chunk translated"),
            ProgressEvent::BatchCompleted {
                batch,
                total_batches,
                progress,
                ..
            } => tracing::info!(batch, total_batches, progress, "batch completed"),
            ProgressEvent::BatchExported { partial_file, .. } => {
                tracing::debug!(partial_file, "batch exported");
            }
            ProgressEvent::JobCompleted {
                job_id,
                total_chunks,
                ..
            } => tracing::info!(%job_id, total_chunks, "job completed"),
        }
        Ok(())
    }
}

/// Executes a parsed command, returning the text to print.
///
/// # Errors
///
/// Returns any pipeline, storage, or argument error.
pub fn execute(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Translate {
            input,
            output,
            to,
            source_lang,
            target_lang,
            domain,
            provider,
            model,
            glossary,
            max_chars,
            context_window,
            concurrency,
            max_retries,
            timeout,
            batch_size,
            stem,
            job_id,
        } => {
            let params = TranslateParams {
                input: input.clone(),
                output: output.clone(),
                format: to.parse()?,
                source_lang: source_lang.clone(),
                target_lang: target_lang.clone(),
                domain: domain
                    .parse()
                    .map_err(CommandError::InvalidArgument)?,
                provider: provider.clone(),
                model: model.clone(),
                glossary: glossary.clone(),
                max_chars: *max_chars,
                context_window: *context_window,
                concurrency: *concurrency,
                max_retries: *max_retries,
                timeout: *timeout,
                batch_size: *batch_size,
                stem: *stem,
                job_id: job_id.clone(),
            };
            run_translate(&cli.data_dir, &params, cli.json)
        }
        Commands::Resume { job_id } => run_resume(&cli.data_dir, job_id, cli.json),
        Commands::Checkpoints { action } => run_checkpoints(&cli.data_dir, action, cli.json),
        Commands::Tm { action } => run_tm(&cli.data_dir, action, cli.json),
        Commands::Detect { input } => run_detect(input, cli.json),
    }
}

/// Resolved translate-command arguments.
struct TranslateParams {
    input: PathBuf,
    output: PathBuf,
    format: OutputFormat,
    source_lang: String,
    target_lang: String,
    domain: Domain,
    provider: String,
    model: String,
    glossary: Option<PathBuf>,
    max_chars: usize,
    context_window: usize,
    concurrency: usize,
    max_retries: usize,
    timeout: u64,
    batch_size: usize,
    stem: Option<bool>,
    job_id: Option<String>,
}

fn run_translate(data_dir: &Path, params: &TranslateParams, json: bool) -> Result<String> {
    let api_key = resolve_api_key(&params.provider)?;
    let mut provider_config = ProviderConfig::new(api_key, params.model.clone());
    provider_config.timeout_secs = params.timeout.max(30);
    let provider = create_provider(&params.provider, provider_config)?;

    let glossary = params
        .glossary
        .as_deref()
        .map(Glossary::load)
        .transpose()?;

    let tm = TranslationMemory::open(data_dir.join("tm.db"))?;
    let chunk_cache = ChunkCache::open(data_dir.join("chunk_cache.db"))?;
    let checkpoints = CheckpointStore::open(data_dir.join("checkpoints.db"))?;

    let engine_config = EngineConfig {
        source_lang: params.source_lang.clone(),
        target_lang: params.target_lang.clone(),
        domain: params.domain,
        mode: if params.stem == Some(true) {
            "stem".to_string()
        } else {
            "standard".to_string()
        },
        created_by: format!("{}/{}", params.provider, params.model),
        ..EngineConfig::default()
    };
    let engine = TranslatorEngine::new(
        provider,
        engine_config,
        glossary,
        Some(tm),
        Some(chunk_cache),
    );

    let runner = JobRunner::new(
        engine,
        checkpoints,
        Some(Box::new(LogSink)),
        params.source_lang.clone(),
        params.target_lang.clone(),
    );

    let job_config = JobConfig {
        job_id: params
            .job_id
            .clone()
            .unwrap_or_else(|| derive_job_id(&params.input, &params.output)),
        input_file: params.input.clone(),
        output_file: params.output.clone(),
        format: params.format,
        max_chars: params.max_chars,
        context_window: params.context_window,
        batch_size: params.batch_size,
        dispatcher: DispatcherConfig {
            max_concurrency: params.concurrency,
            max_retries: params.max_retries,
            timeout: std::time::Duration::from_secs(params.timeout),
        },
        stem_mode: params.stem,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
    let report = runtime.block_on(runner.run(&job_config))?;

    if json {
        let value = serde_json::json!({
            "job_id": report.job_id,
            "total_chunks": report.total_chunks,
            "resumed_chunks": report.resumed_chunks,
            "completed": report.stats.completed,
            "failed": report.stats.failed,
            "retried": report.stats.retried,
            "cache_hits": report.stats.cache_hits,
            "preservation_rate": report.preservation_rate,
            "failed_chunks": report.failed_chunks,
            "output": report.output_path.display().to_string(),
            "elapsed_secs": report.elapsed.as_secs_f64(),
        });
        return Ok(format!("{value:#}\n"));
    }

    let mut out = String::new();
    let _ = writeln!(out, "Job {} finished", report.job_id);
    let _ = writeln!(
        out,
        "  chunks: {} total, {} translated, {} resumed, {} failed",
        report.total_chunks, report.stats.completed, report.resumed_chunks, report.stats.failed
    );
    let _ = writeln!(out, "  cache hits: {}", report.stats.cache_hits);
    let _ = writeln!(
        out,
        "  preservation rate: {:.1}%",
        report.preservation_rate * 100.0
    );
    let _ = writeln!(out, "  output: {}", report.output_path.display());
    if !report.failed_chunks.is_empty() {
        let _ = writeln!(out, "  failed chunk ids: {:?}", report.failed_chunks);
    }
    Ok(out)
}

fn run_resume(data_dir: &Path, job_id: &str, json: bool) -> Result<String> {
    let store = CheckpointStore::open(data_dir.join("checkpoints.db"))?;
    let Some(info) = store.resume_info(job_id)? else {
        return Err(crate::error::StorageError::CheckpointNotFound {
            job_id: job_id.to_string(),
        }
        .into());
    };

    if json {
        let value = serde_json::to_value(&info).map_err(crate::error::StorageError::from)?;
        return Ok(format!("{value:#}\n"));
    }
    Ok(format!(
        "Job {}: {}/{} chunks done ({:.1}%), {} remaining. Re-run `translate` with --job-id {} to continue.\n",
        info.job_id,
        info.completed_chunks,
        info.total_chunks,
        info.completion_percentage * 100.0,
        info.remaining_chunks,
        info.job_id,
    ))
}

fn run_checkpoints(data_dir: &Path, action: &CheckpointAction, json: bool) -> Result<String> {
    let mut store = CheckpointStore::open(data_dir.join("checkpoints.db"))?;
    match action {
        CheckpointAction::List { limit } => {
            let states = store.list(*limit)?;
            if json {
                let rows: Vec<_> = states
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "job_id": s.job_id,
                            "total_chunks": s.total_chunks,
                            "completed": s.completed_chunk_ids.len(),
                            "updated_at": s.updated_at,
                        })
                    })
                    .collect();
                return Ok(format!("{:#}\n", serde_json::Value::Array(rows)));
            }
            if states.is_empty() {
                return Ok("No checkpoints.\n".to_string());
            }
            let mut out = String::new();
            for state in states {
                let _ = writeln!(
                    out,
                    "{}  {}/{} chunks  {} -> {}",
                    state.job_id,
                    state.completed_chunk_ids.len(),
                    state.total_chunks,
                    state.input_file,
                    state.output_file,
                );
            }
            Ok(out)
        }
        CheckpointAction::Delete { job_id } => {
            let deleted = store.delete(job_id)?;
            Ok(if deleted {
                format!("Deleted checkpoint {job_id}\n")
            } else {
                format!("No checkpoint for {job_id}\n")
            })
        }
        CheckpointAction::Cleanup { days } => {
            let removed = store.cleanup_older_than(*days)?;
            Ok(format!("Removed {removed} checkpoints older than {days} days\n"))
        }
    }
}

fn run_tm(data_dir: &Path, action: &TmAction, json: bool) -> Result<String> {
    let mut tm = TranslationMemory::open(data_dir.join("tm.db"))?;
    match action {
        TmAction::Stats => {
            let stats = tm.statistics()?;
            if json {
                let value =
                    serde_json::to_value(&stats).map_err(crate::error::StorageError::from)?;
                return Ok(format!("{value:#}\n"));
            }
            let mut out = String::new();
            let _ = writeln!(out, "Segments: {}", stats.total_segments);
            let _ = writeln!(out, "Average quality: {:.3}", stats.avg_quality);
            let _ = writeln!(
                out,
                "Used: {} segments, {} total uses",
                stats.segments_used, stats.total_uses
            );
            for (pair, count) in &stats.by_language_pair {
                let _ = writeln!(out, "  {pair}: {count}");
            }
            for (domain, count) in &stats.by_domain {
                let _ = writeln!(out, "  [{domain}] {count}");
            }
            Ok(out)
        }
        TmAction::Clear { domain } => {
            let removed = match domain {
                Some(domain) => tm.clear_domain(domain)?,
                None => tm.clear_all()?,
            };
            Ok(format!("Removed {removed} segments\n"))
        }
    }
}

fn run_detect(input: &Path, json: bool) -> Result<String> {
    let text = DocumentReader::new().read(input)?;
    let regions = crate::stem::detect_regions(&text);

    if json {
        let value = serde_json::to_value(&regions).map_err(crate::error::StorageError::from)?;
        return Ok(format!("{value:#}\n"));
    }

    if regions.is_empty() {
        return Ok("No protected regions detected.\n".to_string());
    }
    let mut out = String::new();
    for region in &regions {
        let preview: String = region.content.chars().take(60).collect();
        let _ = writeln!(
            out,
            "{:?} [{}..{}): {preview}",
            region.kind, region.start, region.end
        );
    }
    Ok(out)
}

/// Deterministic job id from the input and output paths.
fn derive_job_id(input: &Path, output: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.display().to_string().as_bytes());
    hasher.update(b"->");
    hasher.update(output.display().to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("job_{hex}")
}

/// Reads the provider's API key from the environment.
fn resolve_api_key(provider: &str) -> Result<String> {
    let var = match provider.to_lowercase().as_str() {
        "openai" => "OPENAI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        other => {
            return Err(ProviderError::UnsupportedProvider {
                name: other.to_string(),
            }
            .into());
        }
    };
    std::env::var(var).map_err(|_| {
        ProviderError::ApiKeyMissing {
            provider: provider.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_derive_job_id_stable() {
        let a = derive_job_id(Path::new("in.txt"), Path::new("out.txt"));
        let b = derive_job_id(Path::new("in.txt"), Path::new("out.txt"));
        let c = derive_job_id(Path::new("in.txt"), Path::new("other.txt"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("job_"));
    }

    #[test]
    fn test_resolve_api_key_unknown_provider() {
        assert!(resolve_api_key("cohere").is_err());
    }

    #[test]
    fn test_detect_command() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let input = dir.path().join("doc.txt");
        let _ = std::fs::write(&input, "The relation $a=b$ holds.");

        let cli = Cli::try_parse_from([
            "doctrans",
            "detect",
            input.to_str().unwrap_or("doc.txt"),
        ]);
        assert!(cli.is_ok());
        if let Ok(cli) = cli {
            let output = execute(&cli);
            assert!(output.is_ok());
            if let Ok(output) = output {
                assert!(output.contains("FormulaInline"));
            }
        }
    }

    #[test]
    fn test_checkpoints_list_empty() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let cli = Cli::try_parse_from([
            "doctrans",
            "--data-dir",
            dir.path().to_str().unwrap_or("."),
            "checkpoints",
            "list",
        ]);
        assert!(cli.is_ok());
        if let Ok(cli) = cli {
            let output = execute(&cli);
            assert!(output.is_ok_and(|o| o.contains("No checkpoints")));
        }
    }

    #[test]
    fn test_resume_missing_job() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let cli = Cli::try_parse_from([
            "doctrans",
            "--data-dir",
            dir.path().to_str().unwrap_or("."),
            "resume",
            "ghost",
        ]);
        assert!(cli.is_ok());
        if let Ok(cli) = cli {
            assert!(execute(&cli).is_err());
        }
    }
}
