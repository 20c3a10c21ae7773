//! Argument parsing via clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// STEM-aware document translation pipeline.
#[derive(Debug, Parser)]
#[command(name = "doctrans", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the translation memory, chunk cache, and
    /// checkpoint databases.
    #[arg(long, global = true, default_value = ".doctrans")]
    pub data_dir: PathBuf,

    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Translate a document.
    Translate {
        /// Input document path.
        input: PathBuf,
        /// Output document path.
        output: PathBuf,
        /// Output format: txt, docx, or pdf.
        #[arg(long, default_value = "txt")]
        to: String,
        /// Source language code.
        #[arg(long, default_value = "en")]
        source_lang: String,
        /// Target language code.
        #[arg(long, default_value = "vi")]
        target_lang: String,
        /// Validation domain: finance, medical, literature, technology,
        /// or default.
        #[arg(long, default_value = "default")]
        domain: String,
        /// Provider: openai or anthropic.
        #[arg(long, default_value = "openai")]
        provider: String,
        /// Model identifier.
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        /// Glossary JSON file.
        #[arg(long)]
        glossary: Option<PathBuf>,
        /// Maximum characters per chunk.
        #[arg(long, default_value_t = 2000)]
        max_chars: usize,
        /// Context excerpt width in characters.
        #[arg(long, default_value_t = 200)]
        context_window: usize,
        /// Concurrent provider calls.
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
        /// Retry attempts per chunk.
        #[arg(long, default_value_t = 3)]
        max_retries: usize,
        /// Per-call timeout in seconds.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
        /// Chunks per output batch.
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        /// Force STEM-aware chunking on or off; omitted means automatic.
        #[arg(long)]
        stem: Option<bool>,
        /// Job id for checkpointing; defaults to a hash of the paths.
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Show resume information for a checkpointed job.
    Resume {
        /// Job identifier.
        job_id: String,
    },

    /// Inspect or manage job checkpoints.
    Checkpoints {
        /// Checkpoint operation.
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// Inspect or manage the translation memory.
    Tm {
        /// TM operation.
        #[command(subcommand)]
        action: TmAction,
    },

    /// Detect protected regions in a document and print them.
    Detect {
        /// Input document path.
        input: PathBuf,
    },
}

/// Checkpoint subcommands.
#[derive(Debug, Subcommand)]
pub enum CheckpointAction {
    /// List saved checkpoints, newest first.
    List {
        /// Maximum rows.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a job's checkpoint.
    Delete {
        /// Job identifier.
        job_id: String,
    },
    /// Delete checkpoints older than N days.
    Cleanup {
        /// Age threshold in days.
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

/// Translation memory subcommands.
#[derive(Debug, Subcommand)]
pub enum TmAction {
    /// Print TM statistics.
    Stats,
    /// Clear segments, optionally scoped to a domain.
    Clear {
        /// Only clear this domain.
        #[arg(long)]
        domain: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_translate_defaults() {
        let cli = Cli::try_parse_from(["doctrans", "translate", "in.txt", "out.txt"]);
        assert!(cli.is_ok());
        if let Ok(cli) = cli {
            match cli.command {
                Commands::Translate {
                    to,
                    source_lang,
                    target_lang,
                    concurrency,
                    ..
                } => {
                    assert_eq!(to, "txt");
                    assert_eq!(source_lang, "en");
                    assert_eq!(target_lang, "vi");
                    assert_eq!(concurrency, 5);
                }
                _ => panic!("expected translate"),
            }
        }
    }

    #[test]
    fn test_parse_checkpoints_list() {
        let cli = Cli::try_parse_from(["doctrans", "checkpoints", "list", "--limit", "5"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_parse_tm_clear_domain() {
        let cli = Cli::try_parse_from(["doctrans", "tm", "clear", "--domain", "medical"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_parse_unknown_command_fails() {
        let cli = Cli::try_parse_from(["doctrans", "frobnicate"]);
        assert!(cli.is_err());
    }
}
