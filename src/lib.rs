//! # doctrans
//!
//! STEM-aware document translation pipeline.
//!
//! doctrans turns long technical documents into translated DOCX, PDF, or
//! plain-text output by orchestrating an LLM translation provider: it
//! chunks text without splitting formulas or code, reuses prior work
//! through a translation memory and a content-addressed chunk cache, runs
//! provider calls under bounded concurrency with retry and cancellation,
//! scores every translation, checkpoints progress for crash-safe resume,
//! and streams the output document in memory-bounded batches.
//!
//! ## Features
//!
//! - **Protected regions**: formulas, code, and chemical formulas survive
//!   translation byte-for-byte via placeholder substitution
//! - **Lookup caches**: exact and fuzzy translation memory plus a
//!   content-addressed chunk cache, both `SQLite`-backed
//! - **Bounded dispatch**: semaphore-gated provider calls with jittered
//!   exponential backoff and cooperative cancellation
//! - **Crash-safe resume**: per-job checkpoints of completed chunks
//! - **Streaming output**: DOCX/PDF/TXT built batch by batch

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod cache;
pub mod checkpoint;
pub mod chunking;
pub mod cli;
pub mod core;
pub mod error;
pub mod glossary;
pub mod io;
pub mod memory;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod quality;
pub mod stem;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{ProcessingStats, ProtectedRegion, RegionKind, TranslationChunk, TranslationResult};

// Re-export pipeline types
pub use pipeline::{
    CancellationFlag, DispatcherConfig, EngineConfig, JobConfig, JobReport, JobRunner,
    ParallelDispatcher, TranslatorEngine,
};

// Re-export chunking types
pub use chunking::SmartChunker;

// Re-export storage types
pub use cache::ChunkCache;
pub use checkpoint::{CheckpointState, CheckpointStore};
pub use memory::{TmSegment, TranslationMemory};

// Re-export STEM types
pub use stem::{CodeDetector, FormulaDetector, PlaceholderManager, detect_regions};

// Re-export quality types
pub use quality::{Domain, QualityValidator};

// Re-export provider types
pub use provider::{ProviderConfig, TranslationProvider, create_provider};

// Re-export output types
pub use output::{DocumentWriter, OutputFormat, create_writer};

// Re-export merger
pub use merge::OverlapMerger;

// Re-export CLI types
pub use cli::{Cli, Commands, execute};
