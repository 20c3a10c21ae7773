//! Translation execution pipeline.
//!
//! The dispatcher multiplexes chunk translations under a semaphore, the
//! engine executes one chunk end to end (caches → prompt → provider →
//! validation → caches), and the job runner wires both to the chunker,
//! checkpoint store, and streaming writer.

mod dispatch;
mod job;
mod progress;
mod translator;

pub use dispatch::{
    CancellationFlag, DispatchOutcome, DispatcherConfig, ParallelDispatcher, backoff_delay,
};
pub use job::{JobConfig, JobReport, JobRunner};
pub use progress::{NullSink, ProgressEvent, ProgressSink};
pub use translator::{EngineConfig, EngineCounters, TranslatorEngine};
