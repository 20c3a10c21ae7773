//! Core domain types for the translation pipeline.
//!
//! Plain value records shared across the detectors, chunker, dispatcher,
//! merger, and writers. No back-pointers: components communicate only
//! through these types.

mod chunk;
mod region;
mod result;
mod stats;

pub use chunk::{TranslationChunk, TranslationChunkBuilder};
pub use region::{ProtectedRegion, RegionKind};
pub(crate) use region::resolve_overlaps;
pub use result::TranslationResult;
pub use stats::{ProcessingStats, TaskStatus};
