//! Translation memory: durable reuse of prior translations.
//!
//! Exact reuse is a content-hash lookup; fuzzy reuse retrieves candidates
//! through full-text search and rescores them with a weighted composite of
//! edit distance, character bigrams, and word overlap.

mod segment;
mod similarity;
mod store;

pub use segment::{MatchKind, TmMatch, TmSegment, source_hash};
pub(crate) use segment::now_secs;
pub use similarity::{bigram_jaccard, composite_similarity, extract_keywords, levenshtein, word_jaccard};
pub use store::{TmStatistics, TranslationMemory};
