//! Translation result representation.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// The outcome of translating one chunk.
///
/// `overlap_char_count` is propagated from the originating chunk so the
/// merger can cut duplicated overlap without re-reading the chunk list.
/// Serde round-trips exactly, which is what the checkpoint store relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Id of the source chunk.
    pub chunk_id: u64,

    /// Original source text.
    pub source: String,

    /// Translated text.
    pub translated: String,

    /// Quality score in `[0, 1]`.
    #[serde(default)]
    pub quality_score: f64,

    /// Quality warnings attached by the validator or the engine.
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Overlap bookkeeping copied from the source chunk.
    #[serde(default)]
    pub overlap_char_count: usize,
}

impl TranslationResult {
    /// Creates a result with no score or warnings yet.
    #[must_use]
    pub fn new(chunk_id: u64, source: String, translated: String) -> Self {
        Self {
            chunk_id,
            source,
            translated,
            quality_score: 0.0,
            warnings: Vec::new(),
            overlap_char_count: 0,
        }
    }

    /// Creates a fallback result for a chunk whose translation failed.
    ///
    /// The translated field carries an error marker followed by the source
    /// text so downstream merging still produces a complete document.
    #[must_use]
    pub fn failed(chunk_id: u64, source: String, error: &str, overlap_char_count: usize) -> Self {
        Self {
            chunk_id,
            translated: format!("[TRANSLATION FAILED: {error}]\n{source}"),
            source,
            quality_score: 0.0,
            warnings: vec![format!("Translation failed: {error}")],
            overlap_char_count,
        }
    }

    /// Whether the result met the caching quality bar.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.quality_score >= 0.7
    }

    /// Grapheme-safe preview of the translated text.
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.translated.len() <= max_len {
            return &self.translated;
        }
        let mut end = 0;
        for (offset, grapheme) in self.translated.grapheme_indices(true) {
            if offset + grapheme.len() > max_len {
                break;
            }
            end = offset + grapheme.len();
        }
        &self.translated[..end]
    }
}
