//! Translation chunk representation.
//!
//! Chunks are segments of document text produced by the chunker. Each chunk
//! carries short excerpts of neighboring text as untranslated context and
//! bookkeeping that lets the merger remove duplicated overlap later.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

/// A unit of text scheduled for translation.
///
/// `context_before` and `context_after` are reference-only: they are shown
/// to the provider but never translated. `overlap_char_count` records how
/// many characters at the head of this chunk's *source* position already
/// appeared at the tail of the previous chunk; the text itself does not
/// repeat them.
///
/// # Examples
///
/// ```
/// use doctrans::core::TranslationChunk;
///
/// let chunk = TranslationChunk::new(1, "Hello world.".to_string());
/// assert_eq!(chunk.estimated_tokens(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationChunk {
    /// Monotonically increasing identifier, 1-based.
    pub id: u64,

    /// The payload text to translate.
    pub text: String,

    /// Excerpt of preceding text, for prompt context only.
    #[serde(default)]
    pub context_before: String,

    /// Excerpt of following text, for prompt context only.
    #[serde(default)]
    pub context_after: String,

    /// Source characters at the head of this chunk's position that already
    /// appeared at the tail of the previous chunk.
    #[serde(default)]
    pub overlap_char_count: usize,

    /// Extensible metadata (e.g. formula/code counts in STEM mode).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl TranslationChunk {
    /// Creates a chunk with no context and no overlap.
    #[must_use]
    pub fn new(id: u64, text: String) -> Self {
        Self {
            id,
            text,
            context_before: String::new(),
            context_after: String::new(),
            overlap_char_count: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Chunk size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the chunk payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Rough token count estimate (~4 characters per token).
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        self.text.len() / 4
    }

    /// Returns a grapheme-safe preview of the chunk text.
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.text.len() <= max_len {
            return &self.text;
        }
        let mut end = 0;
        for (offset, grapheme) in self.text.grapheme_indices(true) {
            if offset + grapheme.len() > max_len {
                break;
            }
            end = offset + grapheme.len();
        }
        &self.text[..end]
    }
}

/// Builder for chunks with context and metadata.
#[derive(Debug, Default)]
pub struct TranslationChunkBuilder {
    id: u64,
    text: String,
    context_before: String,
    context_after: String,
    overlap_char_count: usize,
    metadata: BTreeMap<String, String>,
}

impl TranslationChunkBuilder {
    /// Creates a builder for the given chunk id and text.
    #[must_use]
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sets the preceding context excerpt.
    #[must_use]
    pub fn context_before(mut self, context: impl Into<String>) -> Self {
        self.context_before = context.into();
        self
    }

    /// Sets the following context excerpt.
    #[must_use]
    pub fn context_after(mut self, context: impl Into<String>) -> Self {
        self.context_after = context.into();
        self
    }

    /// Sets the overlap character count.
    #[must_use]
    pub const fn overlap_char_count(mut self, count: usize) -> Self {
        self.overlap_char_count = count;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builds the chunk.
    #[must_use]
    pub fn build(self) -> TranslationChunk {
        TranslationChunk {
            id: self.id,
            text: self.text,
            context_before: self.context_before,
            context_after: self.context_after,
            overlap_char_count: self.overlap_char_count,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_new() {
        let chunk = TranslationChunk::new(1, "Hello".to_string());
        assert_eq!(chunk.id, 1);
        assert_eq!(chunk.text, "Hello");
        assert_eq!(chunk.overlap_char_count, 0);
        assert!(chunk.context_before.is_empty());
    }

    #[test]
    fn test_chunk_token_estimate() {
        let chunk = TranslationChunk::new(1, "Hello, world!".to_string());
        assert_eq!(chunk.estimated_tokens(), 3);
    }

    #[test]
    fn test_chunk_preview() {
        let chunk = TranslationChunk::new(1, "Hello, world!".to_string());
        assert_eq!(chunk.preview(5), "Hello");
        assert_eq!(chunk.preview(100), "Hello, world!");
    }

    #[test]
    fn test_chunk_preview_multibyte() {
        let chunk = TranslationChunk::new(1, "Tiếng Việt".to_string());
        // Must not panic inside the multi-byte 'ê'
        let p = chunk.preview(4);
        assert!(chunk.text.starts_with(p));
    }

    #[test]
    fn test_chunk_builder() {
        let chunk = TranslationChunkBuilder::new(3, "body")
            .context_before("before")
            .context_after("after")
            .overlap_char_count(42)
            .metadata("formula_count", "2")
            .build();

        assert_eq!(chunk.id, 3);
        assert_eq!(chunk.context_before, "before");
        assert_eq!(chunk.context_after, "after");
        assert_eq!(chunk.overlap_char_count, 42);
        assert_eq!(chunk.metadata.get("formula_count").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_chunk_serde_roundtrip() {
        let chunk = TranslationChunkBuilder::new(7, "text")
            .overlap_char_count(10)
            .build();
        let json = serde_json::to_string(&chunk).ok();
        assert!(json.is_some());
        if let Some(json) = json {
            let back: Option<TranslationChunk> = serde_json::from_str(&json).ok();
            assert_eq!(back, Some(chunk));
        }
    }

    #[test]
    fn test_chunk_empty() {
        let chunk = TranslationChunk::new(1, String::new());
        assert!(chunk.is_empty());
        assert_eq!(chunk.len(), 0);
    }
}
