//! Context-aware chunker with STEM protection.
//!
//! Two modes share one type. The plain mode accumulates paragraphs and
//! flushes when the next one would overflow, recording the flushed chunk's
//! last paragraph as overlap context for the chunk that follows. The STEM
//! mode advances a cursor through the raw text and picks split points that
//! never land inside a protected region, extending a chunk past the size
//! limit when a formula or code block demands it.

use crate::chunking::{DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_CHARS, MIN_SENTENCE_LEN, find_char_boundary};
use crate::core::{ProtectedRegion, TranslationChunk, TranslationChunkBuilder};
use crate::error::{ChunkingError, Result};
use regex::Regex;

/// Splits documents into translation chunks.
///
/// # Examples
///
/// ```
/// use doctrans::chunking::SmartChunker;
///
/// let chunker = SmartChunker::new(2000, 200).unwrap();
/// let chunks = chunker.create_chunks("One paragraph.\n\nAnother paragraph.").unwrap();
/// assert_eq!(chunks.len(), 1);
/// ```
#[derive(Debug)]
pub struct SmartChunker {
    max_chars: usize,
    context_window: usize,
    paragraph_break: Regex,
    sentence_end: Regex,
}

/// Working state of the paragraph accumulator.
struct AccumulatorState {
    chunks: Vec<TranslationChunk>,
    /// Indices into the paragraph list accumulated for the next chunk.
    current: Vec<usize>,
    chunk_id: u64,
    pending_overlap: usize,
}

impl SmartChunker {
    /// Creates a chunker with the given chunk size and context width.
    ///
    /// # Errors
    ///
    /// Returns an error when `max_chars` is zero or the context window is
    /// not smaller than the chunk size.
    #[allow(clippy::unwrap_used)]
    pub fn new(max_chars: usize, context_window: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(ChunkingError::InvalidConfig {
                reason: "max_chars must be > 0".to_string(),
            }
            .into());
        }
        if context_window >= max_chars {
            return Err(ChunkingError::ContextWindowTooLarge {
                window: context_window,
                max_chars,
            }
            .into());
        }
        Ok(Self {
            max_chars,
            context_window,
            paragraph_break: Regex::new(r"\n\s*\n").unwrap(),
            sentence_end: Regex::new(r"[.!?]\s+").unwrap(),
        })
    }

    /// Creates a chunker with the default size and context width.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_MAX_CHARS, DEFAULT_CONTEXT_WINDOW)
    }

    /// Maximum characters per chunk.
    #[must_use]
    pub const fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Splits text into chunks along paragraph boundaries.
    ///
    /// # Errors
    ///
    /// Currently infallible after construction; the `Result` keeps the
    /// signature uniform with the STEM path.
    pub fn create_chunks(&self, text: &str) -> Result<Vec<TranslationChunk>> {
        let paragraphs = self.split_into_paragraphs(text);
        let mut state = AccumulatorState {
            chunks: Vec::new(),
            current: Vec::new(),
            chunk_id: 1,
            pending_overlap: 0,
        };
        let mut current_len = 0usize;

        let mut idx = 0usize;
        while idx < paragraphs.len() {
            let para = paragraphs[idx].as_str();
            let para_len = para.len();

            if para_len > self.max_chars {
                // Flush whatever is accumulated, then split the long
                // paragraph by sentences.
                self.flush_accumulator(&mut state, &paragraphs, idx);
                current_len = 0;

                let sentences = self.split_into_sentences(para);
                for (s_idx, sentence) in sentences.iter().enumerate() {
                    if sentence.len() > self.max_chars {
                        // Hard-cut an ultra-long sentence into max-sized
                        // pieces; nothing is dropped.
                        let mut start = 0usize;
                        while start < sentence.len() {
                            let end =
                                find_char_boundary(sentence, (start + self.max_chars).min(sentence.len()));
                            let end = if end <= start { sentence.len() } else { end };
                            let after = &sentence[end..];
                            let after_excerpt =
                                &after[..find_char_boundary(after, self.context_window)];
                            state.chunks.push(
                                TranslationChunkBuilder::new(state.chunk_id, &sentence[start..end])
                                    .context_after(after_excerpt)
                                    .build(),
                            );
                            state.chunk_id += 1;
                            start = end;
                        }
                    } else {
                        let before = if s_idx > 0 {
                            Self::tail_excerpt(&sentences[s_idx - 1], self.context_window)
                        } else {
                            ""
                        };
                        let after = if s_idx + 1 < sentences.len() {
                            Self::head_excerpt(&sentences[s_idx + 1], self.context_window)
                        } else {
                            ""
                        };
                        state.chunks.push(
                            TranslationChunkBuilder::new(state.chunk_id, sentence.as_str())
                                .context_before(before)
                                .context_after(after)
                                .build(),
                        );
                        state.chunk_id += 1;
                    }
                }
                idx += 1;
            } else if current_len + para_len > self.max_chars && !state.current.is_empty() {
                self.flush_accumulator(&mut state, &paragraphs, idx);
                state.current.push(idx);
                current_len = para_len;
                idx += 1;
            } else {
                state.current.push(idx);
                current_len += para_len;
                idx += 1;
            }
        }

        let end = paragraphs.len();
        self.flush_accumulator(&mut state, &paragraphs, end);
        Ok(state.chunks)
    }

    /// Flushes the paragraph accumulator into a chunk, recording the
    /// flushed chunk's last paragraph as the next chunk's overlap.
    fn flush_accumulator(
        &self,
        state: &mut AccumulatorState,
        paragraphs: &[String],
        end_idx: usize,
    ) {
        if state.current.is_empty() {
            return;
        }
        let paras: Vec<&str> = state
            .current
            .iter()
            .filter_map(|&i| paragraphs.get(i).map(String::as_str))
            .collect();
        let last_para_len = paras.last().map_or(0, |p| p.len());
        let start_idx = end_idx - paras.len();

        let chunk = self.build_paragraph_chunk(
            state.chunk_id,
            &paras,
            paragraphs,
            start_idx,
            end_idx,
            state.pending_overlap,
        );
        state.chunks.push(chunk);
        state.chunk_id += 1;
        state.pending_overlap = last_para_len;
        state.current.clear();
    }

    /// Splits text into chunks that never cut through a protected region.
    ///
    /// The regions must be sorted and non-overlapping, as the detectors
    /// produce them. A chunk may exceed `max_chars` when a region demands
    /// it: preserving STEM content outranks the size limit.
    ///
    /// # Errors
    ///
    /// Currently infallible after construction.
    pub fn create_stem_chunks(
        &self,
        text: &str,
        regions: &[ProtectedRegion],
    ) -> Result<Vec<TranslationChunk>> {
        let mut chunks = Vec::new();
        let mut chunk_id = 1u64;
        let mut cursor = 0usize;

        while cursor < text.len() {
            let proposed_end = find_char_boundary(text, (cursor + self.max_chars).min(text.len()));
            let iteration_start = cursor;

            let split_point = self.find_safe_split_point(text, cursor, proposed_end, regions);
            let raw = &text[cursor..split_point];
            let trimmed = raw.trim();

            if !trimmed.is_empty() {
                let context_before = if cursor > 0 {
                    let start = find_char_boundary(text, cursor.saturating_sub(self.context_window));
                    &text[start..cursor]
                } else {
                    ""
                };
                let after_end =
                    find_char_boundary(text, (split_point + self.context_window).min(text.len()));
                let context_after = &text[split_point..after_end];

                let formula_count = regions
                    .iter()
                    .filter(|r| r.start >= cursor && r.end <= split_point && r.kind.is_formula())
                    .count();
                let code_count = regions
                    .iter()
                    .filter(|r| r.start >= cursor && r.end <= split_point && r.kind.is_code())
                    .count();

                chunks.push(
                    TranslationChunkBuilder::new(chunk_id, raw)
                        .context_before(context_before)
                        .context_after(context_after)
                        .metadata("stem_mode", "true")
                        .metadata("formula_count", formula_count.to_string())
                        .metadata("code_count", code_count.to_string())
                        .build(),
                );
                chunk_id += 1;
            }

            cursor = split_point;

            // Degenerate input: force one character of progress so the loop
            // always terminates.
            if split_point == iteration_start {
                let mut next = cursor + 1;
                while next < text.len() && !text.is_char_boundary(next) {
                    next += 1;
                }
                cursor = next.min(text.len());
            }
        }

        Ok(chunks)
    }

    /// Finds a split point in `(start, proposed_end]` that respects the
    /// protected regions.
    ///
    /// Priority: before the region when it starts inside the chunk, else
    /// past the region's end (the chunk grows), else the last paragraph
    /// boundary, else the last sentence boundary, else the proposal.
    fn find_safe_split_point(
        &self,
        text: &str,
        start: usize,
        proposed_end: usize,
        regions: &[ProtectedRegion],
    ) -> usize {
        for region in regions {
            // Proposed split lands inside a region.
            if region.start < proposed_end && proposed_end < region.end {
                if region.start > start {
                    return region.start;
                }
                return region.end.min(text.len());
            }

            // A region longer than the chunk budget that overlaps the
            // window at all swallows the chunk up to its end.
            if region.len() > self.max_chars && region.intersects(start, proposed_end) {
                if region.start <= start && start < region.end {
                    return region.end.min(text.len());
                }
                if start < region.start && region.start < proposed_end {
                    return region.end.min(text.len());
                }
            }
        }

        let search = &text[start..proposed_end];
        if let Some(m) = self.paragraph_break.find_iter(search).last() {
            return start + m.end();
        }
        if let Some(m) = self.sentence_end.find_iter(search).last() {
            return start + m.end();
        }
        proposed_end
    }

    /// Splits text into paragraphs on blank lines or tab-indented breaks.
    fn split_into_paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_break
            .split(text)
            .flat_map(|block| block.split("\n\t"))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Splits a paragraph into sentences, merging fragments shorter than
    /// [`MIN_SENTENCE_LEN`].
    ///
    /// Boundaries are Latin (`.!?`) or CJK (`。！？`) sentence enders
    /// followed by whitespace and an uppercase or CJK character.
    fn split_into_sentences(&self, text: &str) -> Vec<String> {
        let mut raw: Vec<String> = Vec::new();
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut piece_start = 0usize;

        let mut i = 0usize;
        while i < chars.len() {
            let (_, c) = chars[i];
            if matches!(c, '.' | '!' | '?' | '。' | '！' | '？') {
                // Consume the whitespace run after the ender.
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
                if j > i + 1 && j < chars.len() {
                    let next = chars[j].1;
                    let cjk = ('\u{4E00}'..='\u{9FFF}').contains(&next);
                    if next.is_ascii_uppercase() || cjk {
                        let end = chars[i].0 + c.len_utf8();
                        raw.push(text[piece_start..end].to_string());
                        piece_start = chars[j].0;
                        i = j;
                        continue;
                    }
                }
            }
            i += 1;
        }
        if piece_start < text.len() {
            raw.push(text[piece_start..].to_string());
        }

        // Merge very short fragments forward.
        let mut merged: Vec<String> = Vec::new();
        let mut buffer = String::new();
        for sentence in raw {
            if buffer.len() + sentence.len() < MIN_SENTENCE_LEN {
                if buffer.is_empty() {
                    buffer = sentence;
                } else {
                    buffer.push(' ');
                    buffer.push_str(&sentence);
                }
            } else {
                if !buffer.is_empty() {
                    merged.push(buffer.trim().to_string());
                }
                buffer = sentence;
            }
        }
        if !buffer.is_empty() {
            merged.push(buffer.trim().to_string());
        }
        merged
    }

    fn build_paragraph_chunk(
        &self,
        chunk_id: u64,
        chunk_paras: &[&str],
        all_paras: &[String],
        start_idx: usize,
        end_idx: usize,
        overlap_char_count: usize,
    ) -> TranslationChunk {
        let context_before = if start_idx > 0 {
            Self::tail_excerpt(&all_paras[start_idx - 1], self.context_window)
        } else {
            ""
        };
        let context_after = if end_idx < all_paras.len() {
            Self::head_excerpt(&all_paras[end_idx], self.context_window)
        } else {
            ""
        };

        TranslationChunkBuilder::new(chunk_id, chunk_paras.join("\n\n"))
            .context_before(context_before)
            .context_after(context_after)
            .overlap_char_count(overlap_char_count)
            .build()
    }

    /// Last `width` characters of a string, char-boundary safe.
    fn tail_excerpt(s: &str, width: usize) -> &str {
        if s.len() <= width {
            return s;
        }
        let mut start = s.len() - width;
        while start < s.len() && !s.is_char_boundary(start) {
            start += 1;
        }
        &s[start..]
    }

    /// First `width` characters of a string, char-boundary safe.
    fn head_excerpt(s: &str, width: usize) -> &str {
        &s[..find_char_boundary(s, width)]
    }
}
