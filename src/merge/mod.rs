//! Overlap-aware result merging.
//!
//! Concatenates translated chunks into one text, cutting duplicated
//! overlap at each boundary. The cut is chosen by priority: the chunk's
//! recorded overlap count scaled to the target language, then an exact
//! suffix/prefix match, then a longest-common-substring search, and
//! finally a plain separator join.

use crate::core::TranslationResult;
use regex::Regex;
use std::sync::OnceLock;

/// Exact character-level overlap shorter than this is ignored.
const MIN_EXACT_OVERLAP: usize = 20;
/// Fuzzy (LCS) overlap shorter than this is ignored.
const MIN_FUZZY_OVERLAP: usize = 30;
/// Window, in bytes, searched at each boundary for fuzzy overlap.
const FUZZY_WINDOW: usize = 500;
/// Word-level suffix/prefix search depth.
const MAX_WORD_OVERLAP: usize = 50;

/// Merges translation results in chunk-id order.
///
/// # Examples
///
/// ```
/// use doctrans::core::TranslationResult;
/// use doctrans::merge::OverlapMerger;
///
/// let a = TranslationResult::new(1, String::new(), "Xin chào.".to_string());
/// let b = TranslationResult::new(2, String::new(), "Tạm biệt.".to_string());
/// let merged = OverlapMerger::new(1.2).merge(&[a, b]);
/// assert_eq!(merged, "Xin chào.\n\nTạm biệt.");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OverlapMerger {
    /// Target/source character expansion factor (≈1.3 for en→vi).
    expansion_factor: f64,
}

impl Default for OverlapMerger {
    fn default() -> Self {
        Self::new(1.2)
    }
}

impl OverlapMerger {
    /// Creates a merger with the given expansion factor.
    #[must_use]
    pub const fn new(expansion_factor: f64) -> Self {
        Self { expansion_factor }
    }

    /// Merges results sorted by chunk id into one text.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn merge(&self, results: &[TranslationResult]) -> String {
        if results.is_empty() {
            return String::new();
        }

        let mut sorted: Vec<&TranslationResult> = results.iter().collect();
        sorted.sort_by_key(|r| r.chunk_id);

        let mut merged = sorted[0].translated.trim().to_string();

        for result in &sorted[1..] {
            let current = result.translated.trim();
            if current.is_empty() {
                continue;
            }

            let mut overlap = 0usize;

            // Priority 1: recorded source overlap scaled to the target
            // language, clamped to at most half the chunk.
            if result.overlap_char_count > 0 {
                let estimated =
                    (result.overlap_char_count as f64 * self.expansion_factor).round() as usize;
                overlap = estimated.min(current.chars().count() / 2);
            }

            // Priority 2: exact word- or character-level suffix/prefix.
            if overlap == 0 {
                overlap = find_exact_overlap(&merged, current);
            }

            // Priority 3: longest common substring near the boundary.
            if overlap == 0 {
                overlap = find_fuzzy_overlap(&merged, current, MIN_FUZZY_OVERLAP);
            }

            if overlap > MIN_EXACT_OVERLAP {
                let cut = char_offset(current, overlap);
                merged.push_str(&current[cut..]);
            } else {
                // Priority 4: separator join.
                let sentence_end = merged
                    .chars()
                    .next_back()
                    .is_some_and(|c| matches!(c, '.' | '!' | '?'));
                let upper_start = current.chars().next().is_some_and(char::is_uppercase);
                if sentence_end && upper_start {
                    merged.push_str("\n\n");
                } else {
                    merged.push(' ');
                }
                merged.push_str(current);
            }
        }

        post_process(&merged)
    }
}

/// Byte offset of the `n`-th character, clamped to the string length.
fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Longest exact overlap between the tail of `left` and the head of
/// `right`, returned as a character count of `right`.
///
/// Words are tried first (at least two); characters down to
/// [`MIN_EXACT_OVERLAP`] are the fallback.
fn find_exact_overlap(left: &str, right: &str) -> usize {
    let left_words: Vec<&str> = left.split_whitespace().collect();
    let right_words: Vec<&str> = right.split_whitespace().collect();

    let depth = left_words.len().min(right_words.len()).min(MAX_WORD_OVERLAP);
    for n in (3..=depth).rev() {
        if left_words[left_words.len() - n..] == right_words[..n] {
            let overlap_text = right_words[..n].join(" ");
            return overlap_text.chars().count();
        }
    }

    // Character-level fallback over the boundary window.
    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();
    let max_check = left_chars.len().min(right_chars.len()).min(FUZZY_WINDOW);
    for n in (MIN_EXACT_OVERLAP + 1..=max_check).rev() {
        if left_chars[left_chars.len() - n..] == right_chars[..n] {
            return n;
        }
    }

    0
}

/// Longest common substring between the last ~500 bytes of `left` and the
/// first ~500 bytes of `right`. When the match is at least
/// `min_match_size` characters, everything in `right` up to and including
/// the match is dropped.
fn find_fuzzy_overlap(left: &str, right: &str, min_match_size: usize) -> usize {
    let left_tail: Vec<char> = left
        .chars()
        .rev()
        .take(FUZZY_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let right_head: Vec<char> = right.chars().take(FUZZY_WINDOW).collect();

    if left_tail.is_empty() || right_head.is_empty() {
        return 0;
    }

    // Classic O(n·m) LCS table over the two windows, rolling one row.
    let mut best_len = 0usize;
    let mut best_right_end = 0usize;
    let mut previous = vec![0usize; right_head.len() + 1];
    for lc in &left_tail {
        let mut current = vec![0usize; right_head.len() + 1];
        for (j, rc) in right_head.iter().enumerate() {
            if lc == rc {
                current[j + 1] = previous[j] + 1;
                if current[j + 1] > best_len {
                    best_len = current[j + 1];
                    best_right_end = j + 1;
                }
            }
        }
        previous = current;
    }

    if best_len >= min_match_size {
        best_right_end
    } else {
        0
    }
}

/// Collapses whitespace artifacts and strips stray pipeline markers.
#[must_use]
pub fn post_process(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    static CHUNK_MARKER: OnceLock<Regex> = OnceLock::new();

    #[allow(clippy::unwrap_used)]
    let spaces = SPACES.get_or_init(|| Regex::new(r" +").unwrap());
    #[allow(clippy::unwrap_used)]
    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());
    #[allow(clippy::unwrap_used)]
    let chunk_marker = CHUNK_MARKER.get_or_init(|| Regex::new(r"\[CHUNK \d+\]").unwrap());

    let text = spaces.replace_all(text, " ");
    let text = newlines.replace_all(&text, "\n\n");
    let text = chunk_marker.replace_all(&text, "");
    let text = text.replace("---START---", "").replace("---END---", "");
    text.trim().to_string()
}
