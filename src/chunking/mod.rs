//! Text chunking for translation.
//!
//! Splits documents into translation-sized units that respect paragraph and
//! sentence boundaries and never cut through protected STEM content.

mod smart;

pub use smart::SmartChunker;

/// Default maximum characters per chunk.
pub const DEFAULT_MAX_CHARS: usize = 2000;

/// Default context excerpt width, in characters.
pub const DEFAULT_CONTEXT_WINDOW: usize = 200;

/// Sentences shorter than this are merged with their neighbor when a long
/// paragraph is split.
pub(crate) const MIN_SENTENCE_LEN: usize = 50;

/// Clamps a byte position down to the nearest UTF-8 character boundary.
#[must_use]
pub(crate) fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut boundary = pos;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_char_boundary() {
        let s = "Hello 世界!";
        assert_eq!(find_char_boundary(s, 6), 6);
        assert_eq!(find_char_boundary(s, 7), 6);
        assert_eq!(find_char_boundary(s, 8), 6);
        assert_eq!(find_char_boundary(s, 9), 9);
        assert_eq!(find_char_boundary(s, 100), s.len());
    }
}
