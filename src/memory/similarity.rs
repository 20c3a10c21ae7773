//! String similarity scoring for fuzzy TM matches.
//!
//! The composite weighs normalized edit distance at 0.4, character-bigram
//! Jaccard at 0.3, and word-set Jaccard at 0.3.

use std::collections::HashSet;

/// Stop words excluded from FTS keyword extraction.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "was", "are", "were",
];

/// Weighted composite similarity in `[0, 1]`.
///
/// Inputs are lowercased and trimmed before scoring; identical strings
/// short-circuit to 1.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn composite_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let lev = 1.0 - levenshtein(&a, &b) as f64 / max_len as f64;

    lev * 0.4 + bigram_jaccard(&a, &b) * 0.3 + word_jaccard(&a, &b) * 0.3
}

/// Levenshtein edit distance over chars, single-row dynamic program.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.len() < b_chars.len() {
        return levenshtein(b, a);
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    for (i, ca) in a_chars.iter().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b_chars.iter().enumerate() {
            let insertions = previous[j + 1] + 1;
            let deletions = current[j] + 1;
            let substitutions = previous[j] + usize::from(ca != cb);
            current.push(insertions.min(deletions).min(substitutions));
        }
        previous = current;
    }
    previous[b_chars.len()]
}

/// Jaccard similarity over character bigrams.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bigram_jaccard(a: &str, b: &str) -> f64 {
    let bigrams = |s: &str| -> HashSet<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let set_a = bigrams(a);
    let set_b = bigrams(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Jaccard similarity over word sets.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn word_jaccard(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect()
    };
    let set_a = words(a);
    let set_b = words(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Extracts keywords for FTS candidate retrieval: lowercased alphanumeric
/// tokens longer than two characters, stop words removed, order preserved.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basic() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_levenshtein_unicode() {
        assert_eq!(levenshtein("chào", "chao"), 1);
    }

    #[test]
    fn test_bigram_jaccard() {
        assert!((bigram_jaccard("night", "night") - 1.0).abs() < f64::EPSILON);
        assert!(bigram_jaccard("night", "nacht") < 1.0);
        assert!((bigram_jaccard("a", "b") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_word_jaccard() {
        assert!((word_jaccard("the cat sat", "the cat sat") - 1.0).abs() < f64::EPSILON);
        let partial = word_jaccard("the cat sat", "the dog sat");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn test_composite_identical() {
        assert!((composite_similarity("Hello world", "Hello world") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_composite_close_strings() {
        let sim = composite_similarity("Hello", "Hello!");
        assert!(sim >= 0.7, "similarity was {sim}");
    }

    #[test]
    fn test_composite_distant_strings() {
        let sim = composite_similarity("Hello world", "Completely unrelated text");
        assert!(sim < 0.5);
    }

    #[test]
    fn test_composite_empty() {
        assert!((composite_similarity("", "abc") - 0.0).abs() < f64::EPSILON);
        assert!((composite_similarity("abc", "   ") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_composite_case_insensitive() {
        let sim = composite_similarity("HELLO WORLD", "hello world");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_keywords() {
        let keywords = extract_keywords("The quick brown fox jumps over the lazy dog");
        assert!(!keywords.contains(&"the".to_string()));
        assert!(keywords.contains(&"quick".to_string()));
        assert!(keywords.contains(&"fox".to_string()));
    }

    #[test]
    fn test_extract_keywords_short_dropped() {
        let keywords = extract_keywords("go to an it");
        assert!(keywords.is_empty());
    }
}
