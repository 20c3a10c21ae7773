//! Translation memory segment and match records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A persistent record of one prior translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmSegment {
    /// Row id, assigned by storage.
    pub id: Option<i64>,
    /// Source text.
    pub source: String,
    /// Target text.
    pub target: String,
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Domain tag.
    pub domain: String,
    /// Quality score of the stored translation.
    pub quality_score: f64,
    /// Unix timestamp (seconds) of first insertion.
    pub created_at: f64,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at: f64,
    /// How many times this segment has been served.
    pub use_count: i64,
    /// Context preceding the source at capture time.
    pub context_before: String,
    /// Context following the source at capture time.
    pub context_after: String,
    /// Optional project tag.
    pub project_name: String,
    /// Producer tag (e.g. `openai/gpt-4o`).
    pub created_by: String,
    /// Free-form notes.
    pub notes: String,
}

impl TmSegment {
    /// Creates a segment with defaulted metadata.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        let now = now_secs();
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            domain: "default".to_string(),
            quality_score: 1.0,
            created_at: now,
            updated_at: now,
            use_count: 0,
            context_before: String::new(),
            context_after: String::new(),
            project_name: String::new(),
            created_by: "doctrans".to_string(),
            notes: String::new(),
        }
    }

    /// The segment's uniqueness key.
    #[must_use]
    pub fn hash(&self) -> String {
        source_hash(&self.source_lang, &self.target_lang, &self.source)
    }
}

/// Computes the uniqueness key over `(source_lang, target_lang, source)`.
#[must_use]
pub fn source_hash(source_lang: &str, target_lang: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_lang.as_bytes());
    hasher.update(b":");
    hasher.update(target_lang.as_bytes());
    hasher.update(b":");
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// How a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Content-hash identity.
    Exact,
    /// Similarity above threshold.
    Fuzzy,
}

/// A TM lookup hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmMatch {
    /// The stored segment.
    pub segment: TmSegment,
    /// Similarity against the query, 1.0 for exact hits.
    pub similarity: f64,
    /// How the hit was found.
    pub match_type: MatchKind,
}

/// Current Unix time in fractional seconds.
#[must_use]
pub(crate) fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = source_hash("en", "vi", "Hello");
        let b = source_hash("en", "vi", "Hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_depends_on_langs() {
        let a = source_hash("en", "vi", "Hello");
        let b = source_hash("en", "fr", "Hello");
        let c = source_hash("vi", "en", "Hello");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_segment_hash_matches_free_function() {
        let segment = TmSegment::new("Hello", "Xin chào", "en", "vi");
        assert_eq!(segment.hash(), source_hash("en", "vi", "Hello"));
    }

    #[test]
    fn test_segment_defaults() {
        let segment = TmSegment::new("a", "b", "en", "vi");
        assert_eq!(segment.domain, "default");
        assert_eq!(segment.use_count, 0);
        assert!((segment.quality_score - 1.0).abs() < f64::EPSILON);
        assert!(segment.created_at > 0.0);
    }
}
