//! Terminology management for consistent translations.
//!
//! A glossary maps source-language terms to their mandated target-language
//! renderings. It contributes a section to the translation prompt and a
//! validation dimension that penalizes missed terms.

use crate::error::{IoError, Result};
use crate::quality::Domain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Maximum terms included in a prompt section, to bound token use.
const PROMPT_TERM_CAP: usize = 50;

/// Serialized glossary file format.
#[derive(Debug, Serialize, Deserialize)]
struct GlossaryFile {
    #[serde(default)]
    version: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    terms: BTreeMap<String, String>,
}

/// A domain-tagged source → target term table.
///
/// # Examples
///
/// ```
/// use doctrans::glossary::Glossary;
/// use doctrans::quality::Domain;
///
/// let mut glossary = Glossary::new(Domain::Technology);
/// glossary.add_term("cache", "bộ nhớ đệm");
/// assert!(glossary.prompt_section().contains("bộ nhớ đệm"));
/// ```
#[derive(Debug, Clone)]
pub struct Glossary {
    domain: Domain,
    description: String,
    terms: BTreeMap<String, String>,
}

impl Glossary {
    /// Creates an empty glossary for a domain.
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            description: String::new(),
            terms: BTreeMap::new(),
        }
    }

    /// Loads a glossary from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file: GlossaryFile =
            serde_json::from_str(&raw).map_err(crate::error::StorageError::from)?;
        let domain = file.domain.parse().unwrap_or_default();
        Ok(Self {
            domain,
            description: file.description,
            terms: file.terms,
        })
    }

    /// Merges terms from another glossary file; later entries win.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or not valid JSON.
    pub fn merge_from(&mut self, path: &Path) -> Result<()> {
        let other = Self::load(path)?;
        self.terms.extend(other.terms);
        if other.domain != Domain::Default {
            self.domain = other.domain;
        }
        Ok(())
    }

    /// Saves the glossary as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = GlossaryFile {
            version: "1.0".to_string(),
            domain: self.domain.name().to_string(),
            description: self.description.clone(),
            terms: self.terms.clone(),
        };
        let json =
            serde_json::to_string_pretty(&file).map_err(crate::error::StorageError::from)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Adds or replaces a term.
    pub fn add_term(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.terms.insert(source.into(), target.into());
    }

    /// Removes a term.
    pub fn remove_term(&mut self, source: &str) {
        self.terms.remove(source);
    }

    /// The glossary's domain tag.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the glossary has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Borrow the term table.
    #[must_use]
    pub const fn terms(&self) -> &BTreeMap<String, String> {
        &self.terms
    }

    /// Builds the mandatory-terminology prompt section, capped at
    /// [`PROMPT_TERM_CAP`] terms. Empty string when there are no terms.
    #[must_use]
    pub fn prompt_section(&self) -> String {
        if self.terms.is_empty() {
            return String::new();
        }
        let mut lines = vec!["MANDATORY TERMINOLOGY:".to_string()];
        for (source, target) in self.terms.iter().take(PROMPT_TERM_CAP) {
            lines.push(format!("- {source} → {target}"));
        }
        lines.join("\n")
    }

    /// Checks term adherence: for each source term present in the source
    /// text (word-bounded, case-insensitive) whose target rendering is
    /// absent from the translation, subtract 0.1 and emit a warning.
    #[must_use]
    pub fn validate(&self, source: &str, translated: &str) -> (f64, Vec<String>) {
        let mut score: f64 = 1.0;
        let mut warnings = Vec::new();
        let translated_lower = translated.to_lowercase();

        for (term, target) in &self.terms {
            if contains_word_ci(source, term) && !translated_lower.contains(&target.to_lowercase())
            {
                warnings.push(format!("Missing term: {term} → {target}"));
                score -= 0.1;
            }
        }

        (score.max(0.0), warnings)
    }
}

/// Case-insensitive word-bounded containment.
fn contains_word_ci(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    let mut rest = haystack.as_str();
    while let Some(pos) = rest.find(&needle) {
        let before_ok = {
            let before = &rest[..pos];
            before.chars().next_back().is_none_or(|c| !c.is_alphanumeric())
        };
        let after_ok = rest[pos + needle.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        rest = &rest[pos + 1..];
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_prompt_section() {
        let mut glossary = Glossary::new(Domain::Technology);
        glossary.add_term("cache", "bộ nhớ đệm");
        glossary.add_term("thread", "luồng");

        let section = glossary.prompt_section();
        assert!(section.starts_with("MANDATORY TERMINOLOGY:"));
        assert!(section.contains("- cache → bộ nhớ đệm"));
        assert!(section.contains("- thread → luồng"));
    }

    #[test]
    fn test_empty_prompt_section() {
        let glossary = Glossary::new(Domain::Default);
        assert!(glossary.prompt_section().is_empty());
    }

    #[test]
    fn test_prompt_section_capped() {
        let mut glossary = Glossary::new(Domain::Default);
        for i in 0..80 {
            glossary.add_term(format!("term{i:02}"), format!("thuật ngữ {i}"));
        }
        let section = glossary.prompt_section();
        // Header plus at most 50 term lines.
        assert_eq!(section.lines().count(), 51);
    }

    #[test]
    fn test_validate_missing_term() {
        let mut glossary = Glossary::new(Domain::Default);
        glossary.add_term("cache", "bộ nhớ đệm");

        let (score, warnings) =
            glossary.validate("Flush the cache now.", "Xóa vùng lưu trữ ngay.");
        assert!((score - 0.9).abs() < 1e-9);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_validate_present_term() {
        let mut glossary = Glossary::new(Domain::Default);
        glossary.add_term("cache", "bộ nhớ đệm");

        let (score, warnings) =
            glossary.validate("Flush the cache now.", "Xóa bộ nhớ đệm ngay.");
        assert!((score - 1.0).abs() < f64::EPSILON);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_word_bounded() {
        let mut glossary = Glossary::new(Domain::Default);
        glossary.add_term("cat", "mèo");

        // "concatenate" must not trigger the "cat" term.
        let (score, warnings) = glossary.validate("We concatenate strings.", "Chúng tôi nối chuỗi.");
        assert!((score - 1.0).abs() < f64::EPSILON, "warnings: {warnings:?}");
    }

    #[test]
    fn test_validate_case_insensitive() {
        let mut glossary = Glossary::new(Domain::Default);
        glossary.add_term("Cache", "bộ nhớ đệm");

        let (_, warnings) = glossary.validate("the CACHE is full", "Bộ Nhớ Đệm đã đầy");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let path = dir.path().join("tech.json");

        let mut glossary = Glossary::new(Domain::Technology);
        glossary.add_term("compiler", "trình biên dịch");
        assert!(glossary.save(&path).is_ok());

        let loaded = Glossary::load(&path);
        assert!(loaded.is_ok());
        if let Ok(loaded) = loaded {
            assert_eq!(loaded.domain(), Domain::Technology);
            assert_eq!(
                loaded.terms().get("compiler").map(String::as_str),
                Some("trình biên dịch")
            );
        }
    }

    #[test]
    fn test_merge_from() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let path = dir.path().join("extra.json");

        let mut extra = Glossary::new(Domain::Medical);
        extra.add_term("dose", "liều");
        assert!(extra.save(&path).is_ok());

        let mut base = Glossary::new(Domain::Default);
        base.add_term("dose", "liều lượng");
        assert!(base.merge_from(&path).is_ok());

        // Later file wins, and the non-default domain is adopted.
        assert_eq!(base.terms().get("dose").map(String::as_str), Some("liều"));
        assert_eq!(base.domain(), Domain::Medical);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Glossary::load(Path::new("/nonexistent/glossary.json"));
        assert!(result.is_err());
    }
}
