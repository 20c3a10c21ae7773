//! Placeholder substitution for protected regions.
//!
//! Forward pass: splice every protected region out of the text and insert a
//! stable sentinel of the form `⟪STEM_{KIND}_{SUBKIND}_{8-hex}⟫`, where the
//! hex digest is derived from the region content. Reverse pass: literal
//! replacement of each sentinel with its original content, plus a report on
//! anything the translator dropped.

use crate::core::{ProtectedRegion, RegionKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Opening bracket + prefix of every sentinel.
pub const SENTINEL_PREFIX: &str = "⟪STEM";
/// Closing bracket of every sentinel.
pub const SENTINEL_SUFFIX: &str = "⟫";

/// One substituted region: original content plus kind-specific metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderEntry {
    /// Original region text.
    pub content: String,
    /// Region kind.
    pub kind: RegionKind,
    /// LaTeX environment name, if any.
    pub environment: Option<String>,
    /// Code language tag, if any.
    pub language: Option<String>,
}

/// Output of the forward pass: text with sentinels and the restore map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedText {
    /// Text with every protected region replaced by a sentinel.
    pub text: String,
    /// Sentinel string to original-content mapping.
    pub mapping: BTreeMap<String, PlaceholderEntry>,
    /// Number of formula regions substituted (includes chemical).
    pub formula_count: usize,
    /// Number of code regions substituted.
    pub code_count: usize,
    /// Warnings raised during substitution (e.g. sentinel-like source text).
    pub warnings: Vec<String>,
}

impl ProcessedText {
    /// Locates every sentinel occurrence in the substituted text as a
    /// protected region, so the chunker never splits a sentinel.
    #[must_use]
    pub fn sentinel_regions(&self) -> Vec<crate::core::ProtectedRegion> {
        let mut regions = Vec::new();
        for (sentinel, entry) in &self.mapping {
            let mut from = 0usize;
            while let Some(pos) = self.text[from..].find(sentinel.as_str()) {
                let start = from + pos;
                let end = start + sentinel.len();
                regions.push(crate::core::ProtectedRegion::new(
                    start,
                    end,
                    entry.kind,
                    sentinel.clone(),
                ));
                from = end;
            }
        }
        regions.sort_by_key(|r| r.start);
        regions
    }
}

/// Outcome of restoring sentinels into a translated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Sentinels still present after restoration (translator duplicated or
    /// mangled them).
    pub remaining_placeholders: usize,
    /// Formula regions whose content is present in the restored text.
    pub formulas_preserved: usize,
    /// Total formula regions substituted.
    pub formulas_total: usize,
    /// Code regions whose content is present in the restored text.
    pub code_preserved: usize,
    /// Total code regions substituted.
    pub code_total: usize,
}

impl RestoreReport {
    /// Fraction of protected regions restored; 1.0 when nothing was
    /// protected.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn preservation_rate(&self) -> f64 {
        let total = self.formulas_total + self.code_total;
        if total == 0 {
            1.0
        } else {
            (self.formulas_preserved + self.code_preserved) as f64 / total as f64
        }
    }

    /// Whether every sentinel was consumed and every region restored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining_placeholders == 0
            && self.formulas_preserved == self.formulas_total
            && self.code_preserved == self.code_total
    }

    /// Regions lost in translation.
    #[must_use]
    pub const fn lost(&self) -> usize {
        (self.formulas_total - self.formulas_preserved) + (self.code_total - self.code_preserved)
    }
}

/// Substitutes protected regions with sentinels and restores them.
///
/// Sentinels are deterministic: identical content yields an identical
/// sentinel, so repeated formulas collapse to one mapping entry and cache
/// keys stay stable across runs.
///
/// # Examples
///
/// ```
/// use doctrans::stem::{detect_regions, PlaceholderManager};
///
/// let text = "The equation $E=mc^2$ is famous.";
/// let regions = detect_regions(text);
/// let manager = PlaceholderManager::new();
/// let processed = manager.substitute(text, &regions);
/// assert!(!processed.text.contains("E=mc^2"));
/// assert_eq!(manager.restore(&processed.text, &processed.mapping).0, text);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderManager;

impl PlaceholderManager {
    /// Creates a placeholder manager.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Forward pass: replace each region with its sentinel.
    ///
    /// Regions are spliced in reverse positional order so earlier offsets
    /// stay valid while later ones are rewritten.
    #[must_use]
    pub fn substitute(&self, text: &str, regions: &[ProtectedRegion]) -> ProcessedText {
        let mut warnings = Vec::new();
        if text.contains(SENTINEL_PREFIX) {
            warnings.push(format!(
                "source text already contains the sentinel prefix {SENTINEL_PREFIX}; \
                 restoration may be ambiguous"
            ));
        }

        let mut sorted: Vec<&ProtectedRegion> = regions.iter().collect();
        sorted.sort_by_key(|r| std::cmp::Reverse(r.start));

        let mut processed = text.to_string();
        let mut mapping = BTreeMap::new();
        let mut formula_count = 0usize;
        let mut code_count = 0usize;

        for region in sorted {
            if region.end > processed.len() || region.start >= region.end {
                continue;
            }
            let sentinel = Self::sentinel_for(&region.content, region.kind);
            mapping.insert(
                sentinel.clone(),
                PlaceholderEntry {
                    content: region.content.clone(),
                    kind: region.kind,
                    environment: region.environment.clone(),
                    language: region.language.clone(),
                },
            );
            if region.kind.is_formula() {
                formula_count += 1;
            } else {
                code_count += 1;
            }
            processed.replace_range(region.start..region.end, &sentinel);
        }

        ProcessedText {
            text: processed,
            mapping,
            formula_count,
            code_count,
            warnings,
        }
    }

    /// Reverse pass: literal replacement of each sentinel by its content.
    ///
    /// Returns the restored text together with a report covering residual
    /// sentinels and per-kind preservation counts.
    #[must_use]
    pub fn restore(
        &self,
        translated: &str,
        mapping: &BTreeMap<String, PlaceholderEntry>,
    ) -> (String, RestoreReport) {
        let mut restored = translated.to_string();
        for (sentinel, entry) in mapping {
            restored = restored.replace(sentinel.as_str(), &entry.content);
        }

        let remaining = restored.matches(SENTINEL_PREFIX).count();
        let mut formulas_total = 0usize;
        let mut formulas_preserved = 0usize;
        let mut code_total = 0usize;
        let mut code_preserved = 0usize;

        for entry in mapping.values() {
            if entry.kind.is_formula() {
                formulas_total += 1;
                if restored.contains(&entry.content) {
                    formulas_preserved += 1;
                }
            } else {
                code_total += 1;
                if restored.contains(&entry.content) {
                    code_preserved += 1;
                }
            }
        }

        (
            restored,
            RestoreReport {
                remaining_placeholders: remaining,
                formulas_preserved,
                formulas_total,
                code_preserved,
                code_total,
            },
        )
    }

    /// Whether content qualifies as STEM-heavy, used to pick the chunking
    /// mode automatically.
    ///
    /// Content qualifies when its estimated STEM share reaches 5% of the
    /// text, or it has at least 5 formulas, or at least 3 code blocks.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_stem_heavy(formula_count: usize, code_count: usize, text_length: usize) -> bool {
        // Rough estimate: an average formula or code span is ~100 chars.
        let stem_length = (formula_count + code_count) * 100;
        let ratio = if text_length > 0 {
            stem_length as f64 / text_length as f64
        } else {
            0.0
        };
        ratio >= 0.05 || formula_count >= 5 || code_count >= 3
    }

    /// Builds the sentinel for a region's content and kind.
    #[must_use]
    pub fn sentinel_for(content: &str, kind: RegionKind) -> String {
        let digest = Sha256::digest(content.as_bytes());
        let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
        format!(
            "{SENTINEL_PREFIX}_{}_{}_{hex}{SENTINEL_SUFFIX}",
            kind.label(),
            kind.sublabel()
        )
    }
}
