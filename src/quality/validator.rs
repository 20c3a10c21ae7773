//! Weighted quality scoring for translations.

use crate::glossary::Glossary;
use crate::quality::domain::{Domain, check_capitalization, check_punctuation};
use crate::quality::language::{LanguagePair, language_name, validate_language};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of validating one `(source, translated)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Weighted composite score in `[0, 1]`.
    pub quality_score: f64,
    /// Warnings accumulated across all dimensions.
    pub warnings: Vec<String>,
    /// Per-dimension raw scores, for analytics and debugging.
    pub dimension_scores: BTreeMap<String, f64>,
}

/// Pure translation quality validator.
///
/// Scores across length ratio, completeness, target-language plausibility,
/// glossary adherence, and domain rules, aggregated with domain-specific
/// weights. Punctuation and capitalization checks contribute warnings and
/// reported sub-scores without their own weight rows.
///
/// # Examples
///
/// ```
/// use doctrans::quality::{Domain, QualityValidator};
///
/// let report = QualityValidator::validate(
///     "Hello world.",
///     "Xin chào thế giới.",
///     None,
///     Domain::Default,
///     "en",
///     "vi",
/// );
/// assert!(report.quality_score > 0.8);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct QualityValidator;

impl QualityValidator {
    /// Runs every dimension and aggregates with the domain's weights.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(
        source: &str,
        translated: &str,
        glossary: Option<&Glossary>,
        domain: Domain,
        source_lang: &str,
        target_lang: &str,
    ) -> ValidationReport {
        let mut warnings = Vec::new();

        let pair = LanguagePair::new(source_lang, target_lang);
        let length_score = Self::length_ratio_score(source, translated, &pair);
        let completeness_score = Self::completeness_score(source, translated);

        let (language_score, language_warnings) = validate_language(translated, target_lang);
        warnings.extend(language_warnings);

        let (punct_score, punct_warnings) = check_punctuation(source, translated);
        let (cap_score, cap_warnings) = check_capitalization(source, translated);

        let glossary_score = glossary.map_or(1.0, |g| {
            let (score, term_warnings) = g.validate(source, translated);
            warnings.extend(term_warnings);
            score
        });

        let (domain_score, domain_warnings) = domain.validate(source, translated);
        warnings.extend(domain_warnings);
        warnings.extend(punct_warnings);
        warnings.extend(cap_warnings);

        let (w_len, w_complete, w_lang, w_gloss, w_domain) = domain.weights();
        let mut quality_score = length_score * w_len
            + completeness_score * w_complete
            + language_score * w_lang
            + glossary_score * w_gloss
            + domain_score * w_domain;

        // Safety-critical losses (e.g. dropped dosage numbers) cap the
        // aggregate so the chunk is forced back through the provider and
        // never lands in the caches.
        if warnings.iter().any(|w| w.starts_with("CRITICAL")) {
            quality_score = quality_score.min(0.4);
        }

        if length_score < 0.7 {
            warnings.push("Abnormal length ratio".to_string());
        }
        if completeness_score < 0.7 {
            warnings.push("May be incomplete".to_string());
        }
        if language_score < 0.7 {
            warnings.push(format!("{} quality issues", language_name(target_lang)));
        }
        if domain_score < 0.7 && domain != Domain::Default {
            warnings.push(format!("Domain-specific ({domain}) quality issues"));
        }

        let mut dimension_scores = BTreeMap::new();
        dimension_scores.insert("length".to_string(), length_score);
        dimension_scores.insert("completeness".to_string(), completeness_score);
        dimension_scores.insert("language".to_string(), language_score);
        dimension_scores.insert("glossary".to_string(), glossary_score);
        dimension_scores.insert("domain_specific".to_string(), domain_score);
        dimension_scores.insert("punctuation".to_string(), punct_score);
        dimension_scores.insert("capitalization".to_string(), cap_score);

        ValidationReport {
            quality_score,
            warnings,
            dimension_scores,
        }
    }

    /// Target/source character ratio against the pair's expected band.
    #[allow(clippy::cast_precision_loss)]
    fn length_ratio_score(source: &str, translated: &str, pair: &LanguagePair) -> f64 {
        if source.is_empty() || translated.is_empty() {
            return 0.0;
        }
        let ratio = translated.chars().count() as f64 / source.chars().count() as f64;
        pair.score_length_ratio(ratio)
    }

    /// Sentence-count ratio: 1.0 inside 0.8–1.2, 0.7 inside 0.6–1.4,
    /// else 0.3.
    #[allow(clippy::cast_precision_loss)]
    fn completeness_score(source: &str, translated: &str) -> f64 {
        let count = |text: &str| {
            text.split(['.', '!', '?'])
                .filter(|s| !s.trim().is_empty())
                .count()
                .max(1)
        };
        let ratio = count(translated) as f64 / count(source) as f64;
        if (0.8..=1.2).contains(&ratio) {
            1.0
        } else if (0.6..=1.4).contains(&ratio) {
            0.7
        } else {
            0.3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_default(source: &str, translated: &str) -> ValidationReport {
        QualityValidator::validate(source, translated, None, Domain::Default, "en", "vi")
    }

    #[test]
    fn test_good_vietnamese_translation() {
        let report = validate_default(
            "Hello world. This is a test.",
            "Xin chào thế giới. Đây là một bài kiểm tra.",
        );
        assert!(
            report.quality_score > 0.8,
            "score {} warnings {:?}",
            report.quality_score,
            report.warnings
        );
    }

    #[test]
    fn test_empty_translation_scores_low() {
        let report = validate_default("Hello world.", "");
        assert!(report.quality_score < 0.7);
    }

    #[test]
    fn test_truncated_translation_flagged() {
        let report = validate_default(
            "One sentence. Two sentences. Three sentences. Four sentences. Five sentences.",
            "Một câu.",
        );
        assert!(report.quality_score < 0.7);
        assert!(report.warnings.iter().any(|w| w.contains("incomplete")));
    }

    #[test]
    fn test_medical_digit_loss_triggers_low_score() {
        let report = QualityValidator::validate(
            "Administer 10 mg every 6 hours.",
            "Dùng thuốc đều đặn theo hướng dẫn bác sĩ nhé.",
            None,
            Domain::Medical,
            "en",
            "vi",
        );
        assert!(report.quality_score < 0.7, "score {}", report.quality_score);
        assert!(report.warnings.iter().any(|w| w.contains("CRITICAL")));
    }

    #[test]
    fn test_dimension_scores_reported() {
        let report = validate_default("Hello world.", "Xin chào thế giới.");
        for key in [
            "length",
            "completeness",
            "language",
            "glossary",
            "domain_specific",
            "punctuation",
            "capitalization",
        ] {
            assert!(report.dimension_scores.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_glossary_miss_lowers_score() {
        let mut glossary = Glossary::new(Domain::Technology);
        glossary.add_term("database", "cơ sở dữ liệu");

        let with_term = QualityValidator::validate(
            "The database stores records.",
            "Cơ sở dữ liệu lưu trữ các bản ghi.",
            Some(&glossary),
            Domain::Technology,
            "en",
            "vi",
        );
        let without_term = QualityValidator::validate(
            "The database stores records.",
            "Kho lưu trữ các bản ghi của hệ thống.",
            Some(&glossary),
            Domain::Technology,
            "en",
            "vi",
        );
        assert!(with_term.quality_score > without_term.quality_score);
        assert!(
            without_term
                .warnings
                .iter()
                .any(|w| w.contains("database"))
        );
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let report = validate_default("a? b! c.", "x");
        assert!(report.quality_score >= 0.0);
        assert!(report.quality_score <= 1.0);
    }

    #[test]
    fn test_validator_is_pure() {
        let a = validate_default("Hello world.", "Xin chào thế giới.");
        let b = validate_default("Hello world.", "Xin chào thế giới.");
        assert!((a.quality_score - b.quality_score).abs() < f64::EPSILON);
        assert_eq!(a.warnings, b.warnings);
    }
}
