//! Language registry and per-language quality checks.
//!
//! Each supported language carries the characteristics the validator and
//! merger need: expected length ratio relative to English, whether
//! diacritics are required, and simple character-range membership for
//! quality checks.

use serde::{Deserialize, Serialize};

/// Characteristics of one supported language.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageInfo {
    /// ISO 639-1 code.
    pub code: &'static str,
    /// English name.
    pub name: &'static str,
    /// Native name.
    pub native_name: &'static str,
    /// Typical length ratio relative to English.
    pub avg_length_ratio: f64,
    /// Whether well-formed text requires diacritics.
    pub requires_diacritics: bool,
    /// Whether the script uses spaces between words.
    pub has_spaces: bool,
    /// Whether the script has capitalization.
    pub has_capitalization: bool,
}

/// The language database.
const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo {
        code: "en",
        name: "English",
        native_name: "English",
        avg_length_ratio: 1.0,
        requires_diacritics: false,
        has_spaces: true,
        has_capitalization: true,
    },
    LanguageInfo {
        code: "vi",
        name: "Vietnamese",
        native_name: "Tiếng Việt",
        avg_length_ratio: 1.3,
        requires_diacritics: true,
        has_spaces: true,
        has_capitalization: true,
    },
    LanguageInfo {
        code: "zh",
        name: "Chinese",
        native_name: "中文",
        avg_length_ratio: 0.7,
        requires_diacritics: false,
        has_spaces: false,
        has_capitalization: false,
    },
    LanguageInfo {
        code: "ja",
        name: "Japanese",
        native_name: "日本語",
        avg_length_ratio: 0.8,
        requires_diacritics: false,
        has_spaces: false,
        has_capitalization: false,
    },
    LanguageInfo {
        code: "ko",
        name: "Korean",
        native_name: "한국어",
        avg_length_ratio: 0.9,
        requires_diacritics: false,
        has_spaces: true,
        has_capitalization: false,
    },
    LanguageInfo {
        code: "fr",
        name: "French",
        native_name: "Français",
        avg_length_ratio: 1.1,
        requires_diacritics: true,
        has_spaces: true,
        has_capitalization: true,
    },
    LanguageInfo {
        code: "es",
        name: "Spanish",
        native_name: "Español",
        avg_length_ratio: 1.15,
        requires_diacritics: true,
        has_spaces: true,
        has_capitalization: true,
    },
    LanguageInfo {
        code: "de",
        name: "German",
        native_name: "Deutsch",
        avg_length_ratio: 1.1,
        requires_diacritics: true,
        has_spaces: true,
        has_capitalization: true,
    },
];

/// Vietnamese diacritic set used by the quality check.
const VIETNAMESE_CHARS: &str =
    "àáảãạăằắẳẵặâầấẩẫậèéẻẽẹêềếểễệìíỉĩịòóỏõọôồốổỗộơờớởỡợùúủũụưừứửữựỳýỷỹỵđ";

/// Very common Vietnamese function words.
const VIETNAMESE_FUNCTION_WORDS: &[&str] = &["và", "của", "là", "có", "được", "trong", "cho"];

/// Very common English function words.
const ENGLISH_FUNCTION_WORDS: &[&str] = &["the", "and", "of", "to", "in", "is", "that"];

/// Looks up a language by code (case-insensitive, region tags stripped).
#[must_use]
pub fn language_info(code: &str) -> Option<&'static LanguageInfo> {
    let base = code.split(['-', '_']).next().unwrap_or(code).to_lowercase();
    LANGUAGES.iter().find(|l| l.code == base)
}

/// Human-readable name for a language code, falling back to the code.
#[must_use]
pub fn language_name(code: &str) -> &str {
    language_info(code).map_or(code, |l| l.name)
}

/// A source/target language pair with derived quality expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Source language code.
    pub source: String,
    /// Target language code.
    pub target: String,
    /// Lower bound of the acceptable target/source length ratio.
    pub expected_ratio_min: f64,
    /// Upper bound of the acceptable target/source length ratio.
    pub expected_ratio_max: f64,
}

impl LanguagePair {
    /// Builds a pair, deriving the expected ratio band from the two
    /// languages' typical length ratios (×0.7 .. ×1.5 around the point
    /// estimate). Unknown languages get a wide default band.
    #[must_use]
    pub fn new(source: &str, target: &str) -> Self {
        let ratio = Self::expansion(source, target);
        let (min, max) = if language_info(source).is_some() && language_info(target).is_some() {
            (ratio * 0.7, ratio * 1.5)
        } else {
            (0.5, 2.0)
        };
        Self {
            source: source.to_string(),
            target: target.to_string(),
            expected_ratio_min: min,
            expected_ratio_max: max,
        }
    }

    /// Point estimate of the target/source character expansion factor.
    ///
    /// The merger multiplies source overlap lengths by this value to
    /// estimate translated overlap lengths (≈1.3 for en→vi). Unknown
    /// pairs fall back to 1.0.
    #[must_use]
    pub fn expansion(source: &str, target: &str) -> f64 {
        match (language_info(source), language_info(target)) {
            (Some(s), Some(t)) => t.avg_length_ratio / s.avg_length_ratio,
            _ => 1.0,
        }
    }

    /// Scores an observed length ratio against this pair's band.
    ///
    /// 1.0 inside the optimal band, 0.7 inside a widened acceptable band,
    /// 0.3 otherwise.
    #[must_use]
    pub fn score_length_ratio(&self, ratio: f64) -> f64 {
        if ratio >= self.expected_ratio_min && ratio <= self.expected_ratio_max {
            1.0
        } else if ratio >= self.expected_ratio_min * 0.8 && ratio <= self.expected_ratio_max * 1.15
        {
            0.7
        } else {
            0.3
        }
    }
}

/// Scores target-language plausibility of a translated text.
///
/// Returns `(score, warnings)`. Artifact checks (prompt brackets, chunk
/// markers, untranslated notes) apply to every language; script checks are
/// per-language.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn validate_language(text: &str, target_lang: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    // Residual translator artifacts.
    let artifacts: [(&str, fn(&str) -> bool); 4] = [
        ("prompt bracket artifact", |t| t.contains("[[") && t.contains("]]")),
        ("untranslated note artifact", |t| t.contains("Note:")),
        ("TODO artifact", |t| t.contains("TODO:")),
        ("chunk marker artifact", contains_chunk_marker),
    ];
    for (label, check) in artifacts {
        if check(text) {
            score -= 0.2;
            warnings.push(format!("Residual {label} in translation"));
        }
    }

    let lowered = text.to_lowercase();
    let base = target_lang.split(['-', '_']).next().unwrap_or(target_lang);
    match base {
        "vi" => {
            if !lowered.chars().any(|c| VIETNAMESE_CHARS.contains(c)) {
                score -= 0.5;
                warnings.push("No Vietnamese diacritics found".to_string());
            }
            if !VIETNAMESE_FUNCTION_WORDS
                .iter()
                .any(|w| lowered.split_whitespace().any(|t| t == *w))
            {
                score -= 0.2;
                warnings.push("No common Vietnamese function words found".to_string());
            }
        }
        "zh" => {
            let cjk = text
                .chars()
                .filter(|c| ('\u{4E00}'..='\u{9FFF}').contains(c))
                .count();
            let non_ws = text.chars().filter(|c| !c.is_whitespace()).count();
            if non_ws > 0 && (cjk as f64 / non_ws as f64) < 0.3 {
                score -= 0.5;
                warnings.push("Low CJK character ratio for Chinese output".to_string());
            }
        }
        "ja" => {
            let japanese = text
                .chars()
                .filter(|c| {
                    ('\u{3040}'..='\u{309F}').contains(c)
                        || ('\u{30A0}'..='\u{30FF}').contains(c)
                        || ('\u{4E00}'..='\u{9FFF}').contains(c)
                })
                .count();
            let non_ws = text.chars().filter(|c| !c.is_whitespace()).count();
            if non_ws > 0 && (japanese as f64 / non_ws as f64) < 0.3 {
                score -= 0.5;
                warnings.push("Low kana/kanji ratio for Japanese output".to_string());
            }
        }
        "en" => {
            let ascii_letters = text.chars().filter(char::is_ascii_alphabetic).count();
            let non_ws = text.chars().filter(|c| !c.is_whitespace()).count();
            if non_ws > 0 && (ascii_letters as f64 / non_ws as f64) < 0.5 {
                score -= 0.3;
                warnings.push("Low ASCII letter ratio for English output".to_string());
            }
            if !ENGLISH_FUNCTION_WORDS
                .iter()
                .any(|w| lowered.split_whitespace().any(|t| t == *w))
            {
                score -= 0.2;
                warnings.push("No common English function words found".to_string());
            }
        }
        _ => {}
    }

    (score.max(0.0), warnings)
}

/// `[CHUNK N]` markers left over from prompt scaffolding.
fn contains_chunk_marker(text: &str) -> bool {
    let mut rest = text;
    while let Some(pos) = rest.find("[CHUNK ") {
        let tail = &rest[pos + "[CHUNK ".len()..];
        let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
        if !digits.is_empty() && tail[digits.len()..].starts_with(']') {
            return true;
        }
        rest = &rest[pos + 1..];
    }
    false
}
