//! Domain-specific validation rules.
//!
//! Each domain enforces the properties its documents cannot afford to lose:
//! finance keeps numbers and currency glyphs, medical keeps dosages (and
//! flags safety-critical terms for review), literature keeps dialogue and
//! paragraph shape, technology keeps code spans and acronyms.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Validation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Domain {
    /// Financial documents.
    Finance,
    /// Medical documents (safety-critical).
    Medical,
    /// Literary prose.
    Literature,
    /// Technical documentation.
    Technology,
    /// General-purpose fallback.
    #[default]
    Default,
}

impl Domain {
    /// All domains, for CLI listings.
    pub const ALL: [Self; 5] = [
        Self::Finance,
        Self::Medical,
        Self::Literature,
        Self::Technology,
        Self::Default,
    ];

    /// Stable lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Medical => "medical",
            Self::Literature => "literature",
            Self::Technology => "technology",
            Self::Default => "default",
        }
    }

    /// Dimension weights `(length, completeness, language, glossary,
    /// domain_specific)`. Each row sums to 1.
    #[must_use]
    pub const fn weights(self) -> (f64, f64, f64, f64, f64) {
        match self {
            Self::Finance => (0.15, 0.25, 0.25, 0.25, 0.10),
            Self::Literature => (0.10, 0.30, 0.30, 0.15, 0.15),
            Self::Medical => (0.15, 0.30, 0.20, 0.30, 0.05),
            Self::Technology => (0.15, 0.25, 0.25, 0.20, 0.15),
            Self::Default => (0.20, 0.30, 0.30, 0.20, 0.00),
        }
    }

    /// Runs this domain's rule set over a `(source, translated)` pair.
    ///
    /// Returns `(score, warnings)`; the default domain always scores 1.0.
    #[must_use]
    pub fn validate(self, source: &str, translated: &str) -> (f64, Vec<String>) {
        match self {
            Self::Finance => validate_finance(source, translated),
            Self::Medical => validate_medical(source, translated),
            Self::Literature => validate_literature(source, translated),
            Self::Technology => validate_technology(source, translated),
            Self::Default => (1.0, Vec::new()),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "finance" => Ok(Self::Finance),
            "medical" => Ok(Self::Medical),
            "literature" => Ok(Self::Literature),
            "technology" | "tech" => Ok(Self::Technology),
            "default" | "" => Ok(Self::Default),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

#[allow(clippy::unwrap_used)]
fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d+\.?\d*%?").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn dosage_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)\d+\s*(mg|ml|g|mcg|IU)").unwrap(),
            Regex::new(r"(?i)\d+\s*times?\s*(daily|per day)").unwrap(),
            Regex::new(r"(?i)every\s+\d+\s*hours?").unwrap(),
        ]
    })
}

#[allow(clippy::unwrap_used)]
fn acronym_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z]{2,}\b").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn fenced_block_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```.*?```").unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[a-z][a-zA-Z0-9_]*\b").unwrap()
    })
}

/// Numbers, currency glyphs, and finance abbreviations must survive.
fn validate_finance(source: &str, translated: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    let source_numbers = number_pattern().find_iter(source).count();
    let trans_numbers = number_pattern().find_iter(translated).count();
    if source_numbers != trans_numbers {
        score -= 0.3;
        warnings.push("Number count mismatch (finance)".to_string());
    }

    for symbol in ['$', '€', '£', '¥', '₫'] {
        if source.matches(symbol).count() != translated.matches(symbol).count() {
            score -= 0.2;
            warnings.push(format!("Currency symbol '{symbol}' count mismatch"));
            break;
        }
    }

    for abbrev in ["P/E", "IPO", "CEO", "CFO", "ETF", "ROI", "GDP"] {
        if source.contains(abbrev) && !translated.contains(abbrev) {
            score -= 0.1;
            warnings.push(format!("Financial abbreviation '{abbrev}' missing"));
        }
    }

    (score.max(0.0), warnings)
}

/// Dosage digits are critical; medical acronyms should carry over; safety
/// terms always flag the chunk for human review.
fn validate_medical(source: &str, translated: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    let has_dosage = dosage_patterns().iter().any(|p| p.is_match(source));
    if has_dosage {
        let source_numbers: Vec<&str> = number_pattern()
            .find_iter(source)
            .map(|m| m.as_str())
            .collect();
        let missing = source_numbers
            .iter()
            .any(|n| !translated.contains(n.trim_end_matches('%')));
        if missing {
            score -= 0.4;
            warnings.push("CRITICAL: Dosage information may be missing".to_string());
        }
    }

    for abbrev in ["ICU", "MRI", "CT", "X-ray", "DNA", "RNA", "HIV", "AIDS"] {
        if source.contains(abbrev)
            && !translated.contains(abbrev)
            && !translated.to_lowercase().contains(&abbrev.to_lowercase())
        {
            score -= 0.15;
            warnings.push(format!("Medical abbreviation '{abbrev}' not preserved"));
        }
    }

    let lowered = source.to_lowercase();
    for term in ["contraindication", "adverse", "fatal", "emergency", "toxic"] {
        if lowered.contains(term) {
            warnings.push(format!(
                "REVIEW REQUIRED: Safety-critical term '{term}' present"
            ));
        }
    }

    (score.max(0.0), warnings)
}

/// Dialogue quotes, paragraph shape, and temporal markers.
fn validate_literature(source: &str, translated: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    let source_quotes = source.matches('"').count() + source.matches('\'').count();
    let trans_quotes = translated.matches('"').count()
        + translated.matches('\u{201C}').count()
        + translated.matches('\u{201D}').count();
    if source_quotes.abs_diff(trans_quotes) > 2 {
        score -= 0.2;
        warnings.push("Dialogue formatting may be inconsistent".to_string());
    }

    let source_paras = source.split("\n\n").count();
    let trans_paras = translated.split("\n\n").count();
    if source_paras.abs_diff(trans_paras) > 1 {
        score -= 0.15;
        warnings.push("Paragraph structure differs significantly".to_string());
    }

    // English narrative past tense should surface Vietnamese temporal
    // markers on the other side.
    let past_en = ["was", "were", "had", "did"]
        .iter()
        .map(|w| count_word(&source.to_lowercase(), w))
        .sum::<usize>();
    let markers_vi = ["đã", "đang", "sẽ"]
        .iter()
        .map(|w| count_word(&translated.to_lowercase(), w))
        .sum::<usize>();
    if past_en > 5 && markers_vi < 2 {
        score -= 0.1;
        warnings.push("Temporal markers may be missing".to_string());
    }

    (score.max(0.0), warnings)
}

/// Fenced blocks, inline backticks, tech acronyms, and identifiers.
fn validate_technology(source: &str, translated: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    let source_blocks = fenced_block_pattern().find_iter(source).count();
    let trans_blocks = fenced_block_pattern().find_iter(translated).count();
    if source_blocks != trans_blocks {
        score -= 0.3;
        warnings.push("Code block count mismatch".to_string());
    }

    let source_ticks = source.matches('`').count();
    let trans_ticks = translated.matches('`').count();
    if source_ticks.abs_diff(trans_ticks) > 2 {
        score -= 0.2;
        warnings.push("Inline code formatting may be inconsistent".to_string());
    }

    for abbrev in ["API", "SQL", "HTTP", "HTTPS", "JSON", "XML", "CSS", "HTML", "URL"] {
        if source.contains(abbrev) && !translated.contains(abbrev) {
            score -= 0.1;
            warnings.push(format!("Technical abbreviation '{abbrev}' missing"));
        }
    }

    // camelCase / snake_case identifiers should not be translated.
    for m in identifier_pattern().find_iter(source) {
        let ident = m.as_str();
        let snake = ident.contains('_');
        let camel = ident.chars().any(char::is_uppercase);
        if (snake || camel) && !translated.contains(ident) {
            score -= 0.05;
            warnings.push(format!("Code identifier '{ident}' may be translated incorrectly"));
            break;
        }
    }

    (score.max(0.0), warnings)
}

/// Counts whitespace-delimited occurrences of a word.
fn count_word(text: &str, word: &str) -> usize {
    text.split_whitespace()
        .filter(|t| t.trim_matches(|c: char| !c.is_alphanumeric()) == word)
        .count()
}

/// Counts of sentence punctuation consistency between source and target.
///
/// Shared by every domain through the validator's punctuation dimension.
#[must_use]
pub(crate) fn check_punctuation(source: &str, translated: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    for mark in ['.', '!', '?', ':', ';'] {
        let source_count = source.matches(mark).count();
        let trans_count = translated.matches(mark).count();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let tolerance = 2usize.max((source_count as f64 * 0.3) as usize);
        if source_count > 0 && source_count.abs_diff(trans_count) > tolerance {
            score -= 0.1;
            warnings.push(format!("Punctuation '{mark}' count differs significantly"));
        }
    }

    (score.max(0.0), warnings)
}

/// Capitalized proper nouns and all-caps acronyms should reappear.
#[must_use]
#[allow(clippy::unwrap_used)]
pub(crate) fn check_capitalization(source: &str, translated: &str) -> (f64, Vec<String>) {
    let mut score: f64 = 1.0;
    let mut warnings = Vec::new();

    let proper_pattern = {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"\b[A-Z][a-z]+\b").unwrap()
        })
    };

    let mut missing: Vec<&str> = Vec::new();
    let lowered = translated.to_lowercase();
    for m in proper_pattern.find_iter(source) {
        let word = m.as_str();
        if !translated.contains(word) && !lowered.contains(&word.to_lowercase()) {
            if !missing.contains(&word) {
                missing.push(word);
            }
        }
    }
    if missing.len() > 3 {
        score -= 0.2;
        let sample = missing[..3].join(", ");
        warnings.push(format!("Multiple proper nouns may be missing: {sample}..."));
    }

    let mut seen: Vec<&str> = Vec::new();
    for m in acronym_pattern().find_iter(source) {
        let acronym = m.as_str();
        if !seen.contains(&acronym) {
            seen.push(acronym);
            if !translated.contains(acronym) {
                score -= 0.15;
                warnings.push(format!("Acronym '{acronym}' not preserved"));
            }
        }
    }

    (score.max(0.0), warnings)
}
