//! Mathematical and chemical formula detection.
//!
//! Recognizes inline math (`$…$`, `\(…\)`), display math (`$$…$$`,
//! `\[…\]`), LaTeX environments, runs of Unicode math symbols, and
//! conservative chemical-formula tokens.
//!
//! The `$$…$$`, inline `$…$`, and environment forms are hand-written
//! scanners rather than regexes: the `regex` crate has no look-around or
//! back-references, and a naive display-math pattern backtracks badly on
//! long formulas.

use crate::core::{ProtectedRegion, RegionKind, resolve_overlaps};
use regex::Regex;

/// LaTeX environments treated as protected math.
const MATH_ENVIRONMENTS: &[&str] = &[
    "equation", "align", "gather", "multline", "split", "eqnarray", "array", "matrix", "pmatrix",
    "bmatrix", "vmatrix", "Vmatrix", "cases", "alignat", "flalign",
];

/// English-looking words the chemical pattern must not swallow.
const CHEMICAL_BLACKLIST: &[&str] = &["Chemistry", "Chemical", "CHemical", "CHange"];

/// Detects mathematical and chemical formulas in text.
///
/// The detector never fails: ambiguous spans simply produce no region.
///
/// # Examples
///
/// ```
/// use doctrans::stem::FormulaDetector;
///
/// let detector = FormulaDetector::new();
/// let regions = detector.detect("Euler: $e^{i\\pi} + 1 = 0$.");
/// assert_eq!(regions.len(), 1);
/// ```
#[derive(Debug)]
pub struct FormulaDetector {
    display_bracket: Regex,
    inline_paren: Regex,
    begin_env: Regex,
    unicode_math: Regex,
    chemical: Regex,
}

impl Default for FormulaDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaDetector {
    /// Creates a detector with compiled patterns.
    ///
    /// # Panics
    ///
    /// Does not panic: all patterns are static and verified by tests.
    #[must_use]
    #[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
    pub fn new() -> Self {
        let env_names = MATH_ENVIRONMENTS.join("|");
        Self {
            display_bracket: Regex::new(r"(?s)\\\[.*?\\\]").unwrap(),
            inline_paren: Regex::new(r"(?s)\\\(.*?\\\)").unwrap(),
            begin_env: Regex::new(&format!(r"\\begin\{{({env_names})(\*?)\}}")).unwrap(),
            unicode_math: Regex::new(r"[\u{2200}-\u{22FF}]+").unwrap(),
            chemical: Regex::new(
                r"\b[A-Z][a-z]?(?:[a-z]?[0-9]*[A-Z]?[a-z]?[0-9]*[()\[\]=#+-]*){2,}\b",
            )
            .unwrap(),
        }
    }

    /// Detects all formula regions, sorted by position and non-overlapping.
    ///
    /// Priority at overlap resolution: environments > display math >
    /// inline math > Unicode runs > chemical tokens.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<ProtectedRegion> {
        self.detect_inner(text, true)
    }

    /// Detects formula regions without the chemical heuristic.
    #[must_use]
    pub fn detect_without_chemical(&self, text: &str) -> Vec<ProtectedRegion> {
        self.detect_inner(text, false)
    }

    fn detect_inner(&self, text: &str, include_chemical: bool) -> Vec<ProtectedRegion> {
        let mut ordered = Vec::new();
        ordered.extend(self.detect_environments(text));
        ordered.extend(Self::detect_display_dollar(text));
        ordered.extend(self.detect_display_bracket(text));
        ordered.extend(Self::detect_inline_dollar(text));
        ordered.extend(self.detect_inline_paren(text));
        ordered.extend(self.detect_unicode_math(text));
        if include_chemical {
            ordered.extend(self.detect_chemical(text));
        }
        resolve_overlaps(ordered)
    }

    /// Quick check without building the full region list.
    #[must_use]
    pub fn has_formulas(&self, text: &str) -> bool {
        !Self::detect_display_dollar(text).is_empty()
            || !Self::detect_inline_dollar(text).is_empty()
            || self.display_bracket.is_match(text)
            || self.inline_paren.is_match(text)
            || self.begin_env.is_match(text)
            || self.unicode_math.is_match(text)
    }

    /// `\begin{env}…\end{env}` pairs for the fixed math environment set.
    fn detect_environments(&self, text: &str) -> Vec<ProtectedRegion> {
        let mut regions = Vec::new();
        for caps in self.begin_env.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(name) = caps.get(1) else { continue };

            // The closing tag may carry a star regardless of the opener.
            let plain = format!("\\end{{{}}}", name.as_str());
            let starred = format!("\\end{{{}*}}", name.as_str());
            let tail = &text[whole.end()..];
            let close = match (tail.find(&plain), tail.find(&starred)) {
                (Some(p), Some(s)) if s < p => Some((s, starred.len())),
                (Some(p), _) => Some((p, plain.len())),
                (None, Some(s)) => Some((s, starred.len())),
                (None, None) => None,
            };
            let Some((offset, close_len)) = close else {
                continue;
            };

            let end = whole.end() + offset + close_len;
            let mut region = ProtectedRegion::new(
                whole.start(),
                end,
                RegionKind::FormulaBlock,
                &text[whole.start()..end],
            );
            region.environment = Some(name.as_str().to_string());
            regions.push(region);
        }
        regions
    }

    /// `$$…$$` pairs, scanned without backtracking.
    fn detect_display_dollar(text: &str) -> Vec<ProtectedRegion> {
        let bytes = text.as_bytes();
        let mut regions = Vec::new();
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] == b'$' && bytes[i + 1] == b'$' {
                // Find the next `$$` strictly after at least one content byte.
                let mut j = i + 2;
                let mut close = None;
                while j + 1 < bytes.len() {
                    if bytes[j] == b'$' && bytes[j + 1] == b'$' {
                        close = Some(j);
                        break;
                    }
                    j += 1;
                }
                if let Some(close) = close {
                    if close > i + 2 {
                        regions.push(ProtectedRegion::new(
                            i,
                            close + 2,
                            RegionKind::FormulaBlock,
                            &text[i..close + 2],
                        ));
                    }
                    i = close + 2;
                    continue;
                }
            }
            i += 1;
        }
        regions
    }

    /// `\[…\]` display math.
    fn detect_display_bracket(&self, text: &str) -> Vec<ProtectedRegion> {
        self.display_bracket
            .find_iter(text)
            .map(|m| {
                ProtectedRegion::new(m.start(), m.end(), RegionKind::FormulaBlock, m.as_str())
            })
            .collect()
    }

    /// Single-dollar inline math: `$…$` with no `$` or newline inside and
    /// no adjacent `$` on either side.
    fn detect_inline_dollar(text: &str) -> Vec<ProtectedRegion> {
        let bytes = text.as_bytes();
        let mut regions = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }
            let preceded = i > 0 && bytes[i - 1] == b'$';
            let followed = i + 1 < bytes.len() && bytes[i + 1] == b'$';
            if preceded || followed {
                // Part of `$$`; skip the whole run.
                while i < bytes.len() && bytes[i] == b'$' {
                    i += 1;
                }
                continue;
            }

            // Scan content up to the closing `$`, rejecting newlines.
            let mut j = i + 1;
            let mut close = None;
            while j < bytes.len() {
                match bytes[j] {
                    b'\n' => break,
                    b'$' => {
                        close = Some(j);
                        break;
                    }
                    _ => j += 1,
                }
            }
            match close {
                Some(close)
                    if close > i + 1
                        && !(close + 1 < bytes.len() && bytes[close + 1] == b'$') =>
                {
                    regions.push(ProtectedRegion::new(
                        i,
                        close + 1,
                        RegionKind::FormulaInline,
                        &text[i..=close],
                    ));
                    i = close + 1;
                }
                _ => i += 1,
            }
        }
        regions
    }

    /// `\(…\)` inline math.
    fn detect_inline_paren(&self, text: &str) -> Vec<ProtectedRegion> {
        self.inline_paren
            .find_iter(text)
            .map(|m| {
                ProtectedRegion::new(m.start(), m.end(), RegionKind::FormulaInline, m.as_str())
            })
            .collect()
    }

    /// Runs of three or more consecutive Unicode math symbols.
    fn detect_unicode_math(&self, text: &str) -> Vec<ProtectedRegion> {
        self.unicode_math
            .find_iter(text)
            .filter(|m| m.as_str().chars().count() >= 3)
            .map(|m| {
                ProtectedRegion::new(m.start(), m.end(), RegionKind::FormulaInline, m.as_str())
            })
            .collect()
    }

    /// Conservative chemical formula tokens (`H2SO4`, `CH3CH2OH`, …).
    fn detect_chemical(&self, text: &str) -> Vec<ProtectedRegion> {
        self.chemical
            .find_iter(text)
            .filter(|m| Self::looks_like_chemical(m.as_str()))
            .map(|m| ProtectedRegion::new(m.start(), m.end(), RegionKind::Chemical, m.as_str()))
            .collect()
    }

    /// Must carry a digit or chemistry bracket, at least two capitals, and
    /// not be a blacklisted English word.
    fn looks_like_chemical(token: &str) -> bool {
        let has_digit = token.chars().any(|c| c.is_ascii_digit());
        let has_chem_symbols = token
            .chars()
            .any(|c| matches!(c, '(' | ')' | '[' | ']' | '=' | '#' | '-' | '+'));
        let capital_count = token.chars().filter(char::is_ascii_uppercase).count();

        (has_digit || has_chem_symbols)
            && capital_count >= 2
            && !CHEMICAL_BLACKLIST.contains(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<ProtectedRegion> {
        FormulaDetector::new().detect(text)
    }

    #[test]
    fn test_inline_dollar() {
        let regions = detect("The equation $E=mc^2$ is famous.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].content, "$E=mc^2$");
        assert_eq!(regions[0].kind, RegionKind::FormulaInline);
    }

    #[test]
    fn test_display_dollar() {
        let regions = detect("Before\n$$\n\\int_0^1 x\\,dx\n$$\nafter");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::FormulaBlock);
        assert!(regions[0].content.starts_with("$$"));
        assert!(regions[0].content.ends_with("$$"));
    }

    #[test]
    fn test_inline_not_matched_inside_display() {
        let regions = detect("$$a+b$$");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::FormulaBlock);
    }

    #[test]
    fn test_inline_does_not_cross_newline() {
        let regions = detect("costs $5 today\nand $6 tomorrow");
        assert!(regions.is_empty());
    }

    #[test]
    fn test_display_bracket() {
        let regions = detect(r"Result: \[ x = \frac{1}{2} \] done.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::FormulaBlock);
    }

    #[test]
    fn test_inline_paren() {
        let regions = detect(r"Inline \(a^2 + b^2 = c^2\) form.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::FormulaInline);
    }

    #[test]
    fn test_latex_environment() {
        let text = "\\begin{equation}\nE = mc^2\n\\end{equation}";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].content, text);
        assert_eq!(regions[0].environment.as_deref(), Some("equation"));
    }

    #[test]
    fn test_starred_environment() {
        let text = "\\begin{align*}\nx &= y\n\\end{align*}";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].environment.as_deref(), Some("align"));
    }

    #[test]
    fn test_environment_outranks_inner_math() {
        let text = "\\begin{cases} x & \\text{if $y>0$} \\end{cases}";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].environment.as_deref(), Some("cases"));
    }

    #[test]
    fn test_matrix_variants() {
        for env in ["matrix", "pmatrix", "bmatrix", "vmatrix", "Vmatrix"] {
            let text = format!("\\begin{{{env}}} 1 & 0 \\\\ 0 & 1 \\end{{{env}}}");
            let regions = detect(&text);
            assert_eq!(regions.len(), 1, "env {env} not detected");
        }
    }

    #[test]
    fn test_unicode_math_run() {
        let regions = detect("Symbols ∀∃∈ appear here, but single ∑ does not.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].content, "∀∃∈");
    }

    #[test]
    fn test_chemical_formula() {
        let regions = detect("Dissolve H2SO4 in water.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::Chemical);
        assert_eq!(regions[0].content, "H2SO4");
    }

    #[test]
    fn test_chemical_blacklist() {
        let detector = FormulaDetector::new();
        let regions = detector.detect("Chemistry is CHemical in nature.");
        assert!(regions.iter().all(|r| r.kind != RegionKind::Chemical));
    }

    #[test]
    fn test_no_chemical_mode() {
        let detector = FormulaDetector::new();
        let regions = detector.detect_without_chemical("Dissolve H2SO4 in water.");
        assert!(regions.is_empty());
    }

    #[test]
    fn test_long_display_formula_no_blowup() {
        // The original display-math regex backtracked on inputs like this.
        let body = "x + y ".repeat(1000);
        let text = format!("$$ {body} $$");
        let regions = detect(&text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].content.len(), text.len());
    }

    #[test]
    fn test_unclosed_display_is_ignored() {
        let regions = detect("An unmatched $$ opener and nothing else");
        assert!(regions.is_empty());
    }

    #[test]
    fn test_has_formulas() {
        let detector = FormulaDetector::new();
        assert!(detector.has_formulas("see $x$ here"));
        assert!(detector.has_formulas("\\begin{align} x \\end{align}"));
        assert!(!detector.has_formulas("plain prose only"));
    }

    #[test]
    fn test_sorted_and_disjoint() {
        let regions = detect("$a$ then $$b$$ then \\(c\\) and ∀∃∈∅.");
        for pair in regions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
}
