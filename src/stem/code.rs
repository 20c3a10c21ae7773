//! Code block and inline code detection.
//!
//! Recognizes fenced blocks (``` or ~~~, optional language tag), indented
//! blocks (two or more consecutive lines prefixed by four spaces or a tab),
//! and inline backtick spans accepted by a looks-like-code heuristic.

use crate::core::{ProtectedRegion, RegionKind, resolve_overlaps};
use regex::Regex;

/// Language tags recognized on fenced blocks.
const KNOWN_LANGUAGES: &[&str] = &[
    "python", "py", "javascript", "js", "typescript", "ts", "java", "c", "cpp", "c++", "csharp",
    "c#", "go", "rust", "ruby", "rb", "php", "swift", "kotlin", "scala", "r", "matlab", "octave",
    "bash", "sh", "shell", "powershell", "sql", "html", "css", "xml", "json", "yaml", "yml",
    "markdown", "md", "tex", "latex", "dockerfile", "makefile", "cmake", "diff", "patch",
];

/// English abbreviations that would otherwise satisfy the inline heuristic.
const ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "etc.", "vs.", "dr.", "mr.", "mrs.", "ms.", "a.m.", "p.m.", "u.s.", "u.k.",
    "ph.d.",
];

/// Detects code blocks and spans in text.
///
/// Priority at overlap resolution: fenced > inline > indented. Like the
/// formula detector, this never fails; ambiguous spans produce no region.
#[derive(Debug)]
pub struct CodeDetector {
    fenced: Regex,
    fenced_tilde: Regex,
    inline: Regex,
    camel_case: Regex,
    call_pattern: Regex,
    comparison: Regex,
    dotted: Regex,
    mixed_digits: Regex,
    keyword_line: Regex,
    assignment_line: Regex,
}

impl Default for CodeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeDetector {
    /// Creates a detector with compiled patterns.
    #[must_use]
    #[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
    pub fn new() -> Self {
        Self {
            fenced: Regex::new(r"(?s)```([a-zA-Z0-9_+-]*)\n(.*?)```").unwrap(),
            fenced_tilde: Regex::new(r"(?s)~~~([a-zA-Z0-9_+-]*)\n(.*?)~~~").unwrap(),
            inline: Regex::new(r"`([^`\n]+?)`").unwrap(),
            camel_case: Regex::new(r"[a-z][A-Z]").unwrap(),
            call_pattern: Regex::new(r"\w+\(").unwrap(),
            comparison: Regex::new(r"[=!<>]=?").unwrap(),
            dotted: Regex::new(r"\w+\.\w+").unwrap(),
            mixed_digits: Regex::new(r"\w*\d+\w*").unwrap(),
            keyword_line: Regex::new(
                r"\b(def|class|function|fn|var|let|const|import|from|return|if|else|for|while)\b",
            )
            .unwrap(),
            assignment_line: Regex::new(r"\w+\s*[=:]\s*").unwrap(),
        }
    }

    /// Detects all code regions, sorted by position and non-overlapping.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<ProtectedRegion> {
        let mut ordered = Vec::new();
        ordered.extend(self.detect_fenced(text));
        ordered.extend(self.detect_inline(text));
        ordered.extend(self.detect_indented(text));
        resolve_overlaps(ordered)
    }

    /// Quick check without building the full region list.
    #[must_use]
    pub fn has_code(&self, text: &str) -> bool {
        self.fenced.is_match(text) || self.fenced_tilde.is_match(text) || self.inline.is_match(text)
    }

    /// Whether a fence language tag is one of the recognized languages.
    #[must_use]
    pub fn is_known_language(tag: &str) -> bool {
        KNOWN_LANGUAGES.contains(&tag.to_lowercase().as_str())
    }

    fn detect_fenced(&self, text: &str) -> Vec<ProtectedRegion> {
        let mut regions = Vec::new();
        for pattern in [&self.fenced, &self.fenced_tilde] {
            for caps in pattern.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let lang = caps
                    .get(1)
                    .map(|m| m.as_str().trim().to_lowercase())
                    .filter(|l| !l.is_empty());
                let mut region = ProtectedRegion::new(
                    whole.start(),
                    whole.end(),
                    RegionKind::CodeBlock,
                    whole.as_str(),
                );
                // Unknown tags are kept as-is; the block is still code.
                region.language = lang;
                regions.push(region);
            }
        }
        regions
    }

    fn detect_inline(&self, text: &str) -> Vec<ProtectedRegion> {
        self.inline
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let inner = caps.get(1)?;
                if self.looks_like_code(inner.as_str()) {
                    Some(ProtectedRegion::new(
                        whole.start(),
                        whole.end(),
                        RegionKind::CodeInline,
                        whole.as_str(),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Indented blocks: two or more consecutive lines prefixed by four
    /// spaces or a tab, with blank lines allowed inside.
    fn detect_indented(&self, text: &str) -> Vec<ProtectedRegion> {
        let mut regions = Vec::new();
        let lines: Vec<&str> = text.split('\n').collect();
        let mut offsets = Vec::with_capacity(lines.len());
        let mut acc = 0usize;
        for line in &lines {
            offsets.push(acc);
            acc += line.len() + 1;
        }

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if !(line.starts_with("    ") || line.starts_with('\t')) {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            let mut non_blank = 1usize;
            while j < lines.len() {
                let next = lines[j];
                if next.trim().is_empty() {
                    j += 1;
                    continue;
                }
                if next.starts_with("    ") || next.starts_with('\t') {
                    non_blank += 1;
                    j += 1;
                } else {
                    break;
                }
            }

            // Drop trailing blank lines from the block.
            let mut last = j;
            while last > i && lines[last - 1].trim().is_empty() {
                last -= 1;
            }

            let start = offsets[i];
            let end = offsets[last - 1] + lines[last - 1].len();
            let content = &text[start..end];

            if non_blank >= 2 && self.looks_like_code_block(content) {
                regions.push(ProtectedRegion::new(
                    start,
                    end,
                    RegionKind::CodeBlock,
                    content,
                ));
            }

            i = j;
        }
        regions
    }

    /// Heuristic for whether an inline backtick span is actually code.
    #[allow(clippy::cast_precision_loss)]
    fn looks_like_code(&self, text: &str) -> bool {
        if ABBREVIATIONS.contains(&text.to_lowercase().as_str()) {
            return false;
        }

        // Short strings need stricter criteria.
        if text.len() <= 3 {
            return false;
        }
        if text.len() <= 5 {
            return text.chars().any(|c| matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '.' | '_'));
        }

        const SYMBOLS: &str = "()[]{}.<>_/\\-=+*&|!@#$%^;:";
        let symbol_count = text.chars().filter(|c| SYMBOLS.contains(*c)).count();
        if symbol_count as f64 / text.len() as f64 > 0.3 {
            return true;
        }

        const CODE_CHARS: &str = "()[]{}.<>_/\\";
        if text.chars().filter(|c| CODE_CHARS.contains(*c)).count() >= 2 {
            return true;
        }

        if self.camel_case.is_match(text) {
            return true;
        }
        if text.matches('_').count() >= 2 {
            return true;
        }
        // ALL_CAPS constants.
        if text.len() > 3
            && text.contains('_')
            && text
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
        {
            return true;
        }
        if self.call_pattern.is_match(text) {
            return true;
        }
        if self.comparison.is_match(text) {
            return true;
        }
        if text.contains("->") || text.contains("=>") {
            return true;
        }
        if self.dotted.is_match(text) {
            return true;
        }
        if self.mixed_digits.is_match(text) && !text.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }

        false
    }

    /// Heuristic for whether an indented block is code: more than 30% of
    /// its non-blank lines carry code punctuation, keywords, or
    /// assignments.
    #[allow(clippy::cast_precision_loss)]
    fn looks_like_code_block(&self, text: &str) -> bool {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return false;
        }

        const PUNCT: &[&str] = &[
            "(", ")", "{", "}", "[", "]", ";", "=", "==", "!=", "->", "=>", "::", "...", "||",
            "&&", "++", "--",
        ];

        let mut indicators = 0usize;
        for line in &lines {
            if PUNCT.iter().any(|p| line.contains(p)) {
                indicators += 1;
            }
            if self.keyword_line.is_match(line) {
                indicators += 1;
            }
            if self.assignment_line.is_match(line) {
                indicators += 1;
            }
        }

        indicators as f64 / lines.len() as f64 > 0.3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<ProtectedRegion> {
        CodeDetector::new().detect(text)
    }

    #[test]
    fn test_fenced_block_with_language() {
        let text = "Intro\n```python\nprint('hi')\n```\nOutro";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::CodeBlock);
        assert_eq!(regions[0].language.as_deref(), Some("python"));
    }

    #[test]
    fn test_fenced_block_without_language() {
        let text = "```\nsome code\n```";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].language.is_none());
    }

    #[test]
    fn test_tilde_fence() {
        let text = "~~~rust\nfn main() {}\n~~~";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_inline_code_function_call() {
        let regions = detect("Call `compute_total(x)` to finish.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::CodeInline);
        assert_eq!(regions[0].content, "`compute_total(x)`");
    }

    #[test]
    fn test_inline_snake_case() {
        let regions = detect("The `max_retry_count` setting matters.");
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_inline_camel_case() {
        let regions = detect("Use `getUserName` for that.");
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_inline_arrow() {
        let regions = detect("The closure `x => x + 1` maps values.");
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_inline_prose_rejected() {
        let regions = detect("He said `hello there friends` casually.");
        assert!(regions.is_empty());
    }

    #[test]
    fn test_inline_abbreviation_rejected() {
        let detector = CodeDetector::new();
        assert!(!detector.looks_like_code("e.g."));
        assert!(!detector.looks_like_code("Ph.D."));
    }

    #[test]
    fn test_inline_too_short_rejected() {
        let detector = CodeDetector::new();
        assert!(!detector.looks_like_code("ab"));
        assert!(detector.looks_like_code("a.b.c"));
    }

    #[test]
    fn test_indented_block() {
        let text = "Paragraph.\n\n    x = compute()\n    return x + 1\n\nMore prose.";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::CodeBlock);
        assert!(regions[0].content.contains("x = compute()"));
    }

    #[test]
    fn test_single_indented_line_rejected() {
        let text = "Paragraph.\n\n    just one indented quote line\n\nMore prose.";
        let regions = detect(text);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_indented_prose_rejected() {
        let text = "    a quotation spanning lines\n    with nothing codelike at all";
        let regions = detect(text);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_fenced_outranks_inline() {
        let text = "```\nuse `backticks` inside\n```";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::CodeBlock);
    }

    #[test]
    fn test_known_language() {
        assert!(CodeDetector::is_known_language("Python"));
        assert!(CodeDetector::is_known_language("rust"));
        assert!(!CodeDetector::is_known_language("klingon"));
    }

    #[test]
    fn test_has_code() {
        let detector = CodeDetector::new();
        assert!(detector.has_code("```\nx\n```"));
        assert!(detector.has_code("span `x` here"));
        assert!(!detector.has_code("no code at all"));
    }

    #[test]
    fn test_indented_block_with_blank_lines() {
        let text = "    let a = 1;\n\n    let b = 2;\nprose";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].content.ends_with("let b = 2;"));
    }

    #[test]
    fn test_tab_indented_block() {
        let text = "\tfn helper() {\n\t    body();\n\t}";
        let regions = detect(text);
        assert_eq!(regions.len(), 1);
    }
}
