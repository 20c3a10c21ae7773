//! STEM content protection: detectors and placeholder substitution.
//!
//! Formulas, code spans, and chemical formulas must survive translation
//! byte-for-byte. The detectors locate them, and the placeholder manager
//! swaps them for stable sentinels before the provider sees the text.

mod code;
mod formula;
mod placeholder;

pub use code::CodeDetector;
pub use formula::FormulaDetector;
pub use placeholder::{PlaceholderEntry, PlaceholderManager, ProcessedText, RestoreReport};

use crate::core::{ProtectedRegion, RegionKind};

/// Runs both detectors over a text blob and resolves cross-detector
/// overlaps.
///
/// Code blocks outrank formulas so math written inside code examples stays
/// code; inline spans rank below every block form. Returns a sorted,
/// pairwise non-overlapping region list.
#[must_use]
pub fn detect_regions(text: &str) -> Vec<ProtectedRegion> {
    let formula_detector = FormulaDetector::new();
    let code_detector = CodeDetector::new();
    detect_regions_with(&formula_detector, &code_detector, text)
}

/// Like [`detect_regions`] but reuses caller-owned detector instances.
#[must_use]
pub fn detect_regions_with(
    formula_detector: &FormulaDetector,
    code_detector: &CodeDetector,
    text: &str,
) -> Vec<ProtectedRegion> {
    let formulas = formula_detector.detect(text);
    let code = code_detector.detect(text);

    let mut ordered = Vec::with_capacity(formulas.len() + code.len());
    let block_code = code.iter().filter(|r| r.kind == RegionKind::CodeBlock);
    let block_formula = formulas.iter().filter(|r| r.kind == RegionKind::FormulaBlock);
    let inline_code = code.iter().filter(|r| r.kind == RegionKind::CodeInline);
    let inline_formula = formulas
        .iter()
        .filter(|r| matches!(r.kind, RegionKind::FormulaInline | RegionKind::Chemical));

    for region in block_code
        .chain(block_formula)
        .chain(inline_code)
        .chain(inline_formula)
    {
        ordered.push(region.clone());
    }

    crate::core::resolve_overlaps(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_regions_mixed() {
        let text = "The equation $E=mc^2$ and the call `f(x)` appear here.";
        let regions = detect_regions(text);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].content, "$E=mc^2$");
        assert_eq!(regions[1].content, "`f(x)`");
    }

    #[test]
    fn test_detect_regions_code_block_wins_over_math() {
        let text = "```python\nx = 2  # $a+b$\n```";
        let regions = detect_regions(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::CodeBlock);
    }

    #[test]
    fn test_detect_regions_sorted_non_overlapping() {
        let text = "Start $$a=b$$ middle `call()` end $x$.";
        let regions = detect_regions(text);
        for pair in regions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_detect_regions_plain_prose() {
        let regions = detect_regions("Just a plain sentence with nothing special.");
        assert!(regions.is_empty());
    }
}
