//! DOCX streaming writer.
//!
//! Each batch is a complete, openable document. The merge pass re-emits
//! every batch paragraph into the final document, re-applying the heading
//! heuristic so chapter and section lines keep their styles.

use crate::core::TranslationResult;
use crate::error::{OutputError, Result};
use crate::output::{BatchDir, DocumentWriter};
use docx_rs::{AlignmentType, Docx, Paragraph, Run, read_docx};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[allow(clippy::unwrap_used)]
fn chapter_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"(?i)^(CHAPTER|CHƯƠNG|PHẦN)\s+(\d+|[IVXLCDM]+)").unwrap(),
            Regex::new(r"(?i)^CHƯƠNG\s+\d+\s*[:：\-–—]").unwrap(),
            Regex::new(r"(?i)^CHAPTER\s+\d+\s*[:：\-–—]").unwrap(),
        ]
    })
}

#[allow(clippy::unwrap_used)]
fn section_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"^(\d+\.)+\s*\w").unwrap(),
            Regex::new(r"(?i)^(SECTION|PHẦN|MỤC)\s+\d+").unwrap(),
            Regex::new(r"^[IVXLCDM]+\.\s+\w").unwrap(),
        ]
    })
}

/// Paragraph classification for style mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParaKind {
    ChapterHeading,
    SectionHeading,
    CenteredTitle,
    Body,
}

fn classify_paragraph(text: &str) -> ParaKind {
    let text = text.trim();
    if chapter_patterns().iter().any(|p| p.is_match(text)) {
        return ParaKind::ChapterHeading;
    }
    if section_patterns().iter().any(|p| p.is_match(text)) {
        return ParaKind::SectionHeading;
    }
    // Short, shouty single lines read as titles.
    if text.len() < 80
        && !text.contains('\n')
        && text.chars().any(char::is_alphabetic)
        && text == text.to_uppercase()
    {
        return ParaKind::CenteredTitle;
    }
    ParaKind::Body
}

fn styled_paragraph(text: &str) -> Paragraph {
    match classify_paragraph(text) {
        ParaKind::ChapterHeading => Paragraph::new()
            .style("Heading1")
            .add_run(Run::new().add_text(text)),
        ParaKind::SectionHeading => Paragraph::new()
            .style("Heading2")
            .add_run(Run::new().add_text(text)),
        ParaKind::CenteredTitle => Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(Run::new().add_text(text).bold()),
        ParaKind::Body => Paragraph::new().add_run(Run::new().add_text(text)),
    }
}

/// Splits a translation into paragraph strings: blank lines separate
/// paragraphs, single line breaks within one become separate paragraphs
/// too (matching how the merged document is re-read).
fn paragraph_texts(translated: &str) -> Vec<String> {
    let mut out = Vec::new();
    for block in translated.split("\n\n") {
        for line in block.lines() {
            let line = line.trim();
            if !line.is_empty() {
                out.push(line.to_string());
            }
        }
    }
    out
}

/// Builds DOCX batches and merges them paragraph-by-paragraph.
pub struct DocxWriter {
    dir: BatchDir,
}

impl DocxWriter {
    /// Creates a writer targeting `output_path`.
    #[must_use]
    pub fn new(output_path: &Path) -> Self {
        Self {
            dir: BatchDir::new(output_path, "docx"),
        }
    }

    /// Writes a document to disk.
    fn save_docx(docx: Docx, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| OutputError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        docx.build()
            .pack(file)
            .map_err(|e| OutputError::Encoding {
                format: "docx".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Opens a document and returns its paragraph texts, verifying it is
    /// well-formed and has content.
    fn read_paragraphs(path: &Path) -> Result<Vec<String>> {
        let bytes = std::fs::read(path).map_err(|e| OutputError::BatchInvalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let docx = read_docx(&bytes).map_err(|e| OutputError::BatchInvalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paragraphs = Vec::new();
        for child in &docx.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let text = p.raw_text();
                if !text.trim().is_empty() {
                    paragraphs.push(text);
                }
            }
        }

        if paragraphs.is_empty() {
            return Err(OutputError::BatchInvalid {
                path: path.display().to_string(),
                reason: "no text content".to_string(),
            }
            .into());
        }
        Ok(paragraphs)
    }
}

impl DocumentWriter for DocxWriter {
    fn format(&self) -> &'static str {
        "docx"
    }

    fn add_batch(&mut self, results: &[TranslationResult], batch_idx: usize) -> Result<PathBuf> {
        let path = self.dir.batch_path(batch_idx, "docx")?;

        let mut docx = Docx::new();
        let mut wrote_any = false;
        for result in results {
            for text in paragraph_texts(&result.translated) {
                docx = docx.add_paragraph(styled_paragraph(&text));
                wrote_any = true;
            }
        }
        if !wrote_any {
            return Err(OutputError::BatchInvalid {
                path: path.display().to_string(),
                reason: "batch has no text content".to_string(),
            }
            .into());
        }

        if let Err(e) = Self::save_docx(docx, &path) {
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
        if let Err(e) = BatchDir::verify_non_empty(&path).and_then(|()| {
            Self::read_paragraphs(&path).map(|_| ())
        }) {
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        self.dir.record(path.clone());
        Ok(path)
    }

    fn merge_all(&mut self) -> Result<PathBuf> {
        if self.dir.len() == 0 {
            return Err(OutputError::NoBatches.into());
        }

        let output = self.dir.output_path().to_path_buf();
        let merge = || -> Result<()> {
            let mut merged = Docx::new();
            for batch in self.dir.files() {
                for text in Self::read_paragraphs(batch)? {
                    merged = merged.add_paragraph(styled_paragraph(&text));
                }
            }
            Self::save_docx(merged, &output)?;
            Ok(())
        };

        let outcome = merge();
        self.dir.cleanup();
        outcome?;

        // The merged document must itself open and carry text.
        Self::read_paragraphs(&output).map_err(|e| {
            crate::error::Error::Output(OutputError::FinalInvalid {
                path: output.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        Ok(output)
    }

    fn cleanup(&mut self) {
        self.dir.cleanup();
    }

    fn batch_count(&self) -> usize {
        self.dir.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: u64, text: &str) -> TranslationResult {
        TranslationResult::new(id, String::new(), text.to_string())
    }

    #[test]
    fn test_classify_paragraphs() {
        assert_eq!(classify_paragraph("CHAPTER 1"), ParaKind::ChapterHeading);
        assert_eq!(classify_paragraph("Chương 3: Mở đầu"), ParaKind::ChapterHeading);
        assert_eq!(classify_paragraph("1.2 Background"), ParaKind::SectionHeading);
        assert_eq!(classify_paragraph("IV. Methods"), ParaKind::SectionHeading);
        assert_eq!(classify_paragraph("A SHORT TITLE"), ParaKind::CenteredTitle);
        assert_eq!(classify_paragraph("Just an ordinary sentence."), ParaKind::Body);
    }

    #[test]
    fn test_paragraph_texts_split() {
        let texts = paragraph_texts("First para.\n\nSecond line A\nSecond line B\n\n");
        assert_eq!(texts, vec!["First para.", "Second line A", "Second line B"]);
    }

    #[test]
    fn test_docx_batch_roundtrip() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.docx");
        let mut writer = DocxWriter::new(&output);

        let added = writer.add_batch(&[result(1, "Paragraph one."), result(2, "Paragraph two.")], 0);
        assert!(added.is_ok(), "{added:?}");

        if let Ok(path) = added {
            let paragraphs = DocxWriter::read_paragraphs(&path).unwrap_or_default();
            assert_eq!(paragraphs.len(), 2);
            assert_eq!(paragraphs[0], "Paragraph one.");
        }
    }

    #[test]
    fn test_docx_merge_counts_paragraphs() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.docx");
        let mut writer = DocxWriter::new(&output);

        let batch_a: Vec<_> = (1..=3).map(|i| result(i, &format!("Paragraph {i}."))).collect();
        let batch_b: Vec<_> = (4..=5).map(|i| result(i, &format!("Paragraph {i}."))).collect();
        assert!(writer.add_batch(&batch_a, 0).is_ok());
        assert!(writer.add_batch(&batch_b, 1).is_ok());

        assert!(writer.merge_all().is_ok());
        let paragraphs = DocxWriter::read_paragraphs(&output).unwrap_or_default();
        assert_eq!(paragraphs.len(), 5);
    }

    #[test]
    fn test_docx_cleanup_after_merge() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.docx");
        let mut writer = DocxWriter::new(&output);

        let _ = writer.add_batch(&[result(1, "Text.")], 0);
        let temp_dir = dir.path().join(".temp_docx_batches");
        assert!(temp_dir.exists());

        let _ = writer.merge_all();
        assert!(!temp_dir.exists());
    }

    #[test]
    fn test_docx_empty_batch_rejected_and_no_orphans() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.docx");
        let mut writer = DocxWriter::new(&output);

        assert!(writer.add_batch(&[], 0).is_err());
        let temp_dir = dir.path().join(".temp_docx_batches");
        let leftover = std::fs::read_dir(&temp_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_docx_heading_survives_merge() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.docx");
        let mut writer = DocxWriter::new(&output);

        let _ = writer.add_batch(&[result(1, "CHAPTER 1\n\nBody text follows here.")], 0);
        assert!(writer.merge_all().is_ok());

        let paragraphs = DocxWriter::read_paragraphs(&output).unwrap_or_default();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(classify_paragraph(&paragraphs[0]), ParaKind::ChapterHeading);
    }
}
