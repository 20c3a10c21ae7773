//! PDF streaming writer.
//!
//! Each batch is a complete PDF with simple wrapped-text pages; the merge
//! pass appends the pages of every batch, in order, into one document.
//! Text is set in the built-in Helvetica font, whose encoding cannot carry
//! characters outside Latin-1; non-encodable characters degrade to `?`.

use crate::core::TranslationResult;
use crate::error::{OutputError, Result};
use crate::output::{BatchDir, DocumentWriter};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;
const MAX_CHARS_PER_LINE: usize = 90;
const MAX_LINES_PER_PAGE: usize = 48;

/// Builds PDF batches and merges them page-by-page.
pub struct PdfWriter {
    dir: BatchDir,
}

impl PdfWriter {
    /// Creates a writer targeting `output_path`.
    #[must_use]
    pub fn new(output_path: &Path) -> Self {
        Self {
            dir: BatchDir::new(output_path, "pdf"),
        }
    }

    /// Wraps translations into page-sized line groups.
    fn layout_pages(results: &[TranslationResult]) -> Vec<Vec<String>> {
        let mut lines = Vec::new();
        for result in results {
            for raw_line in result.translated.lines() {
                let line = raw_line.trim_end();
                if line.is_empty() {
                    lines.push(String::new());
                    continue;
                }
                lines.extend(wrap_line(line, MAX_CHARS_PER_LINE));
            }
            lines.push(String::new());
        }

        let mut pages = Vec::new();
        for page_lines in lines.chunks(MAX_LINES_PER_PAGE) {
            if page_lines.iter().any(|l| !l.is_empty()) {
                pages.push(page_lines.to_vec());
            }
        }
        pages
    }

    /// Builds a single PDF document from page line groups.
    fn build_document(pages: &[Vec<String>]) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for page_lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
                Operation::new("TL", vec![LEADING.into()]),
                Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
            ];
            for line in page_lines {
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(to_latin1(line))],
                ));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let encoded = content.encode().map_err(|e| OutputError::Encoding {
                format: "pdf".to_string(),
                reason: e.to_string(),
            })?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = i64::try_from(kids.len()).unwrap_or(0);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        Ok(doc)
    }

    /// Verifies a PDF loads and has at least one page.
    fn verify_pdf(path: &Path) -> Result<usize> {
        let doc = Document::load(path).map_err(|e| OutputError::BatchInvalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(OutputError::BatchInvalid {
                path: path.display().to_string(),
                reason: "no pages".to_string(),
            }
            .into());
        }
        Ok(page_count)
    }

    /// Appends the pages of every batch, in order, into one document.
    fn merge_documents(batch_paths: &[PathBuf], output: &Path) -> Result<()> {
        let mut max_id = 1u32;
        let mut all_pages: Vec<(ObjectId, Object)> = Vec::new();
        let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

        for path in batch_paths {
            let mut doc = Document::load(path).map_err(|e| OutputError::BatchInvalid {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            for (_, object_id) in doc.get_pages() {
                let page = doc
                    .get_object(object_id)
                    .map_err(|e| OutputError::BatchInvalid {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?
                    .clone();
                all_pages.push((object_id, page));
            }
            all_objects.extend(doc.objects.clone());
        }

        if all_pages.is_empty() {
            return Err(OutputError::NoBatches.into());
        }

        let mut merged = Document::with_version("1.5");
        merged.max_id = max_id;
        let pages_id = merged.new_object_id();

        // Re-parent every page under the single merged page tree.
        let mut kids: Vec<Object> = Vec::with_capacity(all_pages.len());
        for (object_id, page) in all_pages {
            if let Object::Dictionary(mut dict) = page {
                dict.set("Parent", pages_id);
                all_objects.insert(object_id, Object::Dictionary(dict));
            }
            kids.push(object_id.into());
        }

        // Drop the per-batch catalogs and page trees; everything else is
        // carried over verbatim.
        for (object_id, object) in all_objects {
            let type_name = object
                .as_dict()
                .ok()
                .and_then(|d| d.get(b"Type").ok())
                .and_then(|t| t.as_name().ok());
            match type_name {
                Some(b"Catalog" | b"Pages") => {}
                _ => {
                    merged.objects.insert(object_id, object);
                }
            }
        }

        let count = i64::try_from(kids.len()).unwrap_or(0);
        merged.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = merged.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        merged.trailer.set("Root", catalog_id);
        merged.renumber_objects();
        merged.compress();

        merged.save(output).map_err(|e| OutputError::WriteFailed {
            path: output.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

impl DocumentWriter for PdfWriter {
    fn format(&self) -> &'static str {
        "pdf"
    }

    fn add_batch(&mut self, results: &[TranslationResult], batch_idx: usize) -> Result<PathBuf> {
        let path = self.dir.batch_path(batch_idx, "pdf")?;

        let pages = Self::layout_pages(results);
        if pages.is_empty() {
            return Err(OutputError::BatchInvalid {
                path: path.display().to_string(),
                reason: "batch has no text content".to_string(),
            }
            .into());
        }

        let write = || -> Result<()> {
            let mut doc = Self::build_document(&pages)?;
            doc.save(&path).map_err(|e| OutputError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            BatchDir::verify_non_empty(&path)?;
            Self::verify_pdf(&path)?;
            Ok(())
        };

        if let Err(e) = write() {
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
        let outcome = Self::merge_documents(self.dir.files(), &output);
        self.dir.cleanup();
        outcome?;

        Self::verify_pdf(&output).map_err(|e| {
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

/// Greedy word wrap to a character budget.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Degrades text to Latin-1 for the built-in Type1 font.
fn to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code < 256 { u8::try_from(code).unwrap_or(b'?') } else { b'?' }
        })
        .collect()
}
