//! Plain-text streaming writer.

use crate::core::TranslationResult;
use crate::error::{OutputError, Result};
use crate::output::{BatchDir, DocumentWriter};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes batches as UTF-8 text files and concatenates them bytewise.
pub struct TxtWriter {
    dir: BatchDir,
}

impl TxtWriter {
    /// Creates a writer targeting `output_path`.
    #[must_use]
    pub fn new(output_path: &Path) -> Self {
        Self {
            dir: BatchDir::new(output_path, "txt"),
        }
    }
}

impl DocumentWriter for TxtWriter {
    fn format(&self) -> &'static str {
        "txt"
    }

    fn add_batch(&mut self, results: &[TranslationResult], batch_idx: usize) -> Result<PathBuf> {
        let path = self.dir.batch_path(batch_idx, "txt")?;

        let mut body = String::new();
        for result in results {
            body.push_str(result.translated.trim_end());
            body.push_str("\n\n");
        }

        if let Err(e) = std::fs::write(&path, body.as_bytes()) {
            let _ = std::fs::remove_file(&path);
            return Err(OutputError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into());
        }

        if let Err(e) = BatchDir::verify_non_empty(&path) {
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
            let mut out = std::fs::File::create(&output).map_err(|e| OutputError::WriteFailed {
                path: output.display().to_string(),
                reason: e.to_string(),
            })?;
            for batch in self.dir.files() {
                let bytes = std::fs::read(batch).map_err(|e| OutputError::BatchInvalid {
                    path: batch.display().to_string(),
                    reason: e.to_string(),
                })?;
                out.write_all(&bytes).map_err(|e| OutputError::WriteFailed {
                    path: output.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
            out.flush().map_err(|e| OutputError::WriteFailed {
                path: output.display().to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        };

        let outcome = merge();
        self.dir.cleanup();
        outcome?;

        let size = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(OutputError::FinalInvalid {
                path: output.display().to_string(),
                reason: "empty file".to_string(),
            }
            .into());
        }
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
    fn test_txt_batches_concatenate() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.txt");
        let mut writer = TxtWriter::new(&output);

        assert!(writer.add_batch(&[result(1, "first"), result(2, "second")], 0).is_ok());
        assert!(writer.add_batch(&[result(3, "third")], 1).is_ok());
        assert_eq!(writer.batch_count(), 2);

        let merged = writer.merge_all();
        assert!(merged.is_ok());

        let content = std::fs::read_to_string(&output).unwrap_or_default();
        assert_eq!(content, "first\n\nsecond\n\nthird\n\n");
    }

    #[test]
    fn test_txt_cleanup_after_merge() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.txt");
        let mut writer = TxtWriter::new(&output);

        let _ = writer.add_batch(&[result(1, "x")], 0);
        let temp_dir = dir.path().join(".temp_txt_batches");
        assert!(temp_dir.exists());

        let _ = writer.merge_all();
        assert!(!temp_dir.exists());
    }

    #[test]
    fn test_txt_merge_without_batches_fails() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let mut writer = TxtWriter::new(&dir.path().join("out.txt"));
        assert!(writer.merge_all().is_err());
    }

    #[test]
    fn test_txt_empty_batch_rejected() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let mut writer = TxtWriter::new(&dir.path().join("out.txt"));
        let outcome = writer.add_batch(&[], 0);
        assert!(outcome.is_err());
    }

    #[test]
    fn test_txt_unicode_passthrough() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.txt");
        let mut writer = TxtWriter::new(&output);

        let _ = writer.add_batch(&[result(1, "Tiếng Việt đầy đủ dấu")], 0);
        let _ = writer.merge_all();

        let content = std::fs::read_to_string(&output).unwrap_or_default();
        assert!(content.contains("Tiếng Việt đầy đủ dấu"));
    }
}
