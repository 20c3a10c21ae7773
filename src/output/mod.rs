//! Streaming document output.
//!
//! Writers fold translation results into the final document in bounded
//! batches: each batch becomes a verified temporary artifact on disk, and
//! `merge_all` concatenates the artifacts into the output file. Peak
//! memory tracks the batch size, not the job size, and no temporary file
//! survives any terminal state — success, error, or drop.

mod docx;
mod pdf;
mod txt;

pub use docx::DocxWriter;
pub use pdf::PdfWriter;
pub use txt::TxtWriter;

use crate::core::TranslationResult;
use crate::error::{OutputError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain UTF-8 text.
    Txt,
    /// Office Open XML document.
    Docx,
    /// Portable Document Format.
    Pdf,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            other => Err(OutputError::UnknownFormat {
                name: other.to_string(),
            }),
        }
    }
}

/// Incremental, batch-at-a-time document writer.
pub trait DocumentWriter {
    /// Format identifier (`"txt"`, `"docx"`, `"pdf"`).
    fn format(&self) -> &'static str;

    /// Writes one batch to a temporary artifact, verifies it, and records
    /// it for the final merge. Returns the artifact path.
    ///
    /// # Errors
    ///
    /// Returns an error when the artifact cannot be written or fails
    /// verification; a partial artifact is removed before returning.
    fn add_batch(&mut self, results: &[TranslationResult], batch_idx: usize) -> Result<PathBuf>;

    /// Merges all recorded artifacts into the final output, verifies it,
    /// and removes the temporaries.
    ///
    /// # Errors
    ///
    /// Returns an error when merging or verification fails; temporaries
    /// are removed on the error path too.
    fn merge_all(&mut self) -> Result<PathBuf>;

    /// Removes any remaining temporary artifacts. Idempotent.
    fn cleanup(&mut self);

    /// Number of batches recorded so far.
    fn batch_count(&self) -> usize;
}

/// Creates a writer for the given format and output path.
#[must_use]
pub fn create_writer(format: OutputFormat, output_path: &Path) -> Box<dyn DocumentWriter> {
    match format {
        OutputFormat::Txt => Box::new(TxtWriter::new(output_path)),
        OutputFormat::Docx => Box::new(DocxWriter::new(output_path)),
        OutputFormat::Pdf => Box::new(PdfWriter::new(output_path)),
    }
}

/// Shared temp-directory bookkeeping for the concrete writers.
pub(crate) struct BatchDir {
    output_path: PathBuf,
    temp_dir: PathBuf,
    batch_files: Vec<PathBuf>,
    cleaned: bool,
}

impl BatchDir {
    pub(crate) fn new(output_path: &Path, format: &str) -> Self {
        let parent = output_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            output_path: output_path.to_path_buf(),
            temp_dir: parent.join(format!(".temp_{format}_batches")),
            batch_files: Vec::new(),
            cleaned: false,
        }
    }

    pub(crate) fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub(crate) fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Path for the next batch artifact, creating the temp dir on demand.
    pub(crate) fn batch_path(&mut self, batch_idx: usize, ext: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.temp_dir).map_err(|e| OutputError::WriteFailed {
            path: self.temp_dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.temp_dir.join(format!("batch_{batch_idx:04}.{ext}")))
    }

    pub(crate) fn record(&mut self, path: PathBuf) {
        self.batch_files.push(path);
        self.cleaned = false;
    }

    pub(crate) fn files(&self) -> &[PathBuf] {
        &self.batch_files
    }

    pub(crate) fn len(&self) -> usize {
        self.batch_files.len()
    }

    /// Deletes artifacts and the temp directory when empty. Idempotent.
    pub(crate) fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        for file in &self.batch_files {
            if let Err(e) = std::fs::remove_file(file) {
                if file.exists() {
                    tracing::warn!("failed to delete temp file {}: {e}", file.display());
                }
            }
        }
        if self.temp_dir.exists() {
            // Only removed when empty; foreign files are left alone.
            let _ = std::fs::remove_dir(&self.temp_dir);
        }
        self.cleaned = true;
    }

    /// Verifies an artifact exists and is non-empty.
    pub(crate) fn verify_non_empty(path: &Path) -> Result<()> {
        let metadata = std::fs::metadata(path).map_err(|e| OutputError::BatchInvalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if metadata.len() == 0 {
            return Err(OutputError::BatchInvalid {
                path: path.display().to_string(),
                reason: "empty file".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Drop for BatchDir {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("txt".parse::<OutputFormat>().ok(), Some(OutputFormat::Txt));
        assert_eq!("DOCX".parse::<OutputFormat>().ok(), Some(OutputFormat::Docx));
        assert_eq!("pdf".parse::<OutputFormat>().ok(), Some(OutputFormat::Pdf));
        assert!("epub".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_batch_dir_paths() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.txt");
        let mut batch_dir = BatchDir::new(&output, "txt");

        let path = batch_dir.batch_path(3, "txt").ok();
        assert!(path.is_some());
        if let Some(path) = path {
            assert!(path.ends_with(".temp_txt_batches/batch_0003.txt"));
        }
    }

    #[test]
    fn test_batch_dir_cleanup_removes_files() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.txt");
        let mut batch_dir = BatchDir::new(&output, "txt");

        let Ok(path) = batch_dir.batch_path(0, "txt") else {
            return;
        };
        let _ = std::fs::write(&path, "data");
        batch_dir.record(path.clone());

        batch_dir.cleanup();
        assert!(!path.exists());
        assert!(!batch_dir.temp_dir().exists());
    }

    #[test]
    fn test_batch_dir_drop_cleans() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let output = dir.path().join("out.txt");
        let temp_path;
        {
            let mut batch_dir = BatchDir::new(&output, "txt");
            let Ok(path) = batch_dir.batch_path(0, "txt") else {
                return;
            };
            let _ = std::fs::write(&path, "data");
            batch_dir.record(path.clone());
            temp_path = path;
        }
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_verify_non_empty() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let path = dir.path().join("artifact");
        let _ = std::fs::write(&path, "");
        assert!(BatchDir::verify_non_empty(&path).is_err());
        let _ = std::fs::write(&path, "content");
        assert!(BatchDir::verify_non_empty(&path).is_ok());
    }
}
