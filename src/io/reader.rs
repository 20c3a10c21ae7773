//! Memory-mapped document reading.
//!
//! Source documents for a 500-page job can run to tens of megabytes;
//! memory-mapping keeps the read cheap, and invalid UTF-8 sequences are
//! replaced rather than failing the job.

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Files at or below this size are read directly instead of mapped.
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Reads source documents as UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentReader;

impl DocumentReader {
    /// Creates a reader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reads a document to a string, replacing invalid UTF-8.
    ///
    /// Large files are memory-mapped; small ones are read directly.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing or unreadable.
    pub fn read(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let file = File::open(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let size = file
            .metadata()
            .map_err(|e| IoError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .len();

        if size <= MMAP_THRESHOLD {
            let bytes = std::fs::read(path).map_err(|e| IoError::ReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        // Mapping a file another process truncates can fault; inputs here
        // are job-owned documents, not shared logs.
        #[allow(unsafe_code)]
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| IoError::MmapFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        };
        Ok(String::from_utf8_lossy(&mmap).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_small_file() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let path = dir.path().join("doc.txt");
        let _ = std::fs::write(&path, "Xin chào thế giới");

        let text = DocumentReader::new().read(&path).unwrap_or_default();
        assert_eq!(text, "Xin chào thế giới");
    }

    #[test]
    fn test_read_missing_file() {
        let result = DocumentReader::new().read(Path::new("/nonexistent/doc.txt"));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_invalid_utf8_replaced() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let path = dir.path().join("doc.bin");
        let Ok(mut file) = File::create(&path) else {
            return;
        };
        let _ = file.write_all(b"ok \xff\xfe tail");
        drop(file);

        let text = DocumentReader::new().read(&path).unwrap_or_default();
        assert!(text.starts_with("ok "));
        assert!(text.ends_with(" tail"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_large_file_mmapped() {
        let Ok(dir) = tempfile::tempdir() else { return };
        let path = dir.path().join("big.txt");
        let body = "line of text\n".repeat(100_000);
        let _ = std::fs::write(&path, &body);

        let text = DocumentReader::new().read(&path).unwrap_or_default();
        assert_eq!(text.len(), body.len());
    }
}
