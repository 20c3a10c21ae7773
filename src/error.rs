//! Error types for translation pipeline operations.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! all pipeline operations including storage, chunking, provider calls,
//! output writing, and CLI commands.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (translation memory, chunk cache, checkpoints).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Chunking-related errors (text segmentation).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Translation provider errors.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Output document writer errors.
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for the three durable stores.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Checkpoint not found for a job id.
    #[error("checkpoint not found: {job_id}")]
    CheckpointNotFound {
        /// Job id that has no checkpoint.
        job_id: String,
    },

    /// Translation memory segment not found.
    #[error("segment not found: {id}")]
    SegmentNotFound {
        /// Segment id that was not found.
        id: i64,
    },

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Chunking-specific errors for text segmentation.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Context window exceeds chunk size.
    #[error("context window {window} must be less than max chars {max_chars}")]
    ContextWindowTooLarge {
        /// Context window size.
        window: usize,
        /// Maximum characters per chunk.
        max_chars: usize,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Translation provider errors, classified for retry decisions.
///
/// The dispatcher pattern-matches on these variants: rate limits get the
/// long backoff, transport/timeout/5xx get the standard backoff, and other
/// HTTP 4xx responses fail the task permanently.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP 429 from the provider.
    #[error("rate limited (429)")]
    RateLimited,

    /// Non-429 HTTP error status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body, if any.
        message: String,
    },

    /// Connection or transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded its timeout.
    #[error("timeout after {seconds}s")]
    Timeout {
        /// Timeout that elapsed, in seconds.
        seconds: u64,
    },

    /// Provider returned an empty translation.
    #[error("empty translation from provider")]
    EmptyResponse,

    /// Provider response body could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Unknown provider name requested.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name that was requested.
        name: String,
    },

    /// Missing API key for the configured provider.
    #[error("missing API key for provider {provider}")]
    ApiKeyMissing {
        /// Provider lacking credentials.
        provider: String,
    },
}

impl ProviderError {
    /// Whether the dispatcher should retry after this error.
    ///
    /// Timeouts, transport failures, HTTP 5xx, 429, and empty responses are
    /// retryable; other HTTP 4xx responses are permanent.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited
            | Self::Transport(_)
            | Self::Timeout { .. }
            | Self::EmptyResponse => true,
            Self::Http { status, .. } => *status >= 500,
            Self::InvalidResponse(_)
            | Self::UnsupportedProvider { .. }
            | Self::ApiKeyMissing { .. } => false,
        }
    }

    /// Whether this error should use the longer rate-limit backoff.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Output writer errors.
#[derive(Error, Debug)]
pub enum OutputError {
    /// A batch artifact failed verification.
    #[error("batch artifact invalid: {path}: {reason}")]
    BatchInvalid {
        /// Path to the failing artifact.
        path: String,
        /// Why verification failed.
        reason: String,
    },

    /// The merged output failed verification.
    #[error("final output invalid: {path}: {reason}")]
    FinalInvalid {
        /// Path to the output file.
        path: String,
        /// Why verification failed.
        reason: String,
    },

    /// No batches were added before merging.
    #[error("no batches to merge")]
    NoBatches,

    /// Format-specific encoding failure.
    #[error("{format} encoding failed: {reason}")]
    Encoding {
        /// Output format name.
        format: String,
        /// Failure detail.
        reason: String,
    },

    /// Unknown output format requested.
    #[error("unknown output format: {name}")]
    UnknownFormat {
        /// Format string that was not recognized.
        name: String,
    },

    /// Generic write failure.
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: String,
        /// Failure detail.
        reason: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Job was cancelled.
    #[error("operation cancelled by user")]
    Cancelled,
}

// Implement From traits for standard library and third-party errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: test error");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::CheckpointNotFound {
            job_id: "job_7".to_string(),
        };
        assert_eq!(err.to_string(), "checkpoint not found: job_7");

        let err = StorageError::SegmentNotFound { id: 42 };
        assert_eq!(err.to_string(), "segment not found: 42");
    }

    #[test]
    fn test_provider_error_retryable() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Timeout { seconds: 120 }.is_retryable());
        assert!(ProviderError::Transport("reset".to_string()).is_retryable());
        assert!(
            ProviderError::Http {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Http {
                status: 401,
                message: "unauthorized".to_string()
            }
            .is_retryable()
        );
        assert!(!ProviderError::InvalidResponse("bad json".to_string()).is_retryable());
    }

    #[test]
    fn test_provider_error_rate_limited() {
        assert!(ProviderError::RateLimited.is_rate_limited());
        assert!(
            !ProviderError::Http {
                status: 500,
                message: String::new()
            }
            .is_rate_limited()
        );
    }

    #[test]
    fn test_output_error_display() {
        let err = OutputError::BatchInvalid {
            path: "/tmp/batch_0001.docx".to_string(),
            reason: "empty".to_string(),
        };
        assert!(err.to_string().contains("batch_0001.docx"));

        let err = OutputError::NoBatches;
        assert_eq!(err.to_string(), "no batches to merge");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_storage() {
        let storage_err = StorageError::Transaction("rollback".to_string());
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_error_from_provider() {
        let provider_err = ProviderError::EmptyResponse;
        let err: Error = provider_err.into();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: StorageError = rusqlite_err.into();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err: serde_json::Error = match serde_json::from_str::<i32>("invalid") {
            Err(e) => e,
            Ok(_) => return,
        };
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_chunking_error_display() {
        let err = ChunkingError::ContextWindowTooLarge {
            window: 500,
            max_chars: 400,
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::Cancelled;
        assert!(err.to_string().contains("cancelled"));
    }
}
