//! Progress event stream.
//!
//! An optional sink receives job lifecycle events. Broadcast failures are
//! logged and swallowed: progress reporting must never fail the job.

use serde::Serialize;

/// Job lifecycle events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A job began processing.
    JobStarted {
        /// Job identifier.
        job_id: String,
        /// Total chunks in the job.
        total_chunks: usize,
        /// Total output batches planned.
        total_batches: usize,
        /// Unix seconds.
        timestamp: f64,
    },
    /// One chunk finished translating.
    ChunkTranslated {
        /// Job identifier.
        job_id: String,
        /// Chunk identifier.
        chunk_id: u64,
        /// First ≤200 characters of the translation.
        preview: String,
        /// Quality score of the translation.
        quality_score: f64,
        /// Unix seconds.
        timestamp: f64,
    },
    /// A batch of chunks completed translation.
    BatchCompleted {
        /// Job identifier.
        job_id: String,
        /// 1-based batch number.
        batch: usize,
        /// Total batches planned.
        total_batches: usize,
        /// Overall progress in `[0, 1]`.
        progress: f64,
        /// Chunks completed so far.
        chunks_completed: usize,
        /// Unix seconds.
        timestamp: f64,
    },
    /// A batch artifact was written to disk.
    BatchExported {
        /// Job identifier.
        job_id: String,
        /// 1-based batch number.
        batch: usize,
        /// Path to the partial artifact.
        partial_file: String,
        /// Unix seconds.
        timestamp: f64,
    },
    /// The job finished.
    JobCompleted {
        /// Job identifier.
        job_id: String,
        /// Total chunks processed.
        total_chunks: usize,
        /// Estimated memory saved by streaming, in MiB.
        memory_saved_mb: f64,
        /// Unix seconds.
        timestamp: f64,
    },
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event. Errors are the sink's problem; the pipeline
    /// ignores the return value beyond logging.
    fn broadcast(&self, event: &ProgressEvent) -> Result<(), String>;
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn broadcast(&self, _event: &ProgressEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Delivers an event, logging (never propagating) sink failures.
pub(crate) fn emit(sink: &dyn ProgressSink, event: &ProgressEvent) {
    if let Err(e) = sink.broadcast(event) {
        tracing::warn!("progress broadcast failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<String>>);

    impl ProgressSink for Recording {
        fn broadcast(&self, event: &ProgressEvent) -> Result<(), String> {
            let json = serde_json::to_string(event).map_err(|e| e.to_string())?;
            self.0.lock().map_err(|e| e.to_string())?.push(json);
            Ok(())
        }
    }

    struct Failing;

    impl ProgressSink for Failing {
        fn broadcast(&self, _event: &ProgressEvent) -> Result<(), String> {
            Err("socket closed".to_string())
        }
    }

    #[test]
    fn test_event_serialization_fields() {
        let event = ProgressEvent::ChunkTranslated {
            job_id: "job_1".to_string(),
            chunk_id: 4,
            preview: "Xin chào".to_string(),
            quality_score: 0.92,
            timestamp: 1000.0,
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event\":\"chunk_translated\""));
        assert!(json.contains("\"chunk_id\":4"));
        assert!(json.contains("\"quality_score\":0.92"));
    }

    #[test]
    fn test_recording_sink() {
        let sink = Recording(Mutex::new(Vec::new()));
        emit(
            &sink,
            &ProgressEvent::JobStarted {
                job_id: "j".to_string(),
                total_chunks: 10,
                total_batches: 2,
                timestamp: 0.0,
            },
        );
        assert_eq!(sink.0.lock().map(|v| v.len()).unwrap_or(0), 1);
    }

    #[test]
    fn test_failing_sink_does_not_panic() {
        emit(
            &Failing,
            &ProgressEvent::JobCompleted {
                job_id: "j".to_string(),
                total_chunks: 1,
                memory_saved_mb: 0.0,
                timestamp: 0.0,
            },
        );
    }

    #[test]
    fn test_null_sink() {
        let sink = NullSink;
        assert!(
            sink.broadcast(&ProgressEvent::BatchExported {
                job_id: "j".to_string(),
                batch: 1,
                partial_file: "/tmp/x".to_string(),
                timestamp: 0.0,
            })
            .is_ok()
        );
    }
}
