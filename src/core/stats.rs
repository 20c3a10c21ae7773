//! Dispatcher task states and processing statistics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of one dispatched translation task.
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Queued, not yet started.
    Pending,
    /// First attempt in flight.
    Running,
    /// A retry attempt in flight.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Exhausted retries, hit a permanent error, or was cancelled.
    Failed,
}

impl TaskStatus {
    /// Whether the task has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Counters accumulated by the dispatcher over one job.
///
/// All counters are monotonic within a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Tasks submitted.
    pub total_tasks: usize,
    /// Tasks that completed successfully.
    pub completed: usize,
    /// Tasks that terminated in `Failed`.
    pub failed: usize,
    /// Tasks that needed at least one retry.
    pub retried: usize,
    /// Lookup cache hits (TM or chunk cache).
    pub cache_hits: usize,
    /// Lookup cache misses.
    pub cache_misses: usize,
    /// Sum of per-task wall time.
    pub total_time: Duration,
    /// Mean wall time per completed task.
    pub avg_time_per_task: Duration,
}

impl ProcessingStats {
    /// Creates stats for a job of `total_tasks` tasks.
    #[must_use]
    pub fn new(total_tasks: usize) -> Self {
        Self {
            total_tasks,
            ..Self::default()
        }
    }

    /// Records one terminal task outcome.
    pub fn record(&mut self, status: TaskStatus, retries: usize, elapsed: Option<Duration>) {
        match status {
            TaskStatus::Completed => {
                self.completed += 1;
                if let Some(elapsed) = elapsed {
                    self.total_time += elapsed;
                }
            }
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Retrying => {}
        }
        if retries > 0 {
            self.retried += 1;
        }
        if self.completed > 0 {
            self.avg_time_per_task = self.total_time / u32::try_from(self.completed).unwrap_or(1);
        }
    }

    /// Merges counters from another stats block (batch aggregation).
    pub fn absorb(&mut self, other: &Self) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.retried += other.retried;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.total_time += other.total_time;
        if self.completed > 0 {
            self.avg_time_per_task = self.total_time / u32::try_from(self.completed).unwrap_or(1);
        }
    }

    /// Completion ratio in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_ratio(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.completed as f64 / self.total_tasks as f64
        }
    }
}
