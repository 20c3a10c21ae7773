//! Bounded-concurrency chunk dispatcher.
//!
//! Runs one future per chunk, gated by a counting semaphore so at most
//! `max_concurrency` provider calls are in flight per dispatcher instance.
//! Retryable failures back off exponentially with jitter; rate limits get
//! a longer variant. Cancellation is polled at the head of every retry
//! loop, before any provider call.

use crate::core::{ProcessingStats, TaskStatus, TranslationChunk, TranslationResult};
use crate::error::{Error, ProviderError};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout};

/// Cooperative cancellation token.
///
/// Cloned freely; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum provider calls in flight.
    pub max_concurrency: usize,
    /// Retry attempts per task after the first.
    pub max_retries: usize,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            max_retries: 3,
            timeout: Duration::from_secs(120),
        }
    }
}

/// What the dispatcher hands back: successful results (unordered — callers
/// sort by chunk id), per-task failures, and counters.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Results of tasks that completed.
    pub results: Vec<TranslationResult>,
    /// `(chunk_id, overlap_char_count, source, error)` for failed tasks.
    pub failures: Vec<FailedTask>,
    /// Aggregated counters.
    pub stats: ProcessingStats,
}

/// Record of one task that ended in the failed state.
#[derive(Debug, Clone)]
pub struct FailedTask {
    /// Chunk that failed.
    pub chunk_id: u64,
    /// Source text of the chunk.
    pub source: String,
    /// Overlap bookkeeping of the chunk.
    pub overlap_char_count: usize,
    /// Final error string.
    pub error: String,
}

/// Computes the pre-jitter backoff delay for retry attempt `n` (1-based).
///
/// Standard failures sleep `min(2^n, 10)` seconds; rate-limited failures
/// sleep `min(2^(n+2), 30)`. Jitter added by the dispatcher is at most 10%
/// (30% for rate limits).
#[must_use]
pub fn backoff_delay(attempt: u32, rate_limited: bool) -> Duration {
    let secs = if rate_limited {
        2u64.saturating_pow(attempt + 2).min(30)
    } else {
        2u64.saturating_pow(attempt).min(10)
    };
    Duration::from_secs(secs)
}

/// Applies proportional random jitter to a base delay.
fn with_jitter(base: Duration, fraction: f64) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.0..=fraction);
    base.mul_f64(1.0 + jitter)
}

/// Runs chunk-translation futures with bounded concurrency and retry.
///
/// The worker receives each chunk and yields either a result or an error;
/// the dispatcher owns timeouts, retries, backoff, and cancellation. A
/// task that exhausts retries, hits a permanent error, or observes
/// cancellation lands in [`DispatchOutcome::failures`] without disturbing
/// its siblings.
#[derive(Debug)]
pub struct ParallelDispatcher {
    config: DispatcherConfig,
    cancellation: CancellationFlag,
}

impl ParallelDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(config: DispatcherConfig, cancellation: CancellationFlag) -> Self {
        Self {
            config,
            cancellation,
        }
    }

    /// The dispatcher's cancellation flag.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Processes every chunk through `worker`, invoking `on_complete` for
    /// each successful result as it lands.
    pub async fn run<'a, W, Fut, C>(
        &self,
        chunks: &'a [TranslationChunk],
        worker: W,
        on_complete: C,
    ) -> DispatchOutcome
    where
        W: Fn(&'a TranslationChunk) -> Fut,
        Fut: Future<Output = crate::error::Result<TranslationResult>>,
        C: FnMut(&TranslationResult),
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut stats = ProcessingStats::new(chunks.len());

        // Tasks run interleaved on one executor; the RefCell borrow is
        // never held across an await point.
        let on_complete = std::cell::RefCell::new(on_complete);
        let tasks = chunks.iter().map(|chunk| {
            let semaphore = Arc::clone(&semaphore);
            let worker = &worker;
            let on_complete = &on_complete;
            async move {
                let outcome = self.run_task(chunk, worker, semaphore).await;
                if outcome.status == TaskStatus::Completed {
                    if let Some(result) = &outcome.result {
                        (on_complete.borrow_mut())(result);
                    }
                }
                outcome
            }
        });

        let outcomes = futures_util::future::join_all(tasks).await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            stats.record(outcome.status, outcome.retries, outcome.elapsed);
            match (outcome.status, outcome.result) {
                (TaskStatus::Completed, Some(result)) => results.push(result),
                _ => failures.push(FailedTask {
                    chunk_id: outcome.chunk_id,
                    source: outcome.source,
                    overlap_char_count: outcome.overlap_char_count,
                    error: outcome.error.unwrap_or_else(|| "unknown error".to_string()),
                }),
            }
        }

        DispatchOutcome {
            results,
            failures,
            stats,
        }
    }

    /// One task: semaphore-gated attempt loop with classified retries.
    async fn run_task<'a, W, Fut>(
        &self,
        chunk: &'a TranslationChunk,
        worker: &W,
        semaphore: Arc<Semaphore>,
    ) -> TaskOutcome
    where
        W: Fn(&'a TranslationChunk) -> Fut,
        Fut: Future<Output = crate::error::Result<TranslationResult>>,
    {
        let mut outcome = TaskOutcome::pending(chunk);

        let Ok(_permit) = semaphore.acquire().await else {
            outcome.fail("semaphore closed");
            return outcome;
        };

        let started = Instant::now();
        while outcome.retries <= self.config.max_retries {
            // Cancellation is polled before every provider call.
            if self.cancellation.is_cancelled() {
                outcome.fail("cancelled by user");
                return outcome;
            }

            outcome.status = if outcome.retries == 0 {
                TaskStatus::Running
            } else {
                TaskStatus::Retrying
            };

            let attempt = timeout(self.config.timeout, worker(chunk)).await;
            match attempt {
                Ok(Ok(result)) => {
                    outcome.status = TaskStatus::Completed;
                    outcome.result = Some(result);
                    outcome.elapsed = Some(started.elapsed());
                    return outcome;
                }
                Ok(Err(error)) => {
                    let (retryable, rate_limited) = classify(&error);
                    outcome.error = Some(error.to_string());
                    if !retryable {
                        outcome.status = TaskStatus::Failed;
                        tracing::error!(
                            chunk_id = chunk.id,
                            "task failed permanently: {}",
                            outcome.error.as_deref().unwrap_or_default()
                        );
                        return outcome;
                    }
                    outcome.retries += 1;
                    tracing::warn!(
                        chunk_id = chunk.id,
                        retry = outcome.retries,
                        max = self.config.max_retries,
                        "retryable failure: {}",
                        outcome.error.as_deref().unwrap_or_default()
                    );
                    if outcome.retries <= self.config.max_retries {
                        let retries = u32::try_from(outcome.retries).unwrap_or(u32::MAX);
                        let base = backoff_delay(retries, rate_limited);
                        let fraction = if rate_limited { 0.3 } else { 0.1 };
                        tokio::time::sleep(with_jitter(base, fraction)).await;
                    }
                }
                Err(_) => {
                    outcome.error = Some(format!(
                        "timeout after {}s",
                        self.config.timeout.as_secs()
                    ));
                    outcome.retries += 1;
                    tracing::warn!(
                        chunk_id = chunk.id,
                        retry = outcome.retries,
                        "attempt timed out"
                    );
                    if outcome.retries <= self.config.max_retries {
                        let retries = u32::try_from(outcome.retries).unwrap_or(u32::MAX);
                        tokio::time::sleep(with_jitter(backoff_delay(retries, false), 0.1)).await;
                    }
                }
            }
        }

        outcome.status = TaskStatus::Failed;
        outcome
    }
}

/// Whether an error is retryable, and whether it gets the long backoff.
fn classify(error: &Error) -> (bool, bool) {
    match error {
        Error::Provider(p) => (p.is_retryable(), p.is_rate_limited()),
        _ => (false, false),
    }
}

/// Internal per-task bookkeeping.
struct TaskOutcome {
    chunk_id: u64,
    source: String,
    overlap_char_count: usize,
    status: TaskStatus,
    retries: usize,
    result: Option<TranslationResult>,
    error: Option<String>,
    elapsed: Option<Duration>,
}

impl TaskOutcome {
    fn pending(chunk: &TranslationChunk) -> Self {
        Self {
            chunk_id: chunk.id,
            source: chunk.text.clone(),
            overlap_char_count: chunk.overlap_char_count,
            status: TaskStatus::Pending,
            retries: 0,
            result: None,
            error: None,
            elapsed: None,
        }
    }

    fn fail(&mut self, reason: &str) {
        self.status = TaskStatus::Failed;
        self.error = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::cell::Cell;
    use std::cell::RefCell;

    fn chunk(id: u64, text: &str) -> TranslationChunk {
        TranslationChunk::new(id, text.to_string())
    }

    fn ok_result(chunk: &TranslationChunk) -> TranslationResult {
        let mut r = TranslationResult::new(chunk.id, chunk.text.clone(), format!("TR: {}", chunk.text));
        r.quality_score = 0.9;
        r.overlap_char_count = chunk.overlap_char_count;
        r
    }

    #[tokio::test]
    async fn test_all_tasks_succeed() {
        let chunks: Vec<_> = (1..=4).map(|i| chunk(i, "hello")).collect();
        let dispatcher = ParallelDispatcher::new(DispatcherConfig::default(), CancellationFlag::new());

        let outcome = dispatcher
            .run(&chunks, |c| async move { Ok(ok_result(c)) }, |_| {})
            .await;

        assert_eq!(outcome.results.len(), 4);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.stats.completed, 4);
        assert_eq!(outcome.stats.failed, 0);
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let chunks: Vec<_> = (1..=5).map(|i| chunk(i, "hello")).collect();
        let dispatcher = ParallelDispatcher::new(DispatcherConfig::default(), CancellationFlag::new());

        let outcome = dispatcher
            .run(
                &chunks,
                |c| async move {
                    if c.id == 3 {
                        Err(ProviderError::Http {
                            status: 400,
                            message: "bad request".to_string(),
                        }
                        .into())
                    } else {
                        Ok(ok_result(c))
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].chunk_id, 3);
        assert_eq!(outcome.stats.completed, 4);
        assert_eq!(outcome.stats.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_backoff_window() {
        let chunks = vec![chunk(1, "hello")];
        let dispatcher = ParallelDispatcher::new(DispatcherConfig::default(), CancellationFlag::new());
        let attempts = Cell::new(0u32);

        let start = Instant::now();
        let outcome = dispatcher
            .run(
                &chunks,
                |c| {
                    let n = attempts.get();
                    attempts.set(n + 1);
                    async move {
                        if n < 2 {
                            Err(ProviderError::Transport("connection reset".to_string()).into())
                        } else {
                            Ok(ok_result(c))
                        }
                    }
                },
                |_| {},
            )
            .await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.stats.retried, 1);
        // Two standard backoffs: 2s + 4s, plus ≤10% jitter each.
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(10), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_long_backoff() {
        let chunks = vec![chunk(1, "hello")];
        let config = DispatcherConfig {
            max_retries: 5,
            ..DispatcherConfig::default()
        };
        let dispatcher = ParallelDispatcher::new(config, CancellationFlag::new());
        let attempts = Cell::new(0u32);

        let start = Instant::now();
        let outcome = dispatcher
            .run(
                &chunks,
                |c| {
                    let n = attempts.get();
                    attempts.set(n + 1);
                    async move {
                        if n < 3 {
                            Err(ProviderError::RateLimited.into())
                        } else {
                            Ok(ok_result(c))
                        }
                    }
                },
                |_| {},
            )
            .await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.stats.completed, 1);
        assert_eq!(outcome.stats.retried, 1);
        // Rate-limit backoffs: 8 + 16 + 30 seconds before jitter.
        assert!(elapsed >= Duration::from_secs(54), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_permanent_error_no_retry() {
        let chunks = vec![chunk(1, "hello")];
        let dispatcher = ParallelDispatcher::new(DispatcherConfig::default(), CancellationFlag::new());
        let attempts = Cell::new(0u32);

        let outcome = dispatcher
            .run(
                &chunks,
                |_| {
                    attempts.set(attempts.get() + 1);
                    async {
                        Err::<TranslationResult, _>(
                            ProviderError::Http {
                                status: 401,
                                message: "unauthorized".to_string(),
                            }
                            .into(),
                        )
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(attempts.get(), 1);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.stats.retried, 0);
    }

    #[tokio::test]
    async fn test_cancellation_before_any_call() {
        let chunks: Vec<_> = (1..=3).map(|i| chunk(i, "hello")).collect();
        let flag = CancellationFlag::new();
        flag.cancel();
        let dispatcher = ParallelDispatcher::new(DispatcherConfig::default(), flag);
        let calls = Cell::new(0u32);

        let outcome = dispatcher
            .run(
                &chunks,
                |c| {
                    calls.set(calls.get() + 1);
                    async move { Ok(ok_result(c)) }
                },
                |_| {},
            )
            .await;

        assert_eq!(calls.get(), 0, "no provider call after cancellation");
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures.iter().all(|f| f.error.contains("cancelled")));
    }

    #[tokio::test]
    async fn test_semaphore_bounds_in_flight() {
        let chunks: Vec<_> = (1..=20).map(|i| chunk(i, "hello")).collect();
        let config = DispatcherConfig {
            max_concurrency: 3,
            ..DispatcherConfig::default()
        };
        let dispatcher = ParallelDispatcher::new(config, CancellationFlag::new());

        let in_flight = RefCell::new(0usize);
        let peak = RefCell::new(0usize);

        let outcome = dispatcher
            .run(
                &chunks,
                |c| {
                    {
                        let mut now = in_flight.borrow_mut();
                        *now += 1;
                        let mut max = peak.borrow_mut();
                        *max = (*max).max(*now);
                    }
                    async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        *in_flight.borrow_mut() -= 1;
                        Ok(ok_result(c))
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(outcome.results.len(), 20);
        assert!(*peak.borrow() <= 3, "peak in-flight was {}", peak.borrow());
    }

    #[tokio::test]
    async fn test_on_complete_invoked_per_result() {
        let chunks: Vec<_> = (1..=3).map(|i| chunk(i, "hello")).collect();
        let dispatcher = ParallelDispatcher::new(DispatcherConfig::default(), CancellationFlag::new());
        let mut seen = Vec::new();

        let outcome = dispatcher
            .run(&chunks, |c| async move { Ok(ok_result(c)) }, |r| {
                seen.push(r.chunk_id);
            })
            .await;

        assert_eq!(outcome.results.len(), 3);
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_backoff_delay_table() {
        assert_eq!(backoff_delay(1, false), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, false), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, false), Duration::from_secs(8));
        assert_eq!(backoff_delay(4, false), Duration::from_secs(10));
        assert_eq!(backoff_delay(1, true), Duration::from_secs(8));
        assert_eq!(backoff_delay(2, true), Duration::from_secs(16));
        assert_eq!(backoff_delay(3, true), Duration::from_secs(30));
    }

    #[test]
    fn test_cancellation_flag_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
