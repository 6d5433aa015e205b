//! Batch parsing across OS threads.
//!
//! Small batches run inline on the caller with a router built once per pool.
//! Larger batches are split into contiguous chunks, one thread per chunk, each
//! thread building its own router. Chunk results come back over oneshot
//! channels and are concatenated in chunk order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::metrics::{BatchMetrics, MetricsSink};
use super::task::{run_task, ParseTask, WorkerResult};
use crate::adapter::LanguageRouter;
use crate::error::{AnalyzerError, Result};

pub const DEFAULT_MIN_BATCH_FOR_WORKERS: usize = 10;
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the router a worker thread (or the inline path) dispatches with.
pub type RouterFactory = Arc<dyn Fn() -> LanguageRouter + Send + Sync>;

/// Available parallelism minus one, at least one.
pub fn default_pool_size() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

#[derive(Clone)]
pub struct WorkerPoolOptions {
    pub pool_size: usize,
    pub min_batch_for_workers: usize,
    /// Per-chunk limit, measured from dispatch.
    pub timeout: Duration,
    pub metrics: Option<Arc<dyn MetricsSink>>,
    pub router_factory: RouterFactory,
}

impl Default for WorkerPoolOptions {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            min_batch_for_workers: DEFAULT_MIN_BATCH_FOR_WORKERS,
            timeout: DEFAULT_WORKER_TIMEOUT,
            metrics: None,
            router_factory: Arc::new(LanguageRouter::with_default_adapters),
        }
    }
}

impl std::fmt::Debug for WorkerPoolOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolOptions")
            .field("pool_size", &self.pool_size)
            .field("min_batch_for_workers", &self.min_batch_for_workers)
            .field("timeout", &self.timeout)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub pool_size: usize,
    pub active_workers: usize,
    pub queued_tasks: usize,
    /// `active_workers / pool_size`
    pub utilization: f64,
    pub workers_spawned: u64,
    pub batches_inline: u64,
    pub batches_dispatched: u64,
}

pub struct WorkerPool {
    options: WorkerPoolOptions,
    inline_router: Mutex<Option<Arc<LanguageRouter>>>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
    active_workers: Arc<AtomicUsize>,
    queued_tasks: Arc<AtomicUsize>,
    workers_spawned: AtomicU64,
    batches_inline: AtomicU64,
    batches_dispatched: AtomicU64,
}

struct PendingChunk {
    index: usize,
    file_paths: Vec<String>,
    token: CancellationToken,
    receiver: Option<oneshot::Receiver<std::result::Result<Vec<WorkerResult>, String>>>,
    spawn_error: Option<String>,
}

impl WorkerPool {
    pub fn new(mut options: WorkerPoolOptions) -> Self {
        options.pool_size = options.pool_size.max(1);
        Self {
            options,
            inline_router: Mutex::new(None),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            active_workers: Arc::new(AtomicUsize::new(0)),
            queued_tasks: Arc::new(AtomicUsize::new(0)),
            workers_spawned: AtomicU64::new(0),
            batches_inline: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &WorkerPoolOptions {
        &self.options
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Parses every task. Per-task failures and failed chunks come back as
    /// error results; only a disposed pool fails the call itself.
    pub async fn parse_files(&self, tasks: Vec<ParseTask>) -> Result<Vec<WorkerResult>> {
        if self.is_disposed() {
            return Err(AnalyzerError::PoolDisposed);
        }
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let task_count = tasks.len();

        let (results, chunks) = if task_count < self.options.min_batch_for_workers {
            (self.run_inline(&tasks), 0)
        } else {
            self.dispatch(tasks).await
        };

        if let Some(metrics) = &self.options.metrics {
            metrics.record_batch(&BatchMetrics {
                task_count,
                error_count: results.iter().filter(|r| r.error.is_some()).count(),
                chunks,
                inline: chunks == 0,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }

        Ok(results)
    }

    fn run_inline(&self, tasks: &[ParseTask]) -> Vec<WorkerResult> {
        self.batches_inline.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Parsing {} files inline", tasks.len());

        let router = self.inline_router();
        tasks.iter().map(|task| run_task(&router, task)).collect()
    }

    fn inline_router(&self) -> Arc<LanguageRouter> {
        let mut guard = self.lock_inline_router();
        let router = guard.get_or_insert_with(|| Arc::new((self.options.router_factory)()));
        Arc::clone(router)
    }

    fn lock_inline_router(&self) -> MutexGuard<'_, Option<Arc<LanguageRouter>>> {
        self.inline_router
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn dispatch(&self, tasks: Vec<ParseTask>) -> (Vec<WorkerResult>, usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        let total = tasks.len();
        let chunks = split_into_chunks(tasks, self.options.pool_size);
        let chunk_count = chunks.len();
        tracing::debug!("Dispatching {} files across {} workers", total, chunk_count);

        let pending: Vec<PendingChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| self.spawn_worker(index, chunk))
            .collect();

        let deadline = tokio::time::Instant::now() + self.options.timeout;
        let mut results = Vec::with_capacity(total);

        for chunk in pending {
            let outcome = match (chunk.receiver, chunk.spawn_error) {
                (Some(receiver), _) => match tokio::time::timeout_at(deadline, receiver).await {
                    Ok(Ok(Ok(chunk_results))) => Ok(chunk_results),
                    Ok(Ok(Err(reason))) => Err(AnalyzerError::WorkerFailed {
                        chunk: chunk.index,
                        reason,
                    }),
                    Ok(Err(_)) => Err(AnalyzerError::WorkerFailed {
                        chunk: chunk.index,
                        reason: "worker exited before signalling completion".to_string(),
                    }),
                    Err(_) => {
                        chunk.token.cancel();
                        Err(AnalyzerError::WorkerTimeout {
                            chunk: chunk.index,
                            timeout_ms: self.options.timeout.as_millis() as u64,
                        })
                    }
                },
                (None, reason) => Err(AnalyzerError::WorkerFailed {
                    chunk: chunk.index,
                    reason: reason.unwrap_or_else(|| "worker was not started".to_string()),
                }),
            };

            match outcome {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(e) => {
                    tracing::warn!("{} ({} files)", e, chunk.file_paths.len());
                    let message = e.to_string();
                    results.extend(
                        chunk
                            .file_paths
                            .into_iter()
                            .map(|path| WorkerResult::failed(path, message.clone())),
                    );
                }
            }
        }

        (results, chunk_count)
    }

    fn spawn_worker(&self, index: usize, chunk: Vec<ParseTask>) -> PendingChunk {
        let file_paths: Vec<String> = chunk.iter().map(|t| t.file_path.clone()).collect();
        let token = self.shutdown.child_token();
        let (sender, receiver) = oneshot::channel();

        let factory = Arc::clone(&self.options.router_factory);
        let active = Arc::clone(&self.active_workers);
        let queued = Arc::clone(&self.queued_tasks);
        let worker_token = token.clone();

        queued.fetch_add(chunk.len(), Ordering::SeqCst);
        active.fetch_add(1, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name(format!("code-facts-worker-{}", index))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_chunk(&factory, &chunk, &worker_token, &queued)
                }));
                active.fetch_sub(1, Ordering::SeqCst);
                // the receiver is gone after a timeout; nothing to report to
                let _ = sender.send(outcome.map_err(panic_message));
            });

        match spawned {
            Ok(_) => {
                self.workers_spawned.fetch_add(1, Ordering::Relaxed);
                PendingChunk {
                    index,
                    file_paths,
                    token,
                    receiver: Some(receiver),
                    spawn_error: None,
                }
            }
            Err(e) => {
                self.active_workers.fetch_sub(1, Ordering::SeqCst);
                sub_saturating(&self.queued_tasks, file_paths.len());
                PendingChunk {
                    index,
                    file_paths,
                    token,
                    receiver: None,
                    spawn_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let active_workers = self.active_workers.load(Ordering::SeqCst);
        PoolStats {
            pool_size: self.options.pool_size,
            active_workers,
            queued_tasks: self.queued_tasks.load(Ordering::SeqCst),
            utilization: active_workers as f64 / self.options.pool_size as f64,
            workers_spawned: self.workers_spawned.load(Ordering::Relaxed),
            batches_inline: self.batches_inline.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
        }
    }

    /// Marks the pool disposed, cancels running workers, forgets queued work
    /// and drops the inline router. Later `parse_files` calls fail.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        self.queued_tasks.store(0, Ordering::SeqCst);
        *self.lock_inline_router() = None;
        tracing::debug!("Worker pool disposed");
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(WorkerPoolOptions::default())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Body of a worker thread. Stops before the next task once `token` is
/// cancelled; the remaining tasks are reported as cancelled.
fn run_chunk(
    factory: &RouterFactory,
    chunk: &[ParseTask],
    token: &CancellationToken,
    queued: &AtomicUsize,
) -> Vec<WorkerResult> {
    let router = factory();
    let mut results = Vec::with_capacity(chunk.len());

    for (i, task) in chunk.iter().enumerate() {
        if token.is_cancelled() {
            sub_saturating(queued, chunk.len() - i);
            results.extend(
                chunk[i..]
                    .iter()
                    .map(|t| WorkerResult::failed(t.file_path.clone(), "worker cancelled")),
            );
            break;
        }
        results.push(run_task(&router, task));
        sub_saturating(queued, 1);
    }
    results
}

/// Splits `tasks` into `min(pool_size, len)` contiguous chunks whose sizes
/// differ by at most one, larger chunks first.
pub(crate) fn split_into_chunks(tasks: Vec<ParseTask>, pool_size: usize) -> Vec<Vec<ParseTask>> {
    let total = tasks.len();
    let count = pool_size.max(1).min(total);
    if count == 0 {
        return Vec::new();
    }

    let base = total / count;
    let extra = total % count;
    let mut chunks = Vec::with_capacity(count);
    let mut iter = tasks.into_iter();
    for i in 0..count {
        let size = base + usize::from(i < extra);
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

fn sub_saturating(counter: &AtomicUsize, n: usize) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(n)));
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", s)
    } else {
        "worker panicked".to_string()
    }
}
