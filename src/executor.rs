//! Task executors for source queries and refreshes.
//!
//! [`TaskExecutor`] runs futures on the tokio runtime with at most
//! `query_workers` of them making progress at once. [`BatchingTaskExecutor`]
//! sits on top of it and holds queued tasks back until the caller asks for
//! the next batch, which bounds how many corpus queries are outstanding for
//! one query.
//!
//! ```text
//! execute(t1..tn) ──▶ pending queue
//! execute_next_batch(k) ──▶ spawn k tasks ──▶ worker permits
//! cancel_pending() ──▶ drop queue, cancel running tasks
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A unit of background work.
pub type Task = BoxFuture<'static, ()>;

/// Bounded pool of concurrently running tasks.
#[derive(Clone)]
pub struct TaskExecutor {
    permits: Arc<Semaphore>,
}

impl TaskExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Spawn `task`; it starts once a worker permit is free.
    pub fn spawn(&self, task: Task) -> JoinHandle<()> {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        })
    }

    /// Permits not held by a running task.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Queue of tasks released to a [`TaskExecutor`] in batches.
pub struct BatchingTaskExecutor {
    executor: TaskExecutor,
    pending: Mutex<VecDeque<Task>>,
    cancel: CancellationToken,
}

impl BatchingTaskExecutor {
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            executor,
            pending: Mutex::new(VecDeque::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Queue `task` until a batch releases it. Ignored after cancellation.
    pub fn execute(&self, task: Task) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.pending.lock().push_back(task);
    }

    /// Start up to `batch_size` queued tasks. Returns how many started.
    pub fn execute_next_batch(&self, batch_size: usize) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }
        let batch: Vec<Task> = {
            let mut pending = self.pending.lock();
            let n = batch_size.min(pending.len());
            pending.drain(..n).collect()
        };
        let started = batch.len();
        for task in batch {
            let cancel = self.cancel.clone();
            self.executor.spawn(Box::pin(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = task => {}
                }
            }));
        }
        if started > 0 {
            debug!(started, remaining = self.pending_count(), "batch started");
        }
        started
    }

    /// Drop queued tasks and stop the running ones at their next await.
    pub fn cancel_pending(&self) {
        self.cancel.cancel();
        let dropped = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        debug!(dropped, "pending tasks cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Token tripped by [`cancel_pending`](Self::cancel_pending).
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
