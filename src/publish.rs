//! The publish queue.
//!
//! Every mutation of a live [`Suggestions`](quicksearch_core::suggestions::Suggestions)
//! aggregate and of the zero-result bookkeeping runs as a job on one tokio
//! task, in the order the jobs were posted. Workers never touch the
//! aggregate directly; they post a job here instead.
//!
//! Delayed jobs are used to coalesce results that arrive close together.
//! A [`DelayedPost`] can be cancelled until the job starts running; the
//! check happens on the queue itself, so a cancel posted from another job
//! always wins over a delayed job that has not run yet.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the single publish task.
#[derive(Clone)]
pub struct PublishQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl PublishQueue {
    /// Spawn the publish task on the current runtime.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            debug!("publish queue stopped");
        });
        Self { tx }
    }

    /// Run `job` on the publish task. Returns false if the task is gone.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Run `job` on the publish task after `delay`, unless cancelled first.
    pub fn post_delayed(&self, job: impl FnOnce() + Send + 'static, delay: Duration) -> DelayedPost {
        let token = CancellationToken::new();
        let guard = token.clone();
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    queue.post(move || {
                        if !guard.is_cancelled() {
                            job();
                        }
                    });
                }
            }
        });
        DelayedPost { token }
    }

    /// Wait until every job posted before this call has run.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.post(move || {
            let _ = tx.send(());
        }) {
            let _ = rx.await;
        }
    }
}

/// A pending delayed job.
#[derive(Debug)]
pub struct DelayedPost {
    token: CancellationToken,
}

impl DelayedPost {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_jobs_run_in_post_order() {
        let queue = PublishQueue::start();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            queue.post(move || seen.lock().push(i));
        }
        queue.flush().await;
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_delayed_post_runs_after_delay() {
        let queue = PublishQueue::start();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _post = queue.post_delayed(move || s.lock().push("late"), Duration::from_millis(20));
        let s = Arc::clone(&seen);
        queue.post(move || s.lock().push("now"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        queue.flush().await;
        assert_eq!(*seen.lock(), vec!["now", "late"]);
    }

    #[tokio::test]
    async fn test_cancelled_delayed_post_never_runs() {
        let queue = PublishQueue::start();
        let seen = Arc::new(Mutex::new(0));
        let s = Arc::clone(&seen);
        let post = queue.post_delayed(move || *s.lock() += 1, Duration::from_millis(20));
        post.cancel();
        assert!(post.is_cancelled());

        tokio::time::sleep(Duration::from_millis(80)).await;
        queue.flush().await;
        assert_eq!(*seen.lock(), 0);
    }
}
