//! Query fan-out and incremental publication.
//!
//! [`SuggestionsProvider::get_suggestions`] returns a live
//! [`Suggestions`] handle at once and fills it in the background:
//!
//! 1. The previous query's tasks are cancelled; one query is in flight
//!    per provider.
//! 2. When more than one corpus is requested, [`ShouldQueryStrategy`]
//!    drops the corpora not worth asking.
//! 3. One task per remaining corpus is queued on a
//!    [`BatchingTaskExecutor`]. The first batch holds as many tasks as
//!    there are default-enabled corpora; each time a batch has fully
//!    reported, the next `num_promoted_sources` tasks start.
//! 4. Results are posted to the [`PublishQueue`], recorded for zero-result
//!    suppression and buffered. The last result of a batch flushes the
//!    buffer into the aggregate; earlier ones wait for
//!    `publish_result_delay_ms`, restarted on every arrival.
//! 5. Shortcuts for the query are fetched alongside and installed through
//!    the publish queue. Each shortcut with an id is handed to the
//!    [`ShortcutRefresher`]; refresh outcomes update the live cursor and
//!    the stored history.
//!
//! A corpus that fails or misses `query_timeout_ms` reports an empty
//! result. So does a corpus whose query panics. An empty query with zero-query suggestions disabled is still
//! sent to the first batch, but nothing is published and the aggregate is
//! done immediately.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use quicksearch_core::corpus::{Corpus, CorpusResult};
use quicksearch_core::cursor::{ListSuggestionCursor, SuggestionCursor};
use quicksearch_core::params::SuggestParams;
use quicksearch_core::promoter::{default_promoter, Promoter};
use quicksearch_core::shortcut_cursor::ShortcutCursor;
use quicksearch_core::should_query::ShouldQueryStrategy;
use quicksearch_core::suggestions::{Suggestions, SuggestionsHandle};

use crate::config::{Config, SuggestConfig};
use crate::corpora::Corpora;
use crate::executor::{BatchingTaskExecutor, Task, TaskExecutor};
use crate::publish::{DelayedPost, PublishQueue};
use crate::refresher::ShortcutRefresher;
use crate::shortcut_repository::{now_ms, ShortcutRepository};

/// Runs queries against corpora and publishes their results.
pub struct SuggestionsProvider {
    config: SuggestConfig,
    params: SuggestParams,
    corpora: Arc<Corpora>,
    repository: Option<Arc<ShortcutRepository>>,
    refresher: Arc<ShortcutRefresher>,
    executor: TaskExecutor,
    publish: PublishQueue,
    should_query: Arc<Mutex<ShouldQueryStrategy>>,
    current: Mutex<Option<Arc<BatchingTaskExecutor>>>,
    shortcut_task: Mutex<Option<JoinHandle<()>>>,
}

impl SuggestionsProvider {
    /// Create a provider. Must be called inside a tokio runtime.
    pub fn new(config: &Config, corpora: Arc<Corpora>, repository: Option<Arc<ShortcutRepository>>) -> Self {
        let executor = TaskExecutor::new(config.suggest.query_workers);
        Self {
            config: config.suggest.clone(),
            params: config.suggest.params(),
            corpora,
            repository,
            refresher: Arc::new(ShortcutRefresher::new(executor.clone())),
            executor,
            publish: PublishQueue::start(),
            should_query: Arc::new(Mutex::new(ShouldQueryStrategy::new(
                config.suggest.show_suggestions_for_zero_query,
            ))),
            current: Mutex::new(None),
            shortcut_task: Mutex::new(None),
        }
    }

    pub fn params(&self) -> &SuggestParams {
        &self.params
    }

    pub fn corpora(&self) -> &Arc<Corpora> {
        &self.corpora
    }

    pub fn refresher(&self) -> &Arc<ShortcutRefresher> {
        &self.refresher
    }

    /// Start `query` against `corpora` and return its live result set.
    pub fn get_suggestions(&self, query: &str, corpora: &[Arc<dyn Corpus>]) -> SuggestionsHandle {
        self.cancel_pending_tasks();

        let to_query: Vec<Arc<dyn Corpus>> = if corpora.len() <= 1 {
            corpora.to_vec()
        } else {
            let mut strategy = self.should_query.lock();
            corpora
                .iter()
                .filter(|c| strategy.should_query_corpus(c.as_ref(), query))
                .cloned()
                .collect()
        };

        let suggestions = Arc::new(Suggestions::new(query, to_query.clone()));
        let handle = suggestions.acquire();
        let displayed = !query.is_empty() || self.params.show_suggestions_for_zero_query;
        if !displayed {
            suggestions.done();
        }

        let batching = Arc::new(BatchingTaskExecutor::new(self.executor.clone()));
        *self.current.lock() = Some(Arc::clone(&batching));

        let defaults = to_query.iter().filter(|c| c.is_default_enabled()).count();
        let initial = if defaults == 0 {
            self.params.num_promoted_sources
        } else {
            defaults
        };
        let publisher = Arc::new(Mutex::new(BatchPublisher {
            suggestions: Arc::downgrade(&suggestions),
            display: displayed,
            batching: Arc::clone(&batching),
            should_query: Arc::clone(&self.should_query),
            publish: self.publish.clone(),
            delay: Duration::from_millis(self.config.publish_result_delay_ms),
            next_batch_size: self.params.num_promoted_sources,
            batch_end: initial.min(to_query.len()),
            received: 0,
            pending: Vec::new(),
            delayed: None,
        }));

        let only_corpus = to_query.len() == 1;
        for corpus in &to_query {
            batching.execute(self.query_task(Arc::clone(corpus), query, only_corpus, &publisher));
        }

        let started = batching.execute_next_batch(initial);
        debug!(query, corpora = to_query.len(), started, displayed, "query dispatched");

        if displayed {
            self.fetch_shortcuts(&suggestions, query, &to_query, &batching);
        }
        handle
    }

    fn query_task(
        &self,
        corpus: Arc<dyn Corpus>,
        query: &str,
        only_corpus: bool,
        publisher: &Arc<Mutex<BatchPublisher>>,
    ) -> Task {
        let query = query.to_string();
        let limit = self.params.max_results_per_source;
        let deadline = Duration::from_millis(self.config.query_timeout_ms);
        let publish = self.publish.clone();
        let publisher = Arc::clone(publisher);
        Box::pin(async move {
            let started = Instant::now();
            let guarded = AssertUnwindSafe(corpus.get_suggestions(&query, limit, only_corpus)).catch_unwind();
            let outcome = tokio::time::timeout(deadline, guarded).await;
            let latency_ms = started.elapsed().as_millis() as u64;
            let result = match outcome {
                Ok(Ok(Ok(rows))) => CorpusResult::new(Arc::clone(&corpus), query, rows, latency_ms),
                Ok(Ok(Err(e))) => {
                    warn!(corpus = corpus.name(), error = %e, "corpus query failed");
                    CorpusResult::empty(Arc::clone(&corpus), query, latency_ms)
                }
                Ok(Err(_)) => {
                    warn!(corpus = corpus.name(), "corpus query panicked");
                    CorpusResult::empty(Arc::clone(&corpus), query, latency_ms)
                }
                Err(_) => {
                    warn!(corpus = corpus.name(), timeout_ms = deadline.as_millis() as u64, "corpus query timed out");
                    CorpusResult::empty(Arc::clone(&corpus), query, latency_ms)
                }
            };
            publish.post(move || BatchPublisher::on_result(&publisher, result));
        })
    }

    fn fetch_shortcuts(
        &self,
        suggestions: &Arc<Suggestions>,
        query: &str,
        allowed: &[Arc<dyn Corpus>],
        batching: &BatchingTaskExecutor,
    ) {
        let Some(repository) = self.repository.clone() else {
            return;
        };
        let cancel = batching.cancellation();
        let weak = Arc::downgrade(suggestions);
        let query = query.to_string();
        let allowed = allowed.to_vec();
        let allow_web = self.params.allow_web_shortcuts;
        let publish = self.publish.clone();
        let corpora = Arc::clone(&self.corpora);
        let refresher = Arc::clone(&self.refresher);

        let task = tokio::spawn(async move {
            let lookup = tokio::select! {
                _ = cancel.cancelled() => return,
                lookup = repository.get_shortcuts_for_query(&query, &allowed, allow_web, now_ms()) => lookup,
            };
            let cursor = match lookup {
                Ok(Some(cursor)) => cursor,
                Ok(None) => return,
                Err(e) => {
                    warn!(query = %query, error = %e, "shortcut lookup failed");
                    return;
                }
            };
            let installer = publish.clone();
            installer.post(move || {
                let Some(suggestions) = weak.upgrade() else {
                    return;
                };
                if suggestions.is_closed() {
                    return;
                }
                suggestions.set_shortcuts(Arc::clone(&cursor));
                refresh_shortcuts(&cursor, &corpora, &refresher, &repository, &publish);
            });
        });
        if let Some(previous) = self.shortcut_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// The promoted list for `suggestions` with the default promoter.
    pub fn get_promoted(&self, suggestions: &Suggestions, max_promoted: usize) -> ListSuggestionCursor {
        let promoter: Box<dyn Promoter> = default_promoter(&self.params);
        suggestions.promoted(promoter.as_ref(), max_promoted)
    }

    /// Wait for the pending shortcut lookup and every publish job queued so far.
    pub async fn settle(&self) {
        let task = self.shortcut_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.publish.flush().await;
    }

    /// Start a new session: every shortcut becomes eligible for refresh.
    pub fn reset_session(&self) {
        self.refresher.reset();
    }

    /// Cancel the in-flight query, if any.
    pub fn close(&self) {
        self.cancel_pending_tasks();
        if let Some(task) = self.shortcut_task.lock().take() {
            task.abort();
        }
    }

    fn cancel_pending_tasks(&self) {
        if let Some(previous) = self.current.lock().take() {
            previous.cancel_pending();
        }
    }
}

impl Drop for SuggestionsProvider {
    fn drop(&mut self) {
        self.close();
    }
}

/// Wait until `suggestions` is done, for at most `limit`. Returns whether
/// it finished in time.
pub async fn wait_until_done(suggestions: &Suggestions, limit: Duration) -> bool {
    let notify = Arc::new(Notify::new());
    let waker = Arc::clone(&notify);
    let id = suggestions.register_observer(move || waker.notify_one());
    let finished = tokio::time::timeout(limit, async {
        while !suggestions.is_done() {
            notify.notified().await;
        }
    })
    .await
    .is_ok();
    suggestions.unregister_observer(id);
    finished
}

/// Submit every refreshable row of `cursor` to the refresher.
fn refresh_shortcuts(
    cursor: &Arc<ShortcutCursor>,
    corpora: &Corpora,
    refresher: &ShortcutRefresher,
    repository: &Arc<ShortcutRepository>,
    publish: &PublishQueue,
) {
    for row in cursor.suggestions() {
        let Some(shortcut_id) = row.shortcut_id.clone() else {
            continue;
        };
        let Some(source) = corpora.source(&row.source) else {
            continue;
        };
        let source_name = row.source.clone();
        let cursor = Arc::downgrade(cursor);
        let repository = Arc::clone(repository);
        let publish = publish.clone();
        refresher.refresh(source, &row, move |refreshed| {
            publish.post(move || {
                if let Some(cursor) = cursor.upgrade() {
                    cursor.refresh(&source_name, &shortcut_id, refreshed.clone());
                }
                repository.update_shortcut(&source_name, &shortcut_id, refreshed);
            });
        });
    }
}

/// Per-query result buffer. Only touched from publish jobs.
struct BatchPublisher {
    suggestions: Weak<Suggestions>,
    display: bool,
    batching: Arc<BatchingTaskExecutor>,
    should_query: Arc<Mutex<ShouldQueryStrategy>>,
    publish: PublishQueue,
    delay: Duration,
    next_batch_size: usize,
    /// Results expected once every started task has reported.
    batch_end: usize,
    received: usize,
    pending: Vec<CorpusResult>,
    delayed: Option<DelayedPost>,
}

impl BatchPublisher {
    fn on_result(this: &Arc<Mutex<Self>>, result: CorpusResult) {
        let mut publisher = this.lock();
        if result.is_empty() {
            publisher
                .should_query
                .lock()
                .on_zero_results(result.corpus().as_ref(), result.user_query());
        }
        if !publisher.display {
            return;
        }

        publisher.received += 1;
        publisher.pending.push(result);
        let batch_complete = publisher.received >= publisher.batch_end;
        if batch_complete || publisher.delay.is_zero() {
            publisher.flush();
        } else {
            publisher.schedule_flush(Arc::downgrade(this));
        }
        if batch_complete {
            let started = publisher.batching.execute_next_batch(publisher.next_batch_size);
            publisher.batch_end += started;
        }
    }

    /// Restart the coalescing timer.
    fn schedule_flush(&mut self, this: Weak<Mutex<Self>>) {
        if let Some(previous) = self.delayed.take() {
            previous.cancel();
        }
        let job = move || {
            if let Some(publisher) = this.upgrade() {
                publisher.lock().flush();
            }
        };
        self.delayed = Some(self.publish.post_delayed(job, self.delay));
    }

    fn flush(&mut self) {
        if let Some(delayed) = self.delayed.take() {
            delayed.cancel();
        }
        if self.pending.is_empty() {
            return;
        }
        let results = std::mem::take(&mut self.pending);
        match self.suggestions.upgrade() {
            Some(suggestions) => {
                debug!(query = %suggestions.query(), published = results.len(), "results published");
                suggestions.add_corpus_results(results);
            }
            None => debug!(dropped = results.len(), "results for released query"),
        }
    }
}
