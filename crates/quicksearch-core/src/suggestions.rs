//! The live result set for one in-flight query.
//!
//! A [`Suggestions`] aggregate is created for each query with the ordered
//! list of corpora it expects answers from. Corpus results arrive in any
//! order but are stored in the slot of their corpus, so readers always see
//! a stable corpus ordering. The shortcut cursor for the query is attached
//! separately.
//!
//! # Lifecycle
//!
//! ```text
//! new ──▶ acquire() ─┬─▶ add_corpus_results / set_shortcuts ──▶ done
//!                    └─▶ last handle dropped ──▶ close
//! ```
//!
//! Ownership is shared through [`SuggestionsHandle`] guards. When the last
//! handle drops, the aggregate closes: owned cursors are released and
//! observers are removed. Results delivered after close are discarded.
//! Closing twice is a lifecycle bug and panics.

use std::ops::Deref;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::corpus::{Corpus, CorpusResult};
use crate::cursor::{ListSuggestionCursor, SuggestionCursor};
use crate::observer::{lock, ObserverId, ObserverList};
use crate::promoter::Promoter;
use crate::shortcut_cursor::ShortcutCursor;
use crate::source::Source;

#[derive(Default)]
struct State {
    slots: Vec<Option<Arc<CorpusResult>>>,
    result_count: usize,
    shortcuts: Option<Arc<ShortcutCursor>>,
    shortcuts_observer: Option<ObserverId>,
    done: bool,
    closed: bool,
    ref_count: usize,
}

/// Result aggregate for one query.
pub struct Suggestions {
    query: String,
    expected: Vec<Arc<dyn Corpus>>,
    state: Mutex<State>,
    observers: ObserverList,
}

impl Suggestions {
    /// Create an aggregate expecting one result from each of `expected`,
    /// displayed in that order.
    pub fn new(query: impl Into<String>, expected: Vec<Arc<dyn Corpus>>) -> Self {
        let slots = vec![None; expected.len()];
        Self {
            query: query.into(),
            expected,
            state: Mutex::new(State {
                slots,
                ..State::default()
            }),
            observers: ObserverList::new(),
        }
    }

    /// Take a shared-ownership handle. The aggregate closes when the last
    /// handle is dropped.
    pub fn acquire(self: &Arc<Self>) -> SuggestionsHandle {
        lock(&self.state).ref_count += 1;
        SuggestionsHandle {
            inner: Arc::clone(self),
        }
    }

    fn release(&self) {
        let close_now = {
            let mut state = lock(&self.state);
            state.ref_count = state.ref_count.saturating_sub(1);
            state.ref_count == 0 && !state.closed
        };
        if close_now {
            self.close();
        }
    }

    /// Release every owned cursor and unregister all observers.
    ///
    /// # Panics
    ///
    /// Panics if the aggregate is already closed.
    pub fn close(&self) {
        let shortcuts = {
            let mut state = lock(&self.state);
            if state.closed {
                panic!("Suggestions for {:?} closed twice", self.query);
            }
            state.closed = true;
            state.slots.iter_mut().for_each(|slot| *slot = None);
            let observer = state.shortcuts_observer.take();
            state.shortcuts.take().map(|s| (s, observer))
        };
        if let Some((cursor, observer)) = shortcuts {
            if let Some(id) = observer {
                cursor.unregister_observer(id);
            }
            cursor.clear_observers();
        }
        self.observers.clear();
        debug!(query = %self.query, "suggestions closed");
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Corpora this aggregate expects results from, in display order.
    pub fn expected_corpora(&self) -> &[Arc<dyn Corpus>] {
        &self.expected
    }

    /// Look up a source of one of the expected corpora by name.
    pub fn source(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.expected
            .iter()
            .flat_map(|c| c.sources())
            .find(|s| s.name() == name)
    }

    pub fn expected_corpus_count(&self) -> usize {
        self.expected.len()
    }

    /// Number of corpus results inserted so far.
    pub fn result_count(&self) -> usize {
        lock(&self.state).result_count
    }

    /// Mark the aggregate complete even if corpora are outstanding.
    pub fn done(&self) {
        lock(&self.state).done = true;
        self.observers.notify();
    }

    /// True once every expected corpus has reported, or after [`done`](Self::done).
    pub fn is_done(&self) -> bool {
        let state = lock(&self.state);
        state.done || state.result_count == self.expected.len()
    }

    pub fn add_corpus_result(&self, result: CorpusResult) {
        self.add_corpus_results(vec![result]);
    }

    /// Insert arrived corpus results into their slots.
    ///
    /// Results for another query, for a corpus that is not expected, or for
    /// a slot that is already filled are logged and dropped.
    pub fn add_corpus_results(&self, results: Vec<CorpusResult>) {
        let mut inserted = 0usize;
        {
            let mut state = lock(&self.state);
            if state.closed {
                debug!(query = %self.query, dropped = results.len(), "results after close");
                return;
            }
            for result in results {
                if result.user_query() != self.query {
                    warn!(
                        expected = %self.query,
                        got = %result.user_query(),
                        corpus = result.corpus().name(),
                        "result for wrong query"
                    );
                    continue;
                }
                let name = result.corpus().name();
                let Some(idx) = self.expected.iter().position(|c| c.name() == name) else {
                    warn!(query = %self.query, corpus = name, "unexpected corpus result");
                    continue;
                };
                if state.slots[idx].is_some() {
                    warn!(query = %self.query, corpus = name, "duplicate corpus result");
                    continue;
                }
                state.slots[idx] = Some(Arc::new(result));
                state.result_count += 1;
                inserted += 1;
            }
        }
        if inserted > 0 {
            self.observers.notify();
        }
    }

    /// Attach the shortcut cursor for this query. Changes to the cursor are
    /// forwarded to this aggregate's observers.
    pub fn set_shortcuts(self: &Arc<Self>, shortcuts: Arc<ShortcutCursor>) {
        {
            let state = lock(&self.state);
            if state.closed {
                debug!(query = %self.query, "shortcuts after close");
                return;
            }
            if state.shortcuts.is_some() {
                warn!(query = %self.query, "shortcuts already set");
                return;
            }
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let id = shortcuts.register_observer(move || {
            if let Some(this) = weak.upgrade() {
                this.observers.notify();
            }
        });
        {
            let mut state = lock(&self.state);
            state.shortcuts = Some(shortcuts);
            state.shortcuts_observer = Some(id);
        }
        self.observers.notify();
    }

    pub fn shortcuts(&self) -> Option<Arc<ShortcutCursor>> {
        lock(&self.state).shortcuts.clone()
    }

    /// Arrived results in expected-corpus order.
    pub fn corpus_results(&self) -> Vec<Arc<CorpusResult>> {
        lock(&self.state).slots.iter().flatten().cloned().collect()
    }

    pub fn corpus_result(&self, corpus: &str) -> Option<Arc<CorpusResult>> {
        let idx = self.expected.iter().position(|c| c.name() == corpus)?;
        lock(&self.state).slots[idx].clone()
    }

    /// Result of the web corpus, if it was expected and has arrived.
    pub fn web_result(&self) -> Option<Arc<CorpusResult>> {
        let idx = self.expected.iter().position(|c| c.is_web_corpus())?;
        lock(&self.state).slots[idx].clone()
    }

    /// Total rows across all arrived corpus results.
    pub fn row_count(&self) -> usize {
        lock(&self.state)
            .slots
            .iter()
            .flatten()
            .map(|r| r.count())
            .sum()
    }

    /// Build the bounded promoted list with `promoter`.
    pub fn promoted(&self, promoter: &dyn Promoter, max_promoted: usize) -> ListSuggestionCursor {
        let mut promoted = ListSuggestionCursor::no_duplicates(self.query.clone());
        if !self.is_closed() {
            promoter.pick_promoted(self, max_promoted, &mut promoted);
        }
        promoted
    }

    pub fn register_observer(&self, callback: impl Fn() + Send + Sync + 'static) -> ObserverId {
        self.observers.register(callback)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }
}

impl std::fmt::Debug for Suggestions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Suggestions")
            .field("query", &self.query)
            .field("expected", &self.expected.len())
            .field("result_count", &state.result_count)
            .field("done", &state.done)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Shared-ownership guard over a [`Suggestions`] aggregate.
///
/// Cloning acquires another reference; dropping releases it.
pub struct SuggestionsHandle {
    inner: Arc<Suggestions>,
}

impl SuggestionsHandle {
    /// The underlying aggregate, for wiring into async producers.
    pub fn shared(&self) -> &Arc<Suggestions> {
        &self.inner
    }
}

impl Clone for SuggestionsHandle {
    fn clone(&self) -> Self {
        self.inner.acquire()
    }
}

impl Deref for SuggestionsHandle {
    type Target = Suggestions;

    fn deref(&self) -> &Suggestions {
        &self.inner
    }
}

impl Drop for SuggestionsHandle {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl std::fmt::Debug for SuggestionsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{row, TestCorpus};

    fn corpora(names: &[&str]) -> Vec<Arc<dyn Corpus>> {
        names
            .iter()
            .map(|n| Arc::new(TestCorpus::new(n)) as Arc<dyn Corpus>)
            .collect()
    }

    fn result(corpus: &Arc<dyn Corpus>, query: &str, n: usize) -> CorpusResult {
        let rows = (0..n).map(|i| row(corpus.name(), &format!("{i}"))).collect();
        CorpusResult::new(Arc::clone(corpus), query, rows, 5)
    }

    #[test]
    fn test_done_when_all_expected_reported() {
        let cs = corpora(&["a", "b", "c"]);
        let s = Suggestions::new("q", cs.clone());
        s.add_corpus_result(result(&cs[1], "q", 1));
        s.add_corpus_result(result(&cs[0], "q", 1));
        assert!(!s.is_done());
        s.add_corpus_result(result(&cs[2], "q", 1));
        assert!(s.is_done());
        assert_eq!(s.result_count(), 3);
    }

    #[test]
    fn test_unexpected_and_duplicate_results_do_not_count() {
        let cs = corpora(&["a", "b", "c"]);
        let extra: Arc<dyn Corpus> = Arc::new(TestCorpus::new("d"));
        let s = Suggestions::new("q", cs.clone());
        s.add_corpus_results(vec![
            result(&cs[0], "q", 1),
            result(&cs[0], "q", 2),
            result(&extra, "q", 1),
            result(&cs[1], "other", 1),
        ]);
        assert_eq!(s.result_count(), 1);
        assert_eq!(s.corpus_result("a").unwrap().count(), 1);
        assert!(!s.is_done());
    }

    #[test]
    fn test_results_stored_in_expected_order() {
        let cs = corpora(&["a", "b", "c"]);
        let s = Suggestions::new("q", cs.clone());
        s.add_corpus_result(result(&cs[2], "q", 1));
        s.add_corpus_result(result(&cs[0], "q", 1));
        let names: Vec<String> = s
            .corpus_results()
            .iter()
            .map(|r| r.corpus().name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_explicit_done() {
        let cs = corpora(&["a", "b"]);
        let s = Suggestions::new("q", cs);
        s.done();
        assert!(s.is_done());
    }

    #[test]
    fn test_last_handle_closes() {
        let cs = corpora(&["a"]);
        let s = Arc::new(Suggestions::new("q", cs.clone()));
        let h1 = s.acquire();
        let h2 = h1.clone();
        drop(h1);
        assert!(!s.is_closed());
        drop(h2);
        assert!(s.is_closed());
        s.add_corpus_result(result(&cs[0], "q", 1));
        assert_eq!(s.result_count(), 0);
    }

    #[test]
    #[should_panic(expected = "closed twice")]
    fn test_double_close_panics() {
        let s = Suggestions::new("q", corpora(&["a"]));
        s.close();
        s.close();
    }

    #[test]
    fn test_shortcut_changes_reach_observers() {
        let s = Arc::new(Suggestions::new("q", corpora(&["a"])));
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        s.register_observer(move || {
            h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let sc = Arc::new(ShortcutCursor::new("q", vec![row("a", "1")]));
        s.set_shortcuts(Arc::clone(&sc));
        sc.refresh("a", "1", None);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
