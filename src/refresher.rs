//! Background revalidation of shortcuts.
//!
//! Shortcuts shown to the user come from the click history and may be
//! stale. The first time a `(source, shortcut id)` pair is shown in a
//! session, [`ShortcutRefresher::refresh`] asks the source for the current
//! row and hands the outcome to a listener. `None` means the source no
//! longer knows the shortcut.
//!
//! A pair is refreshed at most once per session, and never twice at the
//! same time. [`reset`](ShortcutRefresher::reset) starts a new session.
//! A source error is logged and the listener is not called; the pair still
//! counts as refreshed.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use quicksearch_core::source::Source;
use quicksearch_core::suggestion::Suggestion;

use crate::executor::TaskExecutor;

#[derive(Debug, Default)]
struct RefreshState {
    refreshed: HashSet<String>,
    in_flight: HashSet<String>,
}

impl RefreshState {
    /// Move `key` from in flight to refreshed.
    fn mark_refreshed(&mut self, key: &str) {
        self.in_flight.remove(key);
        self.refreshed.insert(key.to_string());
    }
}

fn refresh_key(source: &str, shortcut_id: &str) -> String {
    format!("{source}#{shortcut_id}")
}

/// Session-scoped shortcut refresher.
pub struct ShortcutRefresher {
    executor: TaskExecutor,
    state: Arc<Mutex<RefreshState>>,
}

impl ShortcutRefresher {
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(RefreshState::default())),
        }
    }

    /// Whether the pair is neither refreshed this session nor in flight.
    pub fn should_refresh(&self, source: &str, shortcut_id: &str) -> bool {
        let key = refresh_key(source, shortcut_id);
        let state = self.state.lock();
        !state.refreshed.contains(&key) && !state.in_flight.contains(&key)
    }

    /// Revalidate `shortcut` against `source` in the background.
    ///
    /// Returns false when nothing was dispatched: the row has no usable
    /// shortcut id, or the pair was already refreshed or is in flight.
    pub fn refresh<F>(&self, source: Arc<dyn Source>, shortcut: &Suggestion, listener: F) -> bool
    where
        F: FnOnce(Option<Suggestion>) + Send + 'static,
    {
        let Some(shortcut_id) = shortcut.shortcut_id.clone() else {
            return false;
        };
        if !shortcut.is_shortcut_allowed() {
            return false;
        }
        let key = refresh_key(source.name(), &shortcut_id);
        {
            let mut state = self.state.lock();
            if state.refreshed.contains(&key) || !state.in_flight.insert(key.clone()) {
                return false;
            }
        }

        let extra_data = shortcut.intent_extra_data.clone();
        let state = Arc::clone(&self.state);
        self.executor.spawn(Box::pin(async move {
            match source.refresh_shortcut(&shortcut_id, extra_data.as_deref()).await {
                Ok(refreshed) => {
                    debug!(
                        source = source.name(),
                        shortcut_id = %shortcut_id,
                        valid = refreshed.is_some(),
                        "shortcut refreshed"
                    );
                    listener(refreshed);
                }
                Err(e) => {
                    warn!(source = source.name(), shortcut_id = %shortcut_id, error = %e, "shortcut refresh failed");
                }
            }
            state.lock().mark_refreshed(&key);
        }));
        true
    }

    /// Record the pair as refreshed without asking the source.
    pub fn mark_refreshed(&self, source: &str, shortcut_id: &str) {
        self.state
            .lock()
            .mark_refreshed(&refresh_key(source, shortcut_id));
    }

    /// Make every shortcut eligible again. In-flight refreshes are kept.
    pub fn reset(&self) {
        self.state.lock().refreshed.clear();
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_source::StaticSource;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use quicksearch_core::source::SourceResult;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn source() -> Arc<dyn Source> {
        Arc::new(StaticSource::new("apps", "Apps").with_row(
            Suggestion::new("apps", "Maps v2").with_shortcut_id("maps"),
        ))
    }

    async fn wait_idle(refresher: &ShortcutRefresher) {
        for _ in 0..100 {
            if refresher.in_flight_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("refresh still in flight");
    }

    #[tokio::test]
    async fn test_refresh_once_per_session() {
        let refresher = ShortcutRefresher::new(TaskExecutor::new(2));
        let stale = Suggestion::new("apps", "Maps").with_shortcut_id("maps");

        let (tx, rx) = oneshot::channel();
        assert!(refresher.refresh(source(), &stale, move |fresh| {
            let _ = tx.send(fresh);
        }));
        assert!(!refresher.refresh(source(), &stale, |_| {}));

        let fresh = rx.await.unwrap().unwrap();
        assert_eq!(fresh.text1, "Maps v2");
        wait_idle(&refresher).await;
        assert!(!refresher.should_refresh("apps", "maps"));
        assert!(!refresher.refresh(source(), &stale, |_| {}));

        refresher.reset();
        assert!(refresher.should_refresh("apps", "maps"));
    }

    #[tokio::test]
    async fn test_unknown_shortcut_reports_none() {
        let refresher = ShortcutRefresher::new(TaskExecutor::new(1));
        let gone = Suggestion::new("apps", "Old").with_shortcut_id("old");
        let (tx, rx) = oneshot::channel();
        refresher.refresh(source(), &gone, move |fresh| {
            let _ = tx.send(fresh);
        });
        assert!(rx.await.unwrap().is_none());
    }

    #[test]
    fn test_rows_without_usable_id_are_skipped() {
        let refresher = ShortcutRefresher::new(TaskExecutor::new(1));
        assert!(!refresher.refresh(source(), &Suggestion::new("apps", "Maps"), |_| {}));
        let never = Suggestion::new("apps", "Maps").with_shortcut_id("_-1");
        assert!(!refresher.refresh(source(), &never, |_| {}));
    }

    struct Broken;

    #[async_trait]
    impl Source for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn label(&self) -> &str {
            "Broken"
        }
        async fn get_suggestions(&self, _q: &str, _l: usize, _o: bool) -> Result<SourceResult> {
            bail!("down")
        }
        async fn refresh_shortcut(&self, _id: &str, _e: Option<&str>) -> Result<Option<Suggestion>> {
            bail!("down")
        }
    }

    #[tokio::test]
    async fn test_failure_marks_refreshed_without_callback() {
        let refresher = ShortcutRefresher::new(TaskExecutor::new(1));
        let row = Suggestion::new("broken", "X").with_shortcut_id("x");
        let called = Arc::new(Mutex::new(false));
        let c = Arc::clone(&called);
        assert!(refresher.refresh(Arc::new(Broken), &row, move |_| *c.lock() = true));

        wait_idle(&refresher).await;
        assert!(!*called.lock());
        assert!(!refresher.should_refresh("broken", "x"));
    }
}
