//! Live cursor over the shortcuts shown for one query.
//!
//! Shortcuts come from the click history and may be stale. As the
//! shortcut refresher reports fresh data for a row, the row is replaced in
//! place (or removed when the source says it is gone) and observers are
//! notified so the promoted list can be rebuilt.

use std::sync::{Arc, Mutex};

use crate::cursor::SuggestionCursor;
use crate::observer::{lock, ObserverId, ObserverList};
use crate::suggestion::Suggestion;

#[derive(Debug, Clone)]
struct ShortcutRow {
    suggestion: Arc<Suggestion>,
    refreshed: bool,
}

/// Shortcut rows for one query, updated by refresh outcomes.
#[derive(Debug)]
pub struct ShortcutCursor {
    user_query: String,
    rows: Mutex<Vec<ShortcutRow>>,
    observers: ObserverList,
}

impl ShortcutCursor {
    pub fn new(user_query: impl Into<String>, rows: Vec<Arc<Suggestion>>) -> Self {
        Self {
            user_query: user_query.into(),
            rows: Mutex::new(
                rows.into_iter()
                    .map(|suggestion| ShortcutRow {
                        suggestion,
                        refreshed: false,
                    })
                    .collect(),
            ),
            observers: ObserverList::new(),
        }
    }

    /// Apply a refresh outcome for `(source, shortcut_id)`.
    ///
    /// `Some` replaces the matching row, `None` removes it. Returns whether
    /// any row matched.
    pub fn refresh(&self, source: &str, shortcut_id: &str, refreshed: Option<Suggestion>) -> bool {
        let changed = {
            let mut rows = lock(&self.rows);
            let idx = rows.iter().position(|r| {
                r.suggestion.source == source && r.suggestion.shortcut_id.as_deref() == Some(shortcut_id)
            });
            match (idx, refreshed) {
                (Some(i), Some(mut fresh)) => {
                    // The source may omit the id on refresh; keep the row addressable.
                    if fresh.shortcut_id.is_none() {
                        fresh.shortcut_id = Some(shortcut_id.to_string());
                    }
                    rows[i] = ShortcutRow {
                        suggestion: Arc::new(fresh),
                        refreshed: true,
                    };
                    true
                }
                (Some(i), None) => {
                    rows.remove(i);
                    true
                }
                (None, _) => false,
            }
        };
        if changed {
            self.observers.notify();
        }
        changed
    }

    /// Whether the row should show a progress indicator.
    pub fn is_refreshing(&self, position: usize) -> bool {
        lock(&self.rows)
            .get(position)
            .map(|r| r.suggestion.spinner_while_refreshing && !r.refreshed)
            .unwrap_or(false)
    }

    pub fn register_observer(&self, callback: impl Fn() + Send + Sync + 'static) -> ObserverId {
        self.observers.register(callback)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    pub(crate) fn clear_observers(&self) {
        self.observers.clear();
    }
}

impl SuggestionCursor for ShortcutCursor {
    fn user_query(&self) -> &str {
        &self.user_query
    }

    fn count(&self) -> usize {
        lock(&self.rows).len()
    }

    fn suggestion(&self, position: usize) -> Option<Arc<Suggestion>> {
        lock(&self.rows).get(position).map(|r| Arc::clone(&r.suggestion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cursor() -> ShortcutCursor {
        let mut spin = Suggestion::new("apps", "Mail").with_shortcut_id("m");
        spin.spinner_while_refreshing = true;
        ShortcutCursor::new(
            "ma",
            vec![
                Arc::new(spin),
                Arc::new(Suggestion::new("apps", "Maps").with_shortcut_id("p")),
            ],
        )
    }

    #[test]
    fn test_refresh_replaces_row_and_clears_spinner() {
        let c = cursor();
        assert!(c.is_refreshing(0));
        assert!(c.refresh("apps", "m", Some(Suggestion::new("apps", "Mail (3 unread)"))));
        assert_eq!(c.suggestion(0).unwrap().text1, "Mail (3 unread)");
        assert_eq!(c.suggestion(0).unwrap().shortcut_id.as_deref(), Some("m"));
        assert!(!c.is_refreshing(0));
    }

    #[test]
    fn test_refresh_none_removes_row() {
        let c = cursor();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        c.register_observer(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(c.refresh("apps", "p", None));
        assert_eq!(c.count(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresh_unknown_row_is_noop() {
        let c = cursor();
        assert!(!c.refresh("web", "m", None));
        assert_eq!(c.count(), 2);
    }
}
