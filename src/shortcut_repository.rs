//! Click history and shortcut lookup.
//!
//! [`ShortcutRepository`] sits between the suggestion pipeline and a
//! [`ShortcutStore`]. Reads go straight to the store. Writes (clicks,
//! refresh outcomes, removals) are queued to one writer task so the store
//! sees a single writer; they are fire-and-forget and a failed write is
//! only logged.
//!
//! Lookups filter the stored shortcuts against what is installed now:
//! the row's source must belong to one of the allowed corpora, its stored
//! version code must be compatible with the current source, and web
//! shortcuts can be excluded.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use quicksearch_core::corpus::Corpus;
use quicksearch_core::cursor::SuggestionCursor;
use quicksearch_core::shortcut_cursor::ShortcutCursor;
use quicksearch_core::source::Source;
use quicksearch_core::store::{Click, ShortcutStore};
use quicksearch_core::suggestion::{intent_key, Suggestion};

use crate::config::{Config, ShortcutsConfig};
use crate::corpora::Corpora;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteShortcutStore;

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

enum LogOp {
    Click(Click),
    Refresh {
        source: String,
        shortcut_id: String,
        refreshed: Option<Suggestion>,
    },
    Remove(String),
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Shortcut history with a serialized writer.
pub struct ShortcutRepository {
    store: Arc<dyn ShortcutStore>,
    corpora: Arc<Corpora>,
    config: ShortcutsConfig,
    writer: Mutex<Option<mpsc::UnboundedSender<LogOp>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl ShortcutRepository {
    /// Wrap `store` and spawn its writer task.
    pub fn new(store: Arc<dyn ShortcutStore>, corpora: Arc<Corpora>, config: ShortcutsConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(Arc::clone(&store), rx));
        Self {
            store,
            corpora,
            config,
            writer: Mutex::new(Some(tx)),
            writer_task: Mutex::new(Some(task)),
        }
    }

    /// Open the SQLite history configured in `config`, migrating it first.
    pub async fn open(config: &Config, corpora: Arc<Corpora>) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store = SqliteShortcutStore::new(pool, config.shortcuts.max_stat_age_ms());
        Ok(Self::new(Arc::new(store), corpora, config.shortcuts.clone()))
    }

    fn send(&self, op: LogOp) -> bool {
        match self.writer.lock().as_ref() {
            Some(tx) => tx.send(op).is_ok(),
            None => {
                debug!("shortcut repository closed, dropping write");
                false
            }
        }
    }

    /// Record a click on row `position` of `cursor`.
    ///
    /// Rows marked as never-shortcut and rows whose source is not
    /// registered are skipped. Returns whether a click was queued.
    pub fn report_click(&self, cursor: &dyn SuggestionCursor, position: usize, now_ms: i64) -> bool {
        let Some(row) = cursor.suggestion(position) else {
            warn!(position, count = cursor.count(), "click outside cursor");
            return false;
        };
        if !row.is_shortcut_allowed() {
            debug!(source = %row.source, "row is never a shortcut");
            return false;
        }
        let (Some(source), Some(corpus)) = (
            self.corpora.source(&row.source),
            self.corpora.corpus_for_source(&row.source),
        ) else {
            warn!(source = %row.source, "click for unknown source");
            return false;
        };
        self.send(LogOp::Click(Click {
            suggestion: (*row).clone(),
            source_version_code: source.version_code(),
            query: cursor.user_query().to_string(),
            corpus: corpus.name().to_string(),
            hit_time_ms: now_ms,
        }))
    }

    /// Shortcuts for `query` usable with `allowed` corpora.
    ///
    /// Returns `None` when nothing survives the filters.
    pub async fn get_shortcuts_for_query(
        &self,
        query: &str,
        allowed: &[Arc<dyn Corpus>],
        allow_web_shortcuts: bool,
        now_ms: i64,
    ) -> Result<Option<Arc<ShortcutCursor>>> {
        let sources: HashMap<String, Arc<dyn Source>> = allowed
            .iter()
            .flat_map(|c| c.sources())
            .map(|s| (s.name().to_string(), s))
            .collect();

        let records = self
            .store
            .shortcuts_for_query(query, now_ms, self.config.max_shortcuts_returned)
            .await?;
        let total = records.len();

        let rows: Vec<Arc<Suggestion>> = records
            .into_iter()
            .filter(|record| {
                let Some(source) = sources.get(&record.suggestion.source) else {
                    return false;
                };
                if !allow_web_shortcuts && source.is_web_suggestion_source() {
                    return false;
                }
                source.is_version_code_compatible(record.source_version_code)
            })
            .map(|record| Arc::new(record.suggestion))
            .collect();

        debug!(query, stored = total, kept = rows.len(), "shortcuts for query");
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(ShortcutCursor::new(query, rows))))
    }

    /// Store a refresh outcome for `(source, shortcut_id)`. `None` drops
    /// the shortcut.
    pub fn update_shortcut(&self, source: &str, shortcut_id: &str, refreshed: Option<Suggestion>) {
        let refreshed = refreshed.map(|mut s| {
            if s.shortcut_id.is_none() {
                s.shortcut_id = Some(shortcut_id.to_string());
            }
            s
        });
        self.send(LogOp::Refresh {
            source: source.to_string(),
            shortcut_id: shortcut_id.to_string(),
            refreshed,
        });
    }

    /// Corpus → click count, for corpora with enough clicks to rank.
    pub async fn corpus_scores(&self) -> Result<HashMap<String, i64>> {
        self.store
            .corpus_scores(self.config.min_clicks_for_source_ranking)
            .await
    }

    /// Forget the shortcut behind row `position` of `cursor`.
    pub fn remove_from_history(&self, cursor: &dyn SuggestionCursor, position: usize) -> bool {
        match cursor.suggestion(position) {
            Some(row) => self.forget(&intent_key(&row)),
            None => false,
        }
    }

    /// Forget one shortcut by intent key.
    pub fn forget(&self, intent_key: &str) -> bool {
        self.send(LogOp::Remove(intent_key.to_string()))
    }

    pub fn clear_history(&self) -> bool {
        self.send(LogOp::Clear)
    }

    pub async fn has_history(&self) -> Result<bool> {
        self.store.has_history().await
    }

    /// Wait until every queued write has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(LogOp::Flush(tx)) {
            let _ = rx.await;
        }
    }

    /// Apply queued writes and stop the writer.
    pub async fn close(&self) {
        drop(self.writer.lock().take());
        let task = self.writer_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "shortcut writer task failed");
            }
        }
    }
}

async fn run_writer(store: Arc<dyn ShortcutStore>, mut rx: mpsc::UnboundedReceiver<LogOp>) {
    while let Some(op) = rx.recv().await {
        let result = match op {
            LogOp::Click(click) => store.record_click(&click).await,
            LogOp::Refresh {
                source,
                shortcut_id,
                refreshed,
            } => {
                store
                    .refresh_shortcut(&source, &shortcut_id, refreshed.as_ref())
                    .await
            }
            LogOp::Remove(key) => store.remove(&key).await,
            LogOp::Clear => store.clear().await,
            LogOp::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "shortcut history write failed");
        }
    }
    debug!("shortcut writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{SingleSourceCorpus, WebCorpus};
    use crate::static_source::StaticSource;
    use quicksearch_core::cursor::ListSuggestionCursor;
    use quicksearch_core::store::memory::InMemoryShortcutStore;

    const DAY_MS: i64 = 86_400_000;
    const NOW: i64 = 100 * DAY_MS;

    fn corpora() -> Arc<Corpora> {
        let corpora = Corpora::new();
        let apps = StaticSource::new("apps", "Apps")
            .with_version_code(2)
            .with_row(Suggestion::new("apps", "Maps").with_shortcut_id("maps"));
        corpora.register_corpus(Arc::new(SingleSourceCorpus::new(Arc::new(apps))), true);
        let google = StaticSource::new("google", "Google").web(true);
        corpora.register_corpus(Arc::new(WebCorpus::new("web", "Web", vec![Arc::new(google)])), true);
        Arc::new(corpora)
    }

    fn repository(corpora: &Arc<Corpora>) -> ShortcutRepository {
        let store = Arc::new(InMemoryShortcutStore::new(30 * DAY_MS));
        ShortcutRepository::new(store, Arc::clone(corpora), ShortcutsConfig::default())
    }

    fn cursor(query: &str, rows: Vec<Suggestion>) -> ListSuggestionCursor {
        ListSuggestionCursor::from_rows(query, rows.into_iter().map(Arc::new).collect())
    }

    #[tokio::test]
    async fn test_click_then_lookup_by_prefix() {
        let corpora = corpora();
        let repo = repository(&corpora);
        let shown = cursor("map", vec![Suggestion::new("apps", "Maps").with_shortcut_id("maps")]);
        assert!(repo.report_click(&shown, 0, NOW));
        repo.flush().await;

        let all = corpora.corpora();
        let found = repo.get_shortcuts_for_query("ma", &all, true, NOW).await.unwrap().unwrap();
        assert_eq!(found.count(), 1);
        assert_eq!(found.suggestion(0).unwrap().shortcut_id.as_deref(), Some("maps"));
        assert!(repo.get_shortcuts_for_query("x", &all, true, NOW).await.unwrap().is_none());
        assert!(repo.has_history().await.unwrap());
    }

    #[tokio::test]
    async fn test_never_shortcut_and_unknown_source_skipped() {
        let corpora = corpora();
        let repo = repository(&corpora);
        let shown = cursor(
            "m",
            vec![
                Suggestion::new("apps", "Scratch").with_shortcut_id("_-1"),
                Suggestion::new("nowhere", "Ghost"),
            ],
        );
        assert!(!repo.report_click(&shown, 0, NOW));
        assert!(!repo.report_click(&shown, 1, NOW));
        assert!(!repo.report_click(&shown, 7, NOW));
        repo.flush().await;
        assert!(!repo.has_history().await.unwrap());
    }

    #[tokio::test]
    async fn test_filters_by_corpus_web_and_version() {
        let corpora = corpora();
        let repo = repository(&corpora);
        let shown = cursor(
            "r",
            vec![
                Suggestion::new("apps", "Maps").with_shortcut_id("maps"),
                Suggestion::new("google", "rust").with_shortcut_id("rust"),
            ],
        );
        repo.report_click(&shown, 0, NOW);
        repo.report_click(&shown, 1, NOW + 1);
        repo.flush().await;

        let all = corpora.corpora();
        let both = repo.get_shortcuts_for_query("", &all, true, NOW + 2).await.unwrap().unwrap();
        assert_eq!(both.count(), 2);

        let no_web = repo.get_shortcuts_for_query("", &all, false, NOW + 2).await.unwrap().unwrap();
        assert_eq!(no_web.count(), 1);
        assert_eq!(no_web.suggestion(0).unwrap().source, "apps");

        let apps_only = vec![corpora.corpus("apps").unwrap()];
        let found = repo.get_shortcuts_for_query("", &apps_only, true, NOW + 2).await.unwrap().unwrap();
        assert_eq!(found.count(), 1);

        // A downgraded source cannot read rows written by a newer version.
        let downgraded = Corpora::new();
        let old_apps = StaticSource::new("apps", "Apps").with_version_code(1);
        downgraded.register_corpus(Arc::new(SingleSourceCorpus::new(Arc::new(old_apps))), true);
        let old = downgraded.corpora();
        assert!(repo.get_shortcuts_for_query("", &old, true, NOW + 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_remove_clear_and_scores() {
        let corpora = corpora();
        let repo = repository(&corpora);
        let shown = cursor("m", vec![Suggestion::new("apps", "Maps").with_shortcut_id("maps")]);
        for i in 0..3 {
            repo.report_click(&shown, 0, NOW + i);
        }
        repo.flush().await;
        assert_eq!(repo.corpus_scores().await.unwrap().get("apps"), Some(&3));

        let mut fresh = Suggestion::new("apps", "Maps (new)");
        fresh.shortcut_id = None;
        repo.update_shortcut("apps", "maps", Some(fresh));
        repo.flush().await;
        let all = corpora.corpora();
        let found = repo.get_shortcuts_for_query("m", &all, true, NOW + 5).await.unwrap().unwrap();
        assert_eq!(found.suggestion(0).unwrap().text1, "Maps (new)");
        assert_eq!(found.suggestion(0).unwrap().shortcut_id.as_deref(), Some("maps"));

        repo.remove_from_history(found.as_ref(), 0);
        repo.flush().await;
        assert!(repo.get_shortcuts_for_query("m", &all, true, NOW + 5).await.unwrap().is_none());

        repo.report_click(&shown, 0, NOW + 10);
        repo.clear_history();
        repo.close().await;
        assert!(!repo.has_history().await.unwrap());
        assert!(!repo.clear_history());
    }
}
