//! In-memory [`ShortcutStore`] implementation for testing and WASM targets.
//!
//! Keeps the three tables in plain collections behind one `std::sync::Mutex`,
//! so every operation is atomic. Retention, ranking and re-keying follow the
//! same rules as the SQLite store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::observer::lock;
use crate::prefix::in_prefix_range;
use crate::suggestion::{intent_key, Suggestion};

use super::{cutoff_ms, rank_shortcuts, Click, ShortcutHits, ShortcutRecord, ShortcutStore};

#[derive(Debug, Clone)]
struct ClickRow {
    intent_key: String,
    query: String,
    hit_time_ms: i64,
    corpus: String,
}

#[derive(Default)]
struct Tables {
    shortcuts: BTreeMap<String, ShortcutRecord>,
    clicklog: Vec<ClickRow>,
    sourcetotals: HashMap<String, i64>,
}

impl Tables {
    fn drop_clicks(&mut self, keep: impl Fn(&ClickRow) -> bool) {
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.clicklog)
            .into_iter()
            .partition(|c| keep(c));
        self.clicklog = kept;
        for click in dropped {
            if let Some(total) = self.sourcetotals.get_mut(&click.corpus) {
                *total -= 1;
                if *total <= 0 {
                    self.sourcetotals.remove(&click.corpus);
                }
            }
        }
    }

    fn drop_orphaned_shortcuts(&mut self) {
        let clicklog = &self.clicklog;
        self.shortcuts
            .retain(|key, _| clicklog.iter().any(|c| &c.intent_key == key));
    }
}

/// In-memory shortcut store.
pub struct InMemoryShortcutStore {
    max_age_ms: i64,
    tables: Mutex<Tables>,
}

impl InMemoryShortcutStore {
    /// A store that forgets clicks older than `max_age_ms`.
    pub fn new(max_age_ms: i64) -> Self {
        Self {
            max_age_ms,
            tables: Mutex::new(Tables::default()),
        }
    }
}

#[async_trait]
impl ShortcutStore for InMemoryShortcutStore {
    async fn record_click(&self, click: &Click) -> Result<()> {
        let key = intent_key(&click.suggestion);
        let mut t = lock(&self.tables);
        t.shortcuts.insert(
            key.clone(),
            ShortcutRecord {
                intent_key: key.clone(),
                suggestion: click.suggestion.clone(),
                source_version_code: click.source_version_code,
            },
        );
        t.clicklog.push(ClickRow {
            intent_key: key,
            query: click.query.clone(),
            hit_time_ms: click.hit_time_ms,
            corpus: click.corpus.clone(),
        });
        *t.sourcetotals.entry(click.corpus.clone()).or_insert(0) += 1;

        let newest = t.clicklog.iter().map(|c| c.hit_time_ms).max().unwrap_or(click.hit_time_ms);
        let cutoff = newest.saturating_sub(self.max_age_ms);
        t.drop_clicks(|c| c.hit_time_ms >= cutoff);
        t.drop_orphaned_shortcuts();
        Ok(())
    }

    async fn shortcuts_for_query(
        &self,
        query: &str,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<ShortcutRecord>> {
        let cutoff = cutoff_ms(now_ms, self.max_age_ms);
        let t = lock(&self.tables);
        let mut groups: HashMap<&str, ShortcutHits> = HashMap::new();
        for click in &t.clicklog {
            if click.hit_time_ms < cutoff || !in_prefix_range(&click.query, query) {
                continue;
            }
            if !t.shortcuts.contains_key(&click.intent_key) {
                continue;
            }
            let hits = groups.entry(click.intent_key.as_str()).or_insert_with(|| ShortcutHits {
                intent_key: click.intent_key.clone(),
                last_hit_ms: i64::MIN,
                score: 0,
            });
            hits.last_hit_ms = hits.last_hit_ms.max(click.hit_time_ms);
            hits.score += click.hit_time_ms - cutoff;
        }
        let mut ranked: Vec<ShortcutHits> = groups.into_values().collect();
        rank_shortcuts(&mut ranked);
        Ok(ranked
            .into_iter()
            .take(limit)
            .filter_map(|h| t.shortcuts.get(&h.intent_key).cloned())
            .collect())
    }

    async fn refresh_shortcut(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<&Suggestion>,
    ) -> Result<()> {
        let mut t = lock(&self.tables);
        let old_keys: Vec<String> = t
            .shortcuts
            .values()
            .filter(|r| {
                r.suggestion.source == source
                    && r.suggestion.shortcut_id.as_deref() == Some(shortcut_id)
            })
            .map(|r| r.intent_key.clone())
            .collect();
        if old_keys.is_empty() {
            return Ok(());
        }
        let Some(fresh) = refreshed else {
            for key in &old_keys {
                t.shortcuts.remove(key);
            }
            t.drop_clicks(|c| !old_keys.contains(&c.intent_key));
            return Ok(());
        };
        let new_key = intent_key(fresh);
        let mut version = 0;
        for key in &old_keys {
            if let Some(old) = t.shortcuts.remove(key) {
                version = old.source_version_code;
            }
        }
        for click in t.clicklog.iter_mut() {
            if old_keys.contains(&click.intent_key) {
                click.intent_key = new_key.clone();
            }
        }
        t.shortcuts.insert(
            new_key.clone(),
            ShortcutRecord {
                intent_key: new_key,
                suggestion: fresh.clone(),
                source_version_code: version,
            },
        );
        Ok(())
    }

    async fn corpus_scores(&self, min_clicks: i64) -> Result<HashMap<String, i64>> {
        Ok(lock(&self.tables)
            .sourcetotals
            .iter()
            .filter(|(_, total)| **total >= min_clicks)
            .map(|(corpus, total)| (corpus.clone(), *total))
            .collect())
    }

    async fn remove(&self, intent_key: &str) -> Result<()> {
        let mut t = lock(&self.tables);
        t.shortcuts.remove(intent_key);
        t.drop_clicks(|c| c.intent_key != intent_key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *lock(&self.tables) = Tables::default();
        Ok(())
    }

    async fn has_history(&self) -> Result<bool> {
        Ok(!lock(&self.tables).clicklog.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn click(source: &str, id: &str, query: &str, corpus: &str, at: i64) -> Click {
        Click {
            suggestion: Suggestion::new(source, id)
                .with_shortcut_id(id)
                .with_intent("action.VIEW", Some(format!("content://{source}/{id}"))),
            source_version_code: 1,
            query: query.to_string(),
            corpus: corpus.to_string(),
            hit_time_ms: at,
        }
    }

    fn titles(records: &[ShortcutRecord]) -> Vec<&str> {
        records.iter().map(|r| r.suggestion.text1.as_str()).collect()
    }

    #[tokio::test]
    async fn test_click_then_prefix_lookup() {
        let store = InMemoryShortcutStore::new(30 * DAY);
        store.record_click(&click("apps", "Maps", "map", "apps", DAY)).await.unwrap();

        assert_eq!(titles(&store.shortcuts_for_query("ma", DAY, 10).await.unwrap()), vec!["Maps"]);
        assert_eq!(titles(&store.shortcuts_for_query("", DAY, 10).await.unwrap()), vec!["Maps"]);
        assert!(store.shortcuts_for_query("mapx", DAY, 10).await.unwrap().is_empty());
        assert!(store.has_history().await.unwrap());
    }

    #[tokio::test]
    async fn test_most_recent_first_then_score() {
        let store = InMemoryShortcutStore::new(30 * DAY);
        for t in 1..=3 {
            store.record_click(&click("apps", "Mail", "m", "apps", t * DAY)).await.unwrap();
        }
        store.record_click(&click("apps", "Maps", "m", "apps", 4 * DAY)).await.unwrap();
        store.record_click(&click("apps", "Music", "m", "apps", 2 * DAY)).await.unwrap();

        let got = store.shortcuts_for_query("m", 5 * DAY, 10).await.unwrap();
        assert_eq!(titles(&got), vec!["Maps", "Mail", "Music"]);
        let top = store.shortcuts_for_query("m", 5 * DAY, 1).await.unwrap();
        assert_eq!(titles(&top), vec!["Maps"]);
    }

    #[tokio::test]
    async fn test_old_clicks_purged_on_insert() {
        let store = InMemoryShortcutStore::new(10 * DAY);
        store.record_click(&click("apps", "Old", "o", "apps", DAY)).await.unwrap();
        store.record_click(&click("apps", "New", "n", "apps", 20 * DAY)).await.unwrap();

        assert!(store.shortcuts_for_query("o", 20 * DAY, 10).await.unwrap().is_empty());
        assert!(store.shortcuts_for_query("", 0, 10).await.unwrap().iter().all(|r| r.suggestion.text1 == "New"));
        assert_eq!(store.corpus_scores(0).await.unwrap().get("apps"), Some(&1));
    }

    #[tokio::test]
    async fn test_refresh_rekeys_then_invalidation_drops_clicks() {
        let store = InMemoryShortcutStore::new(30 * DAY);
        store.record_click(&click("apps", "Maps", "ma", "apps", DAY)).await.unwrap();
        store.record_click(&click("apps", "Mail", "ma", "apps", DAY / 2)).await.unwrap();

        let fresh = Suggestion::new("apps", "Maps 2")
            .with_shortcut_id("Maps")
            .with_intent("action.VIEW", Some("content://apps/maps2".to_string()));
        store.refresh_shortcut("apps", "Maps", Some(&fresh)).await.unwrap();
        let got = store.shortcuts_for_query("ma", DAY, 10).await.unwrap();
        assert_eq!(titles(&got), vec!["Maps 2", "Mail"]);
        assert_eq!(got[0].source_version_code, 1);
        assert_eq!(store.corpus_scores(0).await.unwrap().get("apps"), Some(&2));

        store.refresh_shortcut("apps", "Maps", None).await.unwrap();
        assert_eq!(titles(&store.shortcuts_for_query("ma", DAY, 10).await.unwrap()), vec!["Mail"]);
        assert_eq!(store.corpus_scores(0).await.unwrap().get("apps"), Some(&1));

        store.refresh_shortcut("apps", "Mail", None).await.unwrap();
        assert!(!store.has_history().await.unwrap());
        assert!(store.corpus_scores(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corpus_scores_threshold() {
        let store = InMemoryShortcutStore::new(30 * DAY);
        for i in 0..3 {
            store.record_click(&click("apps", &format!("a{i}"), "a", "apps", DAY)).await.unwrap();
        }
        store.record_click(&click("web", "w", "w", "web", DAY)).await.unwrap();

        let scores = store.corpus_scores(2).await.unwrap();
        assert_eq!(scores.get("apps"), Some(&3));
        assert!(!scores.contains_key("web"));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let store = InMemoryShortcutStore::new(30 * DAY);
        let c = click("apps", "Maps", "ma", "apps", DAY);
        store.record_click(&c).await.unwrap();
        store.record_click(&click("apps", "Mail", "ma", "apps", DAY)).await.unwrap();

        store.remove(&intent_key(&c.suggestion)).await.unwrap();
        assert_eq!(titles(&store.shortcuts_for_query("ma", DAY, 10).await.unwrap()), vec!["Mail"]);
        assert_eq!(store.corpus_scores(0).await.unwrap().get("apps"), Some(&1));

        store.clear().await.unwrap();
        assert!(!store.has_history().await.unwrap());
    }
}
