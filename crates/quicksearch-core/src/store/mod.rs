//! Storage abstraction for the shortcut history.
//!
//! The [`ShortcutStore`] trait holds the three logical tables behind
//! shortcuts:
//!
//! | Table | Contents |
//! |-------|----------|
//! | shortcuts | One row per intent key: the last clicked [`Suggestion`] and its source version |
//! | clicklog | One row per click: intent key, query, hit time, corpus |
//! | sourcetotals | Running click count per corpus |
//!
//! Backends must keep the same retention and ranking semantics:
//!
//! - Every click insert purges click rows older than the store's max age,
//!   measured from the newest click. Shortcuts left without clicks are
//!   deleted, and the corpus totals are decremented for every purged click.
//! - [`shortcuts_for_query`](ShortcutStore::shortcuts_for_query) matches
//!   clicks whose query starts with the given query (via
//!   [`in_prefix_range`](crate::prefix::in_prefix_range)), groups them by
//!   intent key and orders the groups by [`rank_shortcuts`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::suggestion::Suggestion;

/// One click to record.
#[derive(Debug, Clone)]
pub struct Click {
    pub suggestion: Suggestion,
    /// Version code of the source when the row was clicked.
    pub source_version_code: i64,
    /// Query text the row was shown for.
    pub query: String,
    /// Corpus the source belongs to, credited in the corpus totals.
    pub corpus: String,
    /// Click time, epoch milliseconds.
    pub hit_time_ms: i64,
}

/// A stored shortcut.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortcutRecord {
    pub intent_key: String,
    pub suggestion: Suggestion,
    pub source_version_code: i64,
}

/// Per-shortcut click statistics used for ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutHits {
    pub intent_key: String,
    /// Latest matching click, epoch milliseconds.
    pub last_hit_ms: i64,
    /// Sum of `hit_time - cutoff` over matching clicks. Recent clicks
    /// weigh more than old ones.
    pub score: i64,
}

/// Order shortcut groups for display.
///
/// Groups whose latest click is the latest click of the whole match set
/// come first, then groups by descending score, then by intent key.
pub fn rank_shortcuts(hits: &mut [ShortcutHits]) {
    let newest = hits.iter().map(|h| h.last_hit_ms).max().unwrap_or(i64::MIN);
    hits.sort_by(|a, b| compare_hits(a, b, newest));
}

/// Cutoff below which clicks no longer count, saturating at the epoch.
pub fn cutoff_ms(now_ms: i64, max_age_ms: i64) -> i64 {
    now_ms.saturating_sub(max_age_ms).max(0)
}

fn compare_hits(a: &ShortcutHits, b: &ShortcutHits, newest: i64) -> Ordering {
    (b.last_hit_ms == newest)
        .cmp(&(a.last_hit_ms == newest))
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.intent_key.cmp(&b.intent_key))
}

/// Persistent click history and shortcut table.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`record_click`](ShortcutStore::record_click) | Upsert the shortcut and append a click |
/// | [`shortcuts_for_query`](ShortcutStore::shortcuts_for_query) | Ranked shortcuts for a query prefix |
/// | [`refresh_shortcut`](ShortcutStore::refresh_shortcut) | Replace or drop a shortcut after a refresh |
/// | [`corpus_scores`](ShortcutStore::corpus_scores) | Click totals per corpus |
/// | [`remove`](ShortcutStore::remove) | Forget one intent key |
/// | [`clear`](ShortcutStore::clear) | Forget everything |
/// | [`has_history`](ShortcutStore::has_history) | Whether any click is recorded |
#[async_trait]
pub trait ShortcutStore: Send + Sync {
    /// Upsert the clicked row (replace on intent key conflict), append a
    /// click and purge expired clicks.
    async fn record_click(&self, click: &Click) -> Result<()>;

    /// Shortcuts clicked for queries starting with `query`, best first.
    ///
    /// Only clicks newer than `now_ms - max age` count. The empty query
    /// matches the whole history.
    async fn shortcuts_for_query(
        &self,
        query: &str,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<ShortcutRecord>>;

    /// Apply a refresh outcome for `(source, shortcut_id)`.
    ///
    /// `Some` replaces the stored row, re-keying it when the intent key
    /// changed; its clicks follow it. `None` deletes the row. Unknown
    /// pairs are ignored.
    async fn refresh_shortcut(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<&Suggestion>,
    ) -> Result<()>;

    /// Corpus → total clicks, for corpora with at least `min_clicks`.
    async fn corpus_scores(&self, min_clicks: i64) -> Result<HashMap<String, i64>>;

    /// Delete a shortcut and all of its clicks.
    async fn remove(&self, intent_key: &str) -> Result<()>;

    /// Delete all shortcuts, clicks and totals.
    async fn clear(&self) -> Result<()>;

    async fn has_history(&self) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(key: &str, last: i64, score: i64) -> ShortcutHits {
        ShortcutHits {
            intent_key: key.to_string(),
            last_hit_ms: last,
            score,
        }
    }

    #[test]
    fn test_latest_first_then_score() {
        let mut h = vec![hits("a", 10, 500), hits("b", 30, 5), hits("c", 20, 900)];
        rank_shortcuts(&mut h);
        let keys: Vec<&str> = h.iter().map(|h| h.intent_key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_tied_latest_ordered_by_score() {
        let mut h = vec![hits("a", 30, 5), hits("b", 30, 50), hits("c", 10, 900)];
        rank_shortcuts(&mut h);
        let keys: Vec<&str> = h.iter().map(|h| h.intent_key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_cutoff_saturates() {
        assert_eq!(cutoff_ms(100, 1_000), 0);
        assert_eq!(cutoff_ms(5_000, 1_000), 4_000);
    }
}
