//! SQLite-backed [`ShortcutStore`] implementation.
//!
//! Maps each store operation onto the tables created by
//! [`migrate`](crate::migrate). Prefix matching on click queries uses the
//! half-open range `[query, next_string(query))` so SQLite can scan
//! `idx_clicklog_query` instead of evaluating a `LIKE` pattern. Corpus
//! totals and orphaned shortcuts are maintained by the `clicklog` triggers.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use quicksearch_core::prefix::next_string;
use quicksearch_core::store::{
    cutoff_ms, rank_shortcuts, Click, ShortcutHits, ShortcutRecord, ShortcutStore,
};
use quicksearch_core::suggestion::{intent_key, Suggestion};

const SHORTCUT_COLUMNS: &str = "s.intent_key, s.source, s.source_version_code, s.format, s.title, \
     s.description, s.description_url, s.icon1, s.icon2, s.intent_action, s.intent_data, \
     s.intent_component, s.intent_query, s.intent_extra_data, s.shortcut_id, \
     s.spinner_while_refreshing, s.log_type, s.custom_columns";

/// SQLite implementation of the [`ShortcutStore`] trait.
pub struct SqliteShortcutStore {
    pool: SqlitePool,
    max_age_ms: i64,
}

impl SqliteShortcutStore {
    /// A store over `pool` that forgets clicks older than `max_age_ms`.
    pub fn new(pool: SqlitePool, max_age_ms: i64) -> Self {
        Self { pool, max_age_ms }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn upsert_shortcut(
    conn: &mut SqliteConnection,
    key: &str,
    s: &Suggestion,
    source_version_code: i64,
) -> Result<()> {
    let custom_columns = serde_json::to_string(&s.extras)?;
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO shortcuts (intent_key, source, source_version_code, format, title,
                                          description, description_url, icon1, icon2,
                                          intent_action, intent_data, intent_component,
                                          intent_query, intent_extra_data, shortcut_id,
                                          spinner_while_refreshing, log_type, custom_columns)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(key)
    .bind(&s.source)
    .bind(source_version_code)
    .bind(&s.format)
    .bind(&s.text1)
    .bind(&s.text2)
    .bind(&s.text2_url)
    .bind(&s.icon1)
    .bind(&s.icon2)
    .bind(&s.intent_action)
    .bind(&s.intent_data)
    .bind(&s.intent_component)
    .bind(&s.intent_query)
    .bind(&s.intent_extra_data)
    .bind(&s.shortcut_id)
    .bind(s.spinner_while_refreshing)
    .bind(&s.log_type)
    .bind(custom_columns)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn record_from_row(row: &SqliteRow) -> Result<ShortcutRecord> {
    let custom_columns: String = row.try_get("custom_columns")?;
    let extras: BTreeMap<String, String> = serde_json::from_str(&custom_columns)
        .with_context(|| "Corrupt custom_columns in shortcuts table")?;
    let spinner: i64 = row.try_get("spinner_while_refreshing")?;
    let suggestion = Suggestion {
        source: row.try_get("source")?,
        format: row.try_get("format")?,
        text1: row.try_get("title")?,
        text2: row.try_get("description")?,
        text2_url: row.try_get("description_url")?,
        icon1: row.try_get("icon1")?,
        icon2: row.try_get("icon2")?,
        shortcut_id: row.try_get("shortcut_id")?,
        spinner_while_refreshing: spinner != 0,
        intent_action: row.try_get("intent_action")?,
        intent_data: row.try_get("intent_data")?,
        intent_component: row.try_get("intent_component")?,
        intent_query: row.try_get("intent_query")?,
        intent_extra_data: row.try_get("intent_extra_data")?,
        log_type: row.try_get("log_type")?,
        extras,
    };
    Ok(ShortcutRecord {
        intent_key: row.try_get("intent_key")?,
        suggestion,
        source_version_code: row.try_get("source_version_code")?,
    })
}

#[async_trait]
impl ShortcutStore for SqliteShortcutStore {
    async fn record_click(&self, click: &Click) -> Result<()> {
        let key = intent_key(&click.suggestion);
        let mut tx = self.pool.begin().await?;

        upsert_shortcut(&mut tx, &key, &click.suggestion, click.source_version_code).await?;

        sqlx::query("INSERT INTO clicklog (intent_key, query, hit_time, corpus) VALUES (?, ?, ?, ?)")
            .bind(&key)
            .bind(&click.query)
            .bind(click.hit_time_ms)
            .bind(&click.corpus)
            .execute(&mut *tx)
            .await?;

        let purged = sqlx::query(
            "DELETE FROM clicklog WHERE hit_time < (SELECT MAX(hit_time) FROM clicklog) - ?",
        )
        .bind(self.max_age_ms)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        if purged > 0 {
            debug!(purged, "expired clicks purged");
        }
        Ok(())
    }

    async fn shortcuts_for_query(
        &self,
        query: &str,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<ShortcutRecord>> {
        let cutoff = cutoff_ms(now_ms, self.max_age_ms);
        let upper = next_string(query);

        let mut sql = format!(
            "SELECT {SHORTCUT_COLUMNS}, MAX(c.hit_time) AS last_hit, SUM(c.hit_time - ?) AS score \
             FROM clicklog c JOIN shortcuts s ON s.intent_key = c.intent_key \
             WHERE c.hit_time >= ?"
        );
        if !query.is_empty() {
            sql.push_str(" AND c.query >= ?");
            if upper.is_some() {
                sql.push_str(" AND c.query < ?");
            }
        }
        sql.push_str(" GROUP BY s.intent_key");

        let mut q = sqlx::query(&sql).bind(cutoff).bind(cutoff);
        if !query.is_empty() {
            q = q.bind(query);
            if let Some(upper) = &upper {
                q = q.bind(upper.as_str());
            }
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut records: HashMap<String, ShortcutRecord> = HashMap::with_capacity(rows.len());
        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = record_from_row(row)?;
            hits.push(ShortcutHits {
                intent_key: record.intent_key.clone(),
                last_hit_ms: row.try_get("last_hit")?,
                score: row.try_get("score")?,
            });
            records.insert(record.intent_key.clone(), record);
        }
        rank_shortcuts(&mut hits);

        Ok(hits
            .into_iter()
            .take(limit)
            .filter_map(|h| records.remove(&h.intent_key))
            .collect())
    }

    async fn refresh_shortcut(
        &self,
        source: &str,
        shortcut_id: &str,
        refreshed: Option<&Suggestion>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let old: Vec<(String, i64)> = sqlx::query_as(
            "SELECT intent_key, source_version_code FROM shortcuts WHERE source = ? AND shortcut_id = ?",
        )
        .bind(source)
        .bind(shortcut_id)
        .fetch_all(&mut *tx)
        .await?;
        if old.is_empty() {
            return Ok(());
        }

        sqlx::query("DELETE FROM shortcuts WHERE source = ? AND shortcut_id = ?")
            .bind(source)
            .bind(shortcut_id)
            .execute(&mut *tx)
            .await?;

        match refreshed {
            Some(fresh) => {
                let new_key = intent_key(fresh);
                for (old_key, _) in &old {
                    sqlx::query("UPDATE clicklog SET intent_key = ? WHERE intent_key = ?")
                        .bind(&new_key)
                        .bind(old_key)
                        .execute(&mut *tx)
                        .await?;
                }
                let version = old.last().map(|(_, v)| *v).unwrap_or(0);
                upsert_shortcut(&mut tx, &new_key, fresh, version).await?;
            }
            None => {
                // A disowned shortcut stops counting toward its corpus.
                for (old_key, _) in &old {
                    sqlx::query("DELETE FROM clicklog WHERE intent_key = ?")
                        .bind(old_key)
                        .execute(&mut *tx)
                        .await?;
                }
                debug!(source, shortcut_id, "invalidated shortcut dropped with its clicks");
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn corpus_scores(&self, min_clicks: i64) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT corpus, total_clicks FROM sourcetotals WHERE total_clicks >= ?")
                .bind(min_clicks)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn remove(&self, intent_key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM clicklog WHERE intent_key = ?")
            .bind(intent_key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM shortcuts WHERE intent_key = ?")
            .bind(intent_key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["clicklog", "shortcuts", "sourcetotals"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn has_history(&self) -> Result<bool> {
        let any: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM clicklog")
            .fetch_one(&self.pool)
            .await?;
        Ok(any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use tempfile::TempDir;

    const DAY: i64 = 86_400_000;

    async fn store(tmp: &TempDir, max_age_ms: i64) -> SqliteShortcutStore {
        let pool = db::connect(&Config::minimal(tmp.path().join("qsb.sqlite")))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteShortcutStore::new(pool, max_age_ms)
    }

    fn click(title: &str, query: &str, at: i64) -> Click {
        Click {
            suggestion: Suggestion::new("apps", title)
                .with_shortcut_id(title)
                .with_intent("action.VIEW", Some(format!("app://{title}")))
                .with_extra("package", "com.example"),
            source_version_code: 7,
            query: query.to_string(),
            corpus: "apps".to_string(),
            hit_time_ms: at,
        }
    }

    fn titles(records: &[ShortcutRecord]) -> Vec<&str> {
        records.iter().map(|r| r.suggestion.text1.as_str()).collect()
    }

    #[tokio::test]
    async fn test_round_trip_preserves_row() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 30 * DAY).await;
        let c = click("Maps", "maps", DAY);
        store.record_click(&c).await.unwrap();

        let got = store.shortcuts_for_query("ma", DAY, 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].suggestion, c.suggestion);
        assert_eq!(got[0].source_version_code, 7);
        assert_eq!(got[0].intent_key, intent_key(&c.suggestion));
    }

    #[tokio::test]
    async fn test_prefix_range_and_ranking() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 30 * DAY).await;
        for t in 1..=3 {
            store.record_click(&click("Mail", "mail", t * DAY)).await.unwrap();
        }
        store.record_click(&click("Maps", "maps", 4 * DAY)).await.unwrap();
        store.record_click(&click("Notes", "notes", 5 * DAY)).await.unwrap();

        let got = store.shortcuts_for_query("ma", 6 * DAY, 10).await.unwrap();
        assert_eq!(titles(&got), vec!["Maps", "Mail"]);
        let all = store.shortcuts_for_query("", 6 * DAY, 10).await.unwrap();
        assert_eq!(titles(&all), vec!["Notes", "Mail", "Maps"]);
    }

    #[tokio::test]
    async fn test_purge_and_totals() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 10 * DAY).await;
        store.record_click(&click("Old", "old", DAY)).await.unwrap();
        store.record_click(&click("New", "new", 20 * DAY)).await.unwrap();

        assert!(store.shortcuts_for_query("old", 0, 10).await.unwrap().is_empty());
        let scores = store.corpus_scores(1).await.unwrap();
        assert_eq!(scores.get("apps"), Some(&1));
        let shortcuts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shortcuts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(shortcuts, 1);
    }

    #[tokio::test]
    async fn test_refresh_replace_and_delete() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 30 * DAY).await;
        store.record_click(&click("Maps", "ma", DAY)).await.unwrap();
        store.record_click(&click("Mail", "ma", DAY / 2)).await.unwrap();

        let fresh = Suggestion::new("apps", "Maps (offline)")
            .with_shortcut_id("Maps")
            .with_intent("action.VIEW", Some("app://Maps?offline".to_string()));
        store.refresh_shortcut("apps", "Maps", Some(&fresh)).await.unwrap();
        let got = store.shortcuts_for_query("ma", DAY, 10).await.unwrap();
        assert_eq!(titles(&got), vec!["Maps (offline)", "Mail"]);
        assert_eq!(got[0].source_version_code, 7);
        assert_eq!(store.corpus_scores(1).await.unwrap().get("apps"), Some(&2));

        store.refresh_shortcut("apps", "Maps", None).await.unwrap();
        assert_eq!(titles(&store.shortcuts_for_query("ma", DAY, 10).await.unwrap()), vec!["Mail"]);
        assert_eq!(store.corpus_scores(1).await.unwrap().get("apps"), Some(&1));

        store.refresh_shortcut("apps", "Mail", None).await.unwrap();
        assert!(!store.has_history().await.unwrap());
        assert!(store.corpus_scores(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, 30 * DAY).await;
        let maps = click("Maps", "ma", DAY);
        store.record_click(&maps).await.unwrap();
        store.record_click(&click("Mail", "ma", DAY)).await.unwrap();

        store.remove(&intent_key(&maps.suggestion)).await.unwrap();
        assert_eq!(titles(&store.shortcuts_for_query("m", DAY, 10).await.unwrap()), vec!["Mail"]);
        assert_eq!(store.corpus_scores(0).await.unwrap().get("apps"), Some(&1));

        store.clear().await.unwrap();
        assert!(!store.has_history().await.unwrap());
        assert!(store.corpus_scores(0).await.unwrap().is_empty());
    }
}
