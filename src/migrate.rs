//! Database schema migrations.
//!
//! Creates the click history tables. Migrations are idempotent: every
//! statement uses `IF NOT EXISTS`, so [`run_migrations`] runs on every
//! start.
//!
//! # Schema
//!
//! ```text
//! shortcuts (intent_key PK)  ◀── clicklog (intent_key, query, hit_time, corpus)
//!                                      │
//!                                      └─ triggers ──▶ sourcetotals (corpus PK, total_clicks)
//! ```
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `shortcuts` | Last clicked row per intent key, with its source version |
//! | `clicklog` | One row per click |
//! | `sourcetotals` | Running click count per corpus |
//! | `schema_version` | Single row holding [`SCHEMA_VERSION`] |
//!
//! Triggers on `clicklog` keep `sourcetotals` current and delete a shortcut
//! once its last click is gone. A refresh that invalidates a shortcut
//! deletes its clicks too, so the corpus totals stop counting it.
//!
//! # Upgrades
//!
//! The history is disposable. When the stored version differs from
//! [`SCHEMA_VERSION`], every table is dropped and recreated.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Version of the schema created by this build.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS shortcuts (
        intent_key TEXT PRIMARY KEY NOT NULL,
        source TEXT NOT NULL,
        source_version_code INTEGER NOT NULL DEFAULT 0,
        format TEXT,
        title TEXT NOT NULL,
        description TEXT,
        description_url TEXT,
        icon1 TEXT,
        icon2 TEXT,
        intent_action TEXT,
        intent_data TEXT,
        intent_component TEXT,
        intent_query TEXT,
        intent_extra_data TEXT,
        shortcut_id TEXT,
        spinner_while_refreshing INTEGER NOT NULL DEFAULT 0,
        log_type TEXT,
        custom_columns TEXT NOT NULL DEFAULT '{}'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clicklog (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        intent_key TEXT NOT NULL,
        query TEXT NOT NULL,
        hit_time INTEGER NOT NULL,
        corpus TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sourcetotals (
        corpus TEXT PRIMARY KEY NOT NULL,
        total_clicks INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_shortcuts_source_id ON shortcuts(source, shortcut_id)",
    "CREATE INDEX IF NOT EXISTS idx_clicklog_query ON clicklog(query)",
    "CREATE INDEX IF NOT EXISTS idx_clicklog_hit_time ON clicklog(hit_time)",
    "CREATE INDEX IF NOT EXISTS idx_clicklog_intent_key ON clicklog(intent_key)",
    r#"
    CREATE TRIGGER IF NOT EXISTS clicklog_insert AFTER INSERT ON clicklog
    BEGIN
        INSERT OR IGNORE INTO sourcetotals (corpus, total_clicks) VALUES (NEW.corpus, 0);
        UPDATE sourcetotals SET total_clicks = total_clicks + 1 WHERE corpus = NEW.corpus;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS clicklog_delete AFTER DELETE ON clicklog
    BEGIN
        UPDATE sourcetotals SET total_clicks = total_clicks - 1 WHERE corpus = OLD.corpus;
        DELETE FROM sourcetotals WHERE corpus = OLD.corpus AND total_clicks <= 0;
        DELETE FROM shortcuts WHERE intent_key = OLD.intent_key
            AND NOT EXISTS (SELECT 1 FROM clicklog WHERE intent_key = OLD.intent_key);
    END
    "#,
];

const DROP_STATEMENTS: &[&str] = &[
    "DROP TRIGGER IF EXISTS clicklog_insert",
    "DROP TRIGGER IF EXISTS clicklog_delete",
    "DROP TABLE IF EXISTS clicklog",
    "DROP TABLE IF EXISTS shortcuts",
    "DROP TABLE IF EXISTS sourcetotals",
];

/// Bring the schema to [`SCHEMA_VERSION`], recreating it on mismatch.
///
/// # Errors
///
/// Returns an error if any DDL statement fails.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await?;

    let stored: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
        .fetch_optional(pool)
        .await?;

    let mut tx = pool.begin().await?;
    match stored {
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) => {
            info!(from = v, to = SCHEMA_VERSION, "schema version changed, dropping history");
            for stmt in DROP_STATEMENTS {
                sqlx::query(stmt).execute(&mut *tx).await?;
            }
            sqlx::query("UPDATE schema_version SET version = ?")
                .bind(SCHEMA_VERSION)
                .execute(&mut *tx)
                .await?;
        }
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(&mut *tx)
                .await?;
        }
    }
    for stmt in CREATE_STATEMENTS {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}
