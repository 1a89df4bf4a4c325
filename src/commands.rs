//! Command implementations for the `qsb` binary.
//!
//! Each `run_*` function loads what it needs from the [`Config`], does its
//! work and prints a human-readable report to stdout. The click history
//! is flushed before the function returns, so consecutive invocations see
//! each other's writes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use quicksearch_core::corpus::Corpus;
use quicksearch_core::cursor::{ListSuggestionCursor, SuggestionCursor};
use quicksearch_core::promoter::{default_promoter, Promoter, SingleCorpusPromoter, WebPromoter};
use quicksearch_core::suggestion::{intent_key, Suggestion};

use crate::config::Config;
use crate::corpora::Corpora;
use crate::db;
use crate::migrate;
use crate::provider::{wait_until_done, SuggestionsProvider};
use crate::ranker::DefaultCorpusRanker;
use crate::shortcut_repository::{now_ms, ShortcutRepository};

async fn open(config: &Config) -> Result<(Arc<Corpora>, Arc<ShortcutRepository>)> {
    let corpora = Arc::new(Corpora::from_config(config)?);
    let repository = Arc::new(ShortcutRepository::open(config, Arc::clone(&corpora)).await?);
    Ok((corpora, repository))
}

/// Create the history database and its schema.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// Print every corpus in "search everything" order, then the rest.
pub async fn list_corpora(config: &Config) -> Result<()> {
    let (corpora, repository) = open(config).await?;
    let scores = repository.corpus_scores().await?;
    let ranker = DefaultCorpusRanker::new(Arc::clone(&corpora), Arc::clone(&repository));
    let mut listed = ranker.ranked_corpora().await?;
    for corpus in corpora.corpora() {
        if !listed.iter().any(|c| c.name() == corpus.name()) {
            listed.push(corpus);
        }
    }

    if listed.is_empty() {
        println!("No corpora configured.");
    } else {
        println!(
            "{:<16} {:<20} {:<8} {:<8} {:>6}",
            "CORPUS", "LABEL", "DEFAULT", "ENABLED", "CLICKS"
        );
        for corpus in &listed {
            let clicks = scores
                .get(corpus.name())
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<16} {:<20} {:<8} {:<8} {:>6}",
                corpus.name(),
                corpus.label(),
                corpus.is_default_enabled(),
                corpora.is_corpus_enabled(corpus.name()),
                clicks
            );
        }
    }
    drop(ranker);
    repository.close().await;
    Ok(())
}

/// Run `query` through the provider and print the promoted list.
///
/// `corpus` restricts the query to one corpus; `web` shows web search rows
/// only. Otherwise all enabled corpora are queried in ranked order.
pub async fn run_suggest(
    config: &Config,
    query: &str,
    corpus: Option<String>,
    max: Option<usize>,
    web: bool,
) -> Result<()> {
    let (corpora, repository) = open(config).await?;
    let params = config.suggest.params();
    let max_promoted = max.unwrap_or(params.max_promoted);

    let (targets, promoter): (Vec<Arc<dyn Corpus>>, Box<dyn Promoter>) = match (corpus, web) {
        (Some(_), true) => bail!("--corpus and --web cannot be combined"),
        (Some(name), false) => {
            let corpus = corpora
                .corpus(&name)
                .with_context(|| format!("Unknown corpus: {}", name))?;
            let promoter: Box<dyn Promoter> =
                Box::new(SingleCorpusPromoter::new(name, params.max_shortcuts_per_source));
            (vec![corpus], promoter)
        }
        (None, true) => {
            let web = corpora.web_corpus().context("No web corpus configured")?;
            let promoter: Box<dyn Promoter> = Box::new(WebPromoter::new(params.max_shortcuts_per_web_source));
            (vec![web], promoter)
        }
        (None, false) => {
            let ranker = DefaultCorpusRanker::new(Arc::clone(&corpora), Arc::clone(&repository));
            (ranker.ranked_corpora().await?, default_promoter(&params))
        }
    };

    let provider = SuggestionsProvider::new(config, Arc::clone(&corpora), Some(Arc::clone(&repository)));
    let suggestions = provider.get_suggestions(query, &targets);
    let limit = Duration::from_millis(config.suggest.query_timeout_ms) + Duration::from_secs(1);
    if !wait_until_done(suggestions.shared(), limit).await {
        eprintln!("Warning: not every corpus answered in time");
    }
    provider.settle().await;

    let promoted = suggestions.promoted(promoter.as_ref(), max_promoted);
    if promoted.is_empty() {
        println!("No suggestions.");
    } else {
        print_rows(&promoted);
    }
    for result in suggestions.corpus_results() {
        println!(
            "  {} returned {} row(s) in {} ms",
            result.corpus().name(),
            result.count(),
            result.latency_ms()
        );
    }

    drop(suggestions);
    provider.close();
    repository.close().await;
    Ok(())
}

/// Record a click on the row of `source` that `query` shows with the given
/// shortcut id or title.
pub async fn run_click(config: &Config, query: &str, source: &str, target: &str) -> Result<()> {
    let (corpora, repository) = open(config).await?;
    let src = corpora
        .source(source)
        .with_context(|| format!("Unknown source: {}", source))?;
    let shown = src
        .get_suggestions(query, config.suggest.max_results_per_source, false)
        .await?;
    let cursor = ListSuggestionCursor::from_rows(query, shown.into_rows());
    let position = cursor
        .rows()
        .iter()
        .position(|s| s.shortcut_id.as_deref() == Some(target) || s.text1 == target)
        .with_context(|| format!("No row '{}' in {} for query '{}'", target, source, query))?;

    let recorded = repository.report_click(&cursor, position, now_ms());
    repository.close().await;
    if recorded {
        println!("Recorded click on {} / {}", source, target);
    } else {
        println!("Row {} / {} is never a shortcut; nothing recorded.", source, target);
    }
    Ok(())
}

/// Print the shortcuts stored for `query`.
pub async fn run_shortcuts(config: &Config, query: &str) -> Result<()> {
    let (corpora, repository) = open(config).await?;
    let enabled = corpora.enabled_corpora();
    let shortcuts = repository
        .get_shortcuts_for_query(query, &enabled, config.suggest.allow_web_shortcuts, now_ms())
        .await?;
    match shortcuts {
        Some(cursor) => print_rows(cursor.as_ref()),
        None => println!("No shortcuts."),
    }
    repository.close().await;
    Ok(())
}

/// Remove one shortcut and its clicks.
pub async fn run_forget(config: &Config, intent_key: &str) -> Result<()> {
    let (_corpora, repository) = open(config).await?;
    repository.forget(intent_key);
    repository.close().await;
    println!("Forgot {}", intent_key);
    Ok(())
}

/// Remove every shortcut and click.
pub async fn run_clear_history(config: &Config) -> Result<()> {
    let (_corpora, repository) = open(config).await?;
    repository.clear_history();
    repository.close().await;
    println!("History cleared.");
    Ok(())
}

fn print_rows(cursor: &dyn SuggestionCursor) {
    for (i, row) in cursor.suggestions().iter().enumerate() {
        print_row(i + 1, row);
    }
}

fn print_row(n: usize, row: &Suggestion) {
    println!("{}. {} / {}", n, row.source, row.text1);
    if let Some(ref description) = row.text2 {
        println!("    {}", description);
    }
    if let Some(ref id) = row.shortcut_id {
        println!("    shortcut: {}", id);
    }
    println!("    key: {}", intent_key(row));
    println!();
}
