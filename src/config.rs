//! Configuration parsing and validation.
//!
//! QuickSearch is configured via a TOML file (default: `config/qsb.toml`).
//! The configuration is loaded once at startup and passed to all subsystems.
//!
//! # Example Configuration
//!
//! ```toml
//! [db]
//! path = "./data/qsb.sqlite"
//!
//! [suggest]
//! max_promoted = 10
//! num_promoted_sources = 4
//! publish_result_delay_ms = 200
//! query_timeout_ms = 5000
//!
//! [shortcuts]
//! max_stat_age_days = 30
//! min_clicks_for_source_ranking = 3
//!
//! [sources.apps]
//! label = "Applications"
//! default_enabled = true
//! rows = [
//!     { title = "Maps", shortcut_id = "maps" },
//!     { title = "Mail", shortcut_id = "mail", spinner_while_refreshing = true },
//! ]
//!
//! [sources.web]
//! label = "Web"
//! web = true
//! rows = [{ title = "example.com", url = "https://example.com" }]
//! ```
//!
//! # Sections
//!
//! | Section | Required | Purpose |
//! |---------|----------|---------|
//! | `[db]` | Yes | SQLite database path for the click history |
//! | `[suggest]` | No | Query dispatch and promotion limits |
//! | `[shortcuts]` | No | Click history retention and ranking |
//! | `[sources.<name>]` | No | Static suggestion sources |
//!
//! # Validation
//!
//! [`load_config`] rejects values the pipeline cannot work with, such as a
//! zero `max_promoted` or a zero worker pool.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quicksearch_core::params::SuggestParams;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub shortcuts: ShortcutsConfig,
    /// Static sources keyed by name.
    #[serde(default)]
    pub sources: BTreeMap<String, StaticSourceConfig>,
}

/// Database configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file. Created if it doesn't exist.
    pub path: PathBuf,
}

/// Query dispatch and promotion settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SuggestConfig {
    /// Row limit passed to each source.
    #[serde(default = "default_max_results_per_source")]
    pub max_results_per_source: usize,
    /// Size of each follow-up batch of corpus queries.
    #[serde(default = "default_num_promoted_sources")]
    pub num_promoted_sources: usize,
    #[serde(default = "default_num_suggestions_above_keyboard")]
    pub num_suggestions_above_keyboard: usize,
    #[serde(default = "default_max_promoted")]
    pub max_promoted: usize,
    #[serde(default = "default_max_shortcuts")]
    pub max_shortcuts_per_source: usize,
    #[serde(default = "default_max_shortcuts")]
    pub max_shortcuts_per_web_source: usize,
    #[serde(default)]
    pub show_suggestions_for_zero_query: bool,
    #[serde(default = "default_true")]
    pub allow_web_shortcuts: bool,
    /// Coalescing window for results within a batch. `0` publishes every
    /// result as it arrives.
    #[serde(default = "default_publish_result_delay_ms")]
    pub publish_result_delay_ms: u64,
    /// Concurrent source queries.
    #[serde(default = "default_query_workers")]
    pub query_workers: usize,
    /// Per-corpus deadline after which the corpus counts as empty.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            max_results_per_source: default_max_results_per_source(),
            num_promoted_sources: default_num_promoted_sources(),
            num_suggestions_above_keyboard: default_num_suggestions_above_keyboard(),
            max_promoted: default_max_promoted(),
            max_shortcuts_per_source: default_max_shortcuts(),
            max_shortcuts_per_web_source: default_max_shortcuts(),
            show_suggestions_for_zero_query: false,
            allow_web_shortcuts: true,
            publish_result_delay_ms: default_publish_result_delay_ms(),
            query_workers: default_query_workers(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl SuggestConfig {
    /// The subset of settings read by the promoters and query strategy.
    pub fn params(&self) -> SuggestParams {
        SuggestParams {
            max_results_per_source: self.max_results_per_source,
            num_promoted_sources: self.num_promoted_sources,
            num_suggestions_above_keyboard: self.num_suggestions_above_keyboard,
            max_promoted: self.max_promoted,
            max_shortcuts_per_source: self.max_shortcuts_per_source,
            max_shortcuts_per_web_source: self.max_shortcuts_per_web_source,
            show_suggestions_for_zero_query: self.show_suggestions_for_zero_query,
            allow_web_shortcuts: self.allow_web_shortcuts,
        }
    }
}

fn default_max_results_per_source() -> usize {
    50
}
fn default_num_promoted_sources() -> usize {
    4
}
fn default_num_suggestions_above_keyboard() -> usize {
    4
}
fn default_max_promoted() -> usize {
    10
}
fn default_max_shortcuts() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_publish_result_delay_ms() -> u64 {
    200
}
fn default_query_workers() -> usize {
    4
}
fn default_query_timeout_ms() -> u64 {
    5000
}

/// Click history settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ShortcutsConfig {
    /// Clicks older than this are forgotten.
    #[serde(default = "default_max_stat_age_days")]
    pub max_stat_age_days: u32,
    /// Corpora with fewer clicks get no score in the corpus ranking.
    #[serde(default = "default_min_clicks")]
    pub min_clicks_for_source_ranking: i64,
    /// Upper bound on shortcuts fetched per query.
    #[serde(default = "default_max_shortcuts_returned")]
    pub max_shortcuts_returned: usize,
}

impl Default for ShortcutsConfig {
    fn default() -> Self {
        Self {
            max_stat_age_days: default_max_stat_age_days(),
            min_clicks_for_source_ranking: default_min_clicks(),
            max_shortcuts_returned: default_max_shortcuts_returned(),
        }
    }
}

impl ShortcutsConfig {
    pub fn max_stat_age_ms(&self) -> i64 {
        i64::from(self.max_stat_age_days) * 24 * 60 * 60 * 1000
    }
}

fn default_max_stat_age_days() -> u32 {
    30
}
fn default_min_clicks() -> i64 {
    3
}
fn default_max_shortcuts_returned() -> usize {
    12
}

/// A static suggestion source defined in the config file.
#[derive(Debug, Deserialize, Clone)]
pub struct StaticSourceConfig {
    /// Display label. Defaults to the source name.
    #[serde(default)]
    pub label: Option<String>,
    /// Corpus the source belongs to. Sources naming the same corpus are
    /// grouped; the default is a corpus of the source's own name.
    #[serde(default)]
    pub corpus: Option<String>,
    /// Web sources form the web corpus and offer a web search row.
    #[serde(default)]
    pub web: bool,
    #[serde(default)]
    pub default_enabled: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub query_threshold: usize,
    #[serde(default = "default_true")]
    pub query_after_zero_results: bool,
    #[serde(default)]
    pub version_code: i64,
    #[serde(default)]
    pub rows: Vec<StaticRowConfig>,
}

/// One row of a static source.
#[derive(Debug, Deserialize, Clone)]
pub struct StaticRowConfig {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// `"_-1"` marks a row that never becomes a shortcut.
    #[serde(default)]
    pub shortcut_id: Option<String>,
    #[serde(default)]
    pub spinner_while_refreshing: bool,
}

impl Config {
    /// All-defaults configuration with the database at `db_path` and no
    /// sources.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            suggest: SuggestConfig::default(),
            shortcuts: ShortcutsConfig::default(),
            sources: BTreeMap::new(),
        }
    }
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or
/// contains values outside their allowed range.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.suggest.max_promoted < 1 {
        bail!("suggest.max_promoted must be >= 1");
    }
    if config.suggest.num_promoted_sources < 1 {
        bail!("suggest.num_promoted_sources must be >= 1");
    }
    if config.suggest.query_workers < 1 {
        bail!("suggest.query_workers must be >= 1");
    }
    if config.shortcuts.max_stat_age_days < 1 {
        bail!("shortcuts.max_stat_age_days must be >= 1");
    }
    for (name, source) in &config.sources {
        if name.is_empty() || name.contains('#') {
            bail!("Invalid source name '{}': must be non-empty without '#'", name);
        }
        for row in &source.rows {
            if row.title.trim().is_empty() {
                bail!("sources.{}: row title must not be empty", name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse("[db]\npath = \"x.sqlite\"\n").unwrap();
        assert_eq!(config.suggest.max_promoted, 10);
        assert_eq!(config.suggest.publish_result_delay_ms, 200);
        assert!(config.suggest.allow_web_shortcuts);
        assert_eq!(config.shortcuts.max_stat_age_days, 30);
        assert_eq!(config.shortcuts.max_stat_age_ms(), 30 * 86_400_000);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_sources_section() {
        let config = parse(
            r#"
[db]
path = "x.sqlite"

[sources.apps]
label = "Applications"
default_enabled = true
rows = [{ title = "Maps", shortcut_id = "maps" }]
"#,
        )
        .unwrap();
        let apps = &config.sources["apps"];
        assert!(apps.default_enabled);
        assert!(apps.enabled);
        assert_eq!(apps.rows[0].shortcut_id.as_deref(), Some("maps"));
    }

    #[test]
    fn test_rejects_zero_max_promoted() {
        let err = parse("[db]\npath = \"x\"\n[suggest]\nmax_promoted = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_promoted"));
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(parse("[db]\npath = \"x\"\n[suggest]\nquery_workers = 0\n").is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse(include_str!("../config/qsb.example.toml")).unwrap();
        assert_eq!(config.sources.len(), 5);
        assert_eq!(config.sources["videos"].corpus.as_deref(), Some("media"));
        assert!(config.sources["google"].web);
    }

    #[test]
    fn test_minimal_matches_defaults() {
        let config = Config::minimal("db.sqlite");
        assert_eq!(config.suggest.params(), SuggestParams::default());
        assert!(validate(&config).is_ok());
    }
}
