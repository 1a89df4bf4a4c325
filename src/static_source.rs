//! Suggestion sources defined in the config file.
//!
//! A [`StaticSource`] serves a fixed list of rows. A row matches a query
//! when any whitespace-separated word of its title starts with the query,
//! ignoring case; the empty query matches every row. Web sources also
//! offer a "search the web" row for the query itself, first.
//!
//! Static sources let the whole pipeline run (fan-out, promotion, click
//! history, shortcut refresh) without external providers.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use quicksearch_core::source::{Source, SourceResult};
use quicksearch_core::suggestion::{Suggestion, WEB_SEARCH_ACTION};

use crate::config::StaticSourceConfig;

/// Intent action of static rows.
pub const VIEW_ACTION: &str = "action.VIEW";

/// A source serving rows from configuration.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    label: String,
    web: bool,
    version_code: i64,
    query_threshold: usize,
    query_after_zero_results: bool,
    rows: Vec<Suggestion>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            web: false,
            version_code: 0,
            query_threshold: 0,
            query_after_zero_results: true,
            rows: Vec::new(),
        }
    }

    /// Build a source from its `[sources.<name>]` section.
    pub fn from_config(name: &str, cfg: &StaticSourceConfig) -> Self {
        let mut source = Self::new(name, cfg.label.clone().unwrap_or_else(|| name.to_string()));
        source.web = cfg.web;
        source.version_code = cfg.version_code;
        source.query_threshold = cfg.query_threshold;
        source.query_after_zero_results = cfg.query_after_zero_results;
        for row in &cfg.rows {
            let data = row.url.clone().unwrap_or_else(|| {
                format!("qsb://{}/{}", name, row.shortcut_id.as_deref().unwrap_or(&row.title))
            });
            let mut s = Suggestion::new(name, row.title.clone()).with_intent(VIEW_ACTION, Some(data));
            s.text2 = row.description.clone();
            s.text2_url = row.url.clone();
            s.shortcut_id = row.shortcut_id.clone();
            s.spinner_while_refreshing = row.spinner_while_refreshing;
            source.rows.push(s);
        }
        source
    }

    pub fn web(mut self, web: bool) -> Self {
        self.web = web;
        self
    }

    pub fn with_version_code(mut self, version_code: i64) -> Self {
        self.version_code = version_code;
        self
    }

    pub fn with_row(mut self, row: Suggestion) -> Self {
        self.rows.push(row);
        self
    }

    pub fn rows(&self) -> &[Suggestion] {
        &self.rows
    }

    fn web_search_row(&self, query: &str) -> Suggestion {
        Suggestion::new(&self.name, query)
            .with_text2(format!("Search {} for \"{}\"", self.label, query))
            .with_intent(WEB_SEARCH_ACTION, None)
            .with_intent_query(query)
    }
}

/// Whether any word of `title` starts with `query`, ignoring case.
pub fn title_matches(title: &str, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    title.starts_with(&query) || title.split_whitespace().any(|word| word.starts_with(&query))
}

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn version_code(&self) -> i64 {
        self.version_code
    }

    fn query_threshold(&self) -> usize {
        self.query_threshold
    }

    fn query_after_zero_results(&self) -> bool {
        self.query_after_zero_results
    }

    fn is_web_suggestion_source(&self) -> bool {
        self.web
    }

    async fn get_suggestions(&self, query: &str, limit: usize, _only_source: bool) -> Result<SourceResult> {
        let mut rows: Vec<Arc<Suggestion>> = Vec::new();
        if self.web && !query.trim().is_empty() {
            rows.push(Arc::new(self.web_search_row(query)));
        }
        rows.extend(
            self.rows
                .iter()
                .filter(|s| title_matches(&s.text1, query))
                .cloned()
                .map(Arc::new),
        );
        rows.truncate(limit);
        Ok(SourceResult::new(self.name.clone(), query, rows))
    }

    async fn refresh_shortcut(&self, shortcut_id: &str, _extra_data: Option<&str>) -> Result<Option<Suggestion>> {
        Ok(self
            .rows
            .iter()
            .find(|s| s.shortcut_id.as_deref() == Some(shortcut_id))
            .cloned())
    }
}
