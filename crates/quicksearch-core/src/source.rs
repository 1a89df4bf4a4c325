//! The [`Source`] trait: one external suggestion provider.
//!
//! A source answers queries with ranked [`Suggestion`] rows and can
//! re-validate a previously clicked row (a shortcut) by its shortcut id.
//! Queries are treated as slow and are only ever awaited from worker
//! tasks, never from the publish queue.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::cursor::SuggestionCursor;
use crate::params::SuggestParams;
use crate::suggestion::Suggestion;

/// An external suggestion provider.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use quicksearch_core::source::{Source, SourceResult};
/// use quicksearch_core::suggestion::Suggestion;
///
/// struct Colors;
///
/// #[async_trait]
/// impl Source for Colors {
///     fn name(&self) -> &str { "colors" }
///     fn label(&self) -> &str { "Colors" }
///
///     async fn get_suggestions(&self, query: &str, limit: usize, _only: bool) -> Result<SourceResult> {
///         let rows = ["red", "green", "blue"]
///             .iter()
///             .filter(|c| c.starts_with(query))
///             .take(limit)
///             .map(|c| Arc::new(Suggestion::new("colors", *c)))
///             .collect();
///         Ok(SourceResult::new("colors", query, rows))
///     }
///
///     async fn refresh_shortcut(&self, _id: &str, _extra: Option<&str>) -> Result<Option<Suggestion>> {
///         Ok(None)
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Unique source name; stored in every row it produces.
    fn name(&self) -> &str;

    /// User-visible label.
    fn label(&self) -> &str;

    fn hint(&self) -> Option<&str> {
        None
    }

    fn icon(&self) -> Option<&str> {
        None
    }

    /// Version of the installed provider. Stored alongside shortcuts.
    fn version_code(&self) -> i64 {
        0
    }

    /// Whether a shortcut saved under `version` can still be shown.
    fn is_version_code_compatible(&self, version: i64) -> bool {
        self.version_code() >= version
    }

    /// Minimum query length before this source is queried.
    fn query_threshold(&self) -> usize {
        0
    }

    /// Keep querying after a prefix of the query returned nothing.
    fn query_after_zero_results(&self) -> bool {
        false
    }

    fn voice_search_enabled(&self) -> bool {
        false
    }

    /// Whether this source produces web search suggestions.
    fn is_web_suggestion_source(&self) -> bool {
        false
    }

    /// Cap on shortcuts promoted from this source.
    fn max_shortcuts(&self, params: &SuggestParams) -> usize {
        if self.is_web_suggestion_source() {
            params.max_shortcuts_per_web_source
        } else {
            params.max_shortcuts_per_source
        }
    }

    /// Query the provider. May block for a long time.
    async fn get_suggestions(&self, query: &str, limit: usize, only_source: bool)
        -> Result<SourceResult>;

    /// Re-fetch a shortcut. `Ok(None)` means the shortcut is no longer valid.
    async fn refresh_shortcut(
        &self,
        shortcut_id: &str,
        extra_data: Option<&str>,
    ) -> Result<Option<Suggestion>>;
}

/// Rows returned by one [`Source`] for one query.
#[derive(Debug, Clone)]
pub struct SourceResult {
    source: String,
    user_query: String,
    rows: Vec<Arc<Suggestion>>,
}

impl SourceResult {
    pub fn new(source: impl Into<String>, user_query: impl Into<String>, rows: Vec<Arc<Suggestion>>) -> Self {
        Self {
            source: source.into(),
            user_query: user_query.into(),
            rows,
        }
    }

    pub fn empty(source: impl Into<String>, user_query: impl Into<String>) -> Self {
        Self::new(source, user_query, Vec::new())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_rows(self) -> Vec<Arc<Suggestion>> {
        self.rows
    }
}

impl SuggestionCursor for SourceResult {
    fn user_query(&self) -> &str {
        &self.user_query
    }

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn suggestion(&self, position: usize) -> Option<Arc<Suggestion>> {
        self.rows.get(position).cloned()
    }
}
