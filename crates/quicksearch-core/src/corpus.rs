//! The [`Corpus`] trait and per-corpus query results.
//!
//! A corpus is a user-visible category ("apps", "web", one searchable app)
//! backed by one or more [`Source`]s. Its blended properties decide whether
//! and when it is queried; [`CorpusResult`] tags the rows it returned with
//! the corpus, the query, and the observed latency.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::cursor::SuggestionCursor;
use crate::source::Source;
use crate::suggestion::Suggestion;

/// A platform intent built by a corpus. Opaque to the pipeline; passed
/// through to whatever launches searches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIntent {
    pub action: String,
    pub data: Option<String>,
    pub component: Option<String>,
    pub query: Option<String>,
    pub app_data: BTreeMap<String, String>,
}

/// A group of sources shown under one category.
#[async_trait]
pub trait Corpus: Send + Sync {
    /// Unique corpus name.
    fn name(&self) -> &str;

    fn label(&self) -> &str;

    fn hint(&self) -> Option<&str> {
        None
    }

    /// Minimum query length before this corpus is queried.
    fn query_threshold(&self) -> usize;

    /// Keep querying after a shorter prefix returned zero results.
    fn query_after_zero_results(&self) -> bool;

    fn voice_search_enabled(&self) -> bool;

    /// Whether this is the web corpus.
    fn is_web_corpus(&self) -> bool {
        false
    }

    /// Whether this corpus is enabled out of the box. Default-enabled
    /// corpora rank above the rest.
    fn is_default_enabled(&self) -> bool {
        false
    }

    /// Whether this corpus takes part in "search everything" mode.
    fn include_in_all(&self) -> bool {
        true
    }

    /// Sources backing this corpus.
    fn sources(&self) -> Vec<Arc<dyn Source>>;

    fn create_search_intent(&self, query: &str, app_data: &BTreeMap<String, String>) -> SearchIntent;

    fn create_voice_search_intent(&self, app_data: &BTreeMap<String, String>) -> Option<SearchIntent>;

    /// Query every source of this corpus and return their rows in order.
    async fn get_suggestions(
        &self,
        query: &str,
        limit: usize,
        only_corpus: bool,
    ) -> Result<Vec<Arc<Suggestion>>>;
}

/// Whether `source` belongs to `corpus`.
pub fn corpus_contains_source(corpus: &dyn Corpus, source: &str) -> bool {
    corpus.sources().iter().any(|s| s.name() == source)
}

/// Rows returned by one corpus for one query.
#[derive(Clone)]
pub struct CorpusResult {
    corpus: Arc<dyn Corpus>,
    user_query: String,
    rows: Vec<Arc<Suggestion>>,
    latency_ms: u64,
}

impl CorpusResult {
    pub fn new(
        corpus: Arc<dyn Corpus>,
        user_query: impl Into<String>,
        rows: Vec<Arc<Suggestion>>,
        latency_ms: u64,
    ) -> Self {
        Self {
            corpus,
            user_query: user_query.into(),
            rows,
            latency_ms,
        }
    }

    /// Empty result, used when the corpus failed or timed out.
    pub fn empty(corpus: Arc<dyn Corpus>, user_query: impl Into<String>, latency_ms: u64) -> Self {
        Self::new(corpus, user_query, Vec::new(), latency_ms)
    }

    pub fn corpus(&self) -> &Arc<dyn Corpus> {
        &self.corpus
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }
}

impl SuggestionCursor for CorpusResult {
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

impl std::fmt::Debug for CorpusResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusResult")
            .field("corpus", &self.corpus.name())
            .field("user_query", &self.user_query)
            .field("count", &self.rows.len())
            .field("latency_ms", &self.latency_ms)
            .finish()
    }
}
