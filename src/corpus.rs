//! Corpus implementations.
//!
//! | Type | Sources | Search intent |
//! |------|---------|---------------|
//! | [`SingleSourceCorpus`] | One; properties delegate to it | `action.SEARCH` aimed at the source |
//! | [`MultiSourceCorpus`] | Several, queried concurrently | `action.SEARCH` |
//! | [`WebCorpus`] | Several web sources | `action.WEB_SEARCH` |
//!
//! A multi-source corpus blends the properties of its sources: the query
//! threshold is the smallest threshold, and querying after zero results
//! or voice search is allowed if any source allows it. Rows are
//! concatenated in source order. A failing source is logged and
//! contributes nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use quicksearch_core::corpus::{Corpus, SearchIntent};
use quicksearch_core::source::Source;
use quicksearch_core::suggestion::{
    Suggestion, SEARCH_ACTION, VOICE_SEARCH_ACTION, WEB_SEARCH_ACTION,
};

/// A corpus backed by exactly one source.
pub struct SingleSourceCorpus {
    source: Arc<dyn Source>,
    default_enabled: bool,
}

impl SingleSourceCorpus {
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self {
            source,
            default_enabled: false,
        }
    }

    pub fn default_enabled(mut self, value: bool) -> Self {
        self.default_enabled = value;
        self
    }
}

#[async_trait]
impl Corpus for SingleSourceCorpus {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn label(&self) -> &str {
        self.source.label()
    }

    fn hint(&self) -> Option<&str> {
        self.source.hint()
    }

    fn query_threshold(&self) -> usize {
        self.source.query_threshold()
    }

    fn query_after_zero_results(&self) -> bool {
        self.source.query_after_zero_results()
    }

    fn voice_search_enabled(&self) -> bool {
        self.source.voice_search_enabled()
    }

    fn is_default_enabled(&self) -> bool {
        self.default_enabled
    }

    fn sources(&self) -> Vec<Arc<dyn Source>> {
        vec![Arc::clone(&self.source)]
    }

    fn create_search_intent(&self, query: &str, app_data: &BTreeMap<String, String>) -> SearchIntent {
        SearchIntent {
            action: SEARCH_ACTION.to_string(),
            component: Some(self.source.name().to_string()),
            query: Some(query.to_string()),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        }
    }

    fn create_voice_search_intent(&self, app_data: &BTreeMap<String, String>) -> Option<SearchIntent> {
        self.voice_search_enabled().then(|| SearchIntent {
            action: VOICE_SEARCH_ACTION.to_string(),
            component: Some(self.source.name().to_string()),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        })
    }

    async fn get_suggestions(
        &self,
        query: &str,
        limit: usize,
        only_corpus: bool,
    ) -> Result<Vec<Arc<Suggestion>>> {
        Ok(self
            .source
            .get_suggestions(query, limit, only_corpus)
            .await?
            .into_rows())
    }
}

/// A corpus grouping several sources under one label.
pub struct MultiSourceCorpus {
    name: String,
    label: String,
    sources: Vec<Arc<dyn Source>>,
    default_enabled: bool,
}

impl MultiSourceCorpus {
    pub fn new(name: impl Into<String>, label: impl Into<String>, sources: Vec<Arc<dyn Source>>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            sources,
            default_enabled: false,
        }
    }

    pub fn default_enabled(mut self, value: bool) -> Self {
        self.default_enabled = value;
        self
    }

    /// Query every source concurrently; rows are kept in source order.
    async fn query_sources(&self, query: &str, limit: usize, only_corpus: bool) -> Vec<Arc<Suggestion>> {
        let only_source = only_corpus && self.sources.len() == 1;
        let results = join_all(
            self.sources
                .iter()
                .map(|s| s.get_suggestions(query, limit, only_source)),
        )
        .await;

        let mut rows = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(result) => rows.extend(result.into_rows()),
                Err(e) => warn!(corpus = %self.name, source = source.name(), error = %e, "source query failed"),
            }
        }
        rows
    }
}

#[async_trait]
impl Corpus for MultiSourceCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn query_threshold(&self) -> usize {
        self.sources
            .iter()
            .map(|s| s.query_threshold())
            .min()
            .unwrap_or(0)
    }

    fn query_after_zero_results(&self) -> bool {
        self.sources.iter().any(|s| s.query_after_zero_results())
    }

    fn voice_search_enabled(&self) -> bool {
        self.sources.iter().any(|s| s.voice_search_enabled())
    }

    fn is_default_enabled(&self) -> bool {
        self.default_enabled
    }

    fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.sources.clone()
    }

    fn create_search_intent(&self, query: &str, app_data: &BTreeMap<String, String>) -> SearchIntent {
        SearchIntent {
            action: SEARCH_ACTION.to_string(),
            data: Some(format!("qsb://corpus/{}", self.name)),
            query: Some(query.to_string()),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        }
    }

    fn create_voice_search_intent(&self, app_data: &BTreeMap<String, String>) -> Option<SearchIntent> {
        self.voice_search_enabled().then(|| SearchIntent {
            action: VOICE_SEARCH_ACTION.to_string(),
            data: Some(format!("qsb://corpus/{}", self.name)),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        })
    }

    async fn get_suggestions(
        &self,
        query: &str,
        limit: usize,
        only_corpus: bool,
    ) -> Result<Vec<Arc<Suggestion>>> {
        Ok(self.query_sources(query, limit, only_corpus).await)
    }
}

/// The web corpus. Always ranked first among the default corpora.
pub struct WebCorpus {
    inner: MultiSourceCorpus,
}

impl WebCorpus {
    pub fn new(name: impl Into<String>, label: impl Into<String>, sources: Vec<Arc<dyn Source>>) -> Self {
        Self {
            inner: MultiSourceCorpus::new(name, label, sources),
        }
    }

    pub fn default_enabled(mut self, value: bool) -> Self {
        self.inner = self.inner.default_enabled(value);
        self
    }
}

#[async_trait]
impl Corpus for WebCorpus {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn label(&self) -> &str {
        self.inner.label()
    }

    fn query_threshold(&self) -> usize {
        self.inner.query_threshold()
    }

    fn query_after_zero_results(&self) -> bool {
        self.inner.query_after_zero_results()
    }

    fn voice_search_enabled(&self) -> bool {
        self.inner.voice_search_enabled()
    }

    fn is_web_corpus(&self) -> bool {
        true
    }

    fn is_default_enabled(&self) -> bool {
        self.inner.is_default_enabled()
    }

    fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.inner.sources()
    }

    fn create_search_intent(&self, query: &str, app_data: &BTreeMap<String, String>) -> SearchIntent {
        SearchIntent {
            action: WEB_SEARCH_ACTION.to_string(),
            query: Some(query.to_string()),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        }
    }

    fn create_voice_search_intent(&self, app_data: &BTreeMap<String, String>) -> Option<SearchIntent> {
        self.voice_search_enabled().then(|| SearchIntent {
            action: VOICE_SEARCH_ACTION.to_string(),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        })
    }

    async fn get_suggestions(
        &self,
        query: &str,
        limit: usize,
        only_corpus: bool,
    ) -> Result<Vec<Arc<Suggestion>>> {
        self.inner.get_suggestions(query, limit, only_corpus).await
    }
}
