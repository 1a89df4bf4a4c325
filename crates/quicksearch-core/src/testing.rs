//! Fixtures shared by the unit tests of this crate.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::corpus::{Corpus, SearchIntent};
use crate::source::{Source, SourceResult};
use crate::suggestion::{Suggestion, SEARCH_ACTION, WEB_SEARCH_ACTION};

/// Row `id` from `source`, with `id` as both title and shortcut id.
pub fn row(source: &str, id: &str) -> Arc<Suggestion> {
    Arc::new(Suggestion::new(source, id).with_shortcut_id(id))
}

/// Web search row for `query` from `source`.
pub fn web_row(source: &str, query: &str) -> Arc<Suggestion> {
    Arc::new(
        Suggestion::new(source, query)
            .with_intent(WEB_SEARCH_ACTION, None)
            .with_intent_query(query),
    )
}

pub struct TestSource {
    name: String,
    web: bool,
}

impl TestSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            web: false,
        }
    }

    pub fn web(mut self, web: bool) -> Self {
        self.web = web;
        self
    }
}

#[async_trait]
impl Source for TestSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn is_web_suggestion_source(&self) -> bool {
        self.web
    }

    async fn get_suggestions(&self, query: &str, _limit: usize, _only: bool) -> Result<SourceResult> {
        Ok(SourceResult::empty(self.name.clone(), query))
    }

    async fn refresh_shortcut(&self, _id: &str, _extra: Option<&str>) -> Result<Option<Suggestion>> {
        Ok(None)
    }
}

pub struct TestCorpus {
    name: String,
    threshold: usize,
    query_after_zero: bool,
    web: bool,
    default_enabled: bool,
    sources: Vec<Arc<dyn Source>>,
}

impl TestCorpus {
    /// Corpus backed by one test source of the same name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            threshold: 0,
            query_after_zero: true,
            web: false,
            default_enabled: false,
            sources: vec![Arc::new(TestSource::new(name))],
        }
    }

    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn query_after_zero(mut self, value: bool) -> Self {
        self.query_after_zero = value;
        self
    }

    pub fn web(mut self, web: bool) -> Self {
        self.web = web;
        self.sources = vec![Arc::new(TestSource::new(&self.name).web(web))];
        self
    }

    pub fn default_enabled(mut self, value: bool) -> Self {
        self.default_enabled = value;
        self
    }
}

#[async_trait]
impl Corpus for TestCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn query_threshold(&self) -> usize {
        self.threshold
    }

    fn query_after_zero_results(&self) -> bool {
        self.query_after_zero
    }

    fn voice_search_enabled(&self) -> bool {
        false
    }

    fn is_web_corpus(&self) -> bool {
        self.web
    }

    fn is_default_enabled(&self) -> bool {
        self.default_enabled
    }

    fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.sources.clone()
    }

    fn create_search_intent(&self, query: &str, app_data: &BTreeMap<String, String>) -> SearchIntent {
        SearchIntent {
            action: if self.web { WEB_SEARCH_ACTION } else { SEARCH_ACTION }.to_string(),
            query: Some(query.to_string()),
            app_data: app_data.clone(),
            ..SearchIntent::default()
        }
    }

    fn create_voice_search_intent(&self, _app_data: &BTreeMap<String, String>) -> Option<SearchIntent> {
        None
    }

    async fn get_suggestions(&self, _q: &str, _limit: usize, _only: bool) -> Result<Vec<Arc<Suggestion>>> {
        Ok(Vec::new())
    }
}
