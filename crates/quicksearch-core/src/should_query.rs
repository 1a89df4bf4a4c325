//! Per-session policy deciding whether a corpus is worth querying.
//!
//! Some corpora declare that once a query prefix returned nothing, longer
//! queries will not return anything either. The strategy remembers, per
//! corpus, the query length at which it last came back empty and skips the
//! corpus while the user keeps typing. Backspacing past that length makes
//! the corpus eligible again; typing an unrelated query resets everything.
//!
//! Not internally synchronized; callers serialize access.

use std::collections::HashMap;

use tracing::debug;

use crate::corpus::Corpus;

#[derive(Debug, Default)]
pub struct ShouldQueryStrategy {
    show_zero_query: bool,
    last_query: String,
    /// corpus name → length of the query that returned zero results.
    empty_corpora: HashMap<String, usize>,
}

impl ShouldQueryStrategy {
    /// `show_zero_query` allows non-web corpora to be queried with the
    /// empty query.
    pub fn new(show_zero_query: bool) -> Self {
        Self {
            show_zero_query,
            ..Self::default()
        }
    }

    pub fn should_query_corpus(&mut self, corpus: &dyn Corpus, query: &str) -> bool {
        self.update_query(query);
        if query.is_empty() && !corpus.is_web_corpus() && !self.show_zero_query {
            return false;
        }
        if char_len(query) >= corpus.query_threshold() {
            if !corpus.query_after_zero_results() && self.empty_corpora.contains_key(corpus.name()) {
                debug!(corpus = corpus.name(), query, "skipping corpus after zero results");
                return false;
            }
            return true;
        }
        false
    }

    /// Record that `corpus` returned nothing for `query`.
    pub fn on_zero_results(&mut self, corpus: &dyn Corpus, query: &str) {
        if !query.is_empty()
            && self.last_query.starts_with(query)
            && !corpus.query_after_zero_results()
        {
            self.empty_corpora
                .insert(corpus.name().to_string(), char_len(query));
        }
    }

    fn update_query(&mut self, query: &str) {
        if query.starts_with(self.last_query.as_str()) {
            // Refinement: keep what we know.
        } else if self.last_query.starts_with(query) {
            let len = char_len(query);
            self.empty_corpora.retain(|_, recorded| *recorded <= len);
        } else {
            self.empty_corpora.clear();
        }
        self.last_query = query.to_string();
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCorpus;

    fn strict() -> TestCorpus {
        TestCorpus::new("contacts").query_after_zero(false)
    }

    #[test]
    fn test_zero_results_suppress_refinements() {
        let c = strict();
        let mut s = ShouldQueryStrategy::new(false);
        assert!(s.should_query_corpus(&c, "ab"));
        s.on_zero_results(&c, "ab");
        assert!(!s.should_query_corpus(&c, "abc"));
        assert!(s.should_query_corpus(&c, "a"));
    }

    #[test]
    fn test_backspace_to_same_length_stays_suppressed() {
        let c = strict();
        let mut s = ShouldQueryStrategy::new(false);
        s.should_query_corpus(&c, "abc");
        s.on_zero_results(&c, "ab");
        assert!(!s.should_query_corpus(&c, "abcd"));
        assert!(!s.should_query_corpus(&c, "ab"));
        assert!(s.should_query_corpus(&c, "a"));
    }

    #[test]
    fn test_unrelated_query_resets() {
        let c = strict();
        let mut s = ShouldQueryStrategy::new(false);
        s.should_query_corpus(&c, "ab");
        s.on_zero_results(&c, "ab");
        assert!(s.should_query_corpus(&c, "xyz"));
    }

    #[test]
    fn test_lenient_corpus_never_suppressed() {
        let c = TestCorpus::new("apps").query_after_zero(true);
        let mut s = ShouldQueryStrategy::new(false);
        s.should_query_corpus(&c, "ab");
        s.on_zero_results(&c, "ab");
        assert!(s.should_query_corpus(&c, "abc"));
    }

    #[test]
    fn test_zero_results_for_stale_query_ignored() {
        let c = strict();
        let mut s = ShouldQueryStrategy::new(false);
        s.should_query_corpus(&c, "xy");
        s.on_zero_results(&c, "ab");
        assert!(s.should_query_corpus(&c, "xyz"));
    }

    #[test]
    fn test_empty_query_only_web_without_zero_query() {
        let web = TestCorpus::new("web").web(true);
        let apps = TestCorpus::new("apps");
        let mut s = ShouldQueryStrategy::new(false);
        assert!(s.should_query_corpus(&web, ""));
        assert!(!s.should_query_corpus(&apps, ""));

        let mut s = ShouldQueryStrategy::new(true);
        assert!(s.should_query_corpus(&apps, ""));
    }

    #[test]
    fn test_threshold() {
        let c = TestCorpus::new("apps").threshold(3);
        let mut s = ShouldQueryStrategy::new(false);
        assert!(!s.should_query_corpus(&c, "ab"));
        assert!(s.should_query_corpus(&c, "abc"));
    }
}
