//! Corpus ordering for the "search everything" mode.
//!
//! [`DefaultCorpusRanker`] orders the enabled corpora that take part in
//! "all" searches:
//!
//! 1. default-enabled corpora before the others,
//! 2. then by click score, descending, with the web corpus scoring highest,
//! 3. then by label.
//!
//! The ordering is cached until the corpus registry changes or
//! [`clear`](DefaultCorpusRanker::clear) is called.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use quicksearch_core::corpus::Corpus;
use quicksearch_core::observer::ObserverId;

use crate::corpora::Corpora;
use crate::shortcut_repository::ShortcutRepository;

type Cache = Arc<Mutex<Option<Vec<Arc<dyn Corpus>>>>>;

/// Click-score ranking of corpora, cached.
pub struct DefaultCorpusRanker {
    corpora: Arc<Corpora>,
    repository: Arc<ShortcutRepository>,
    cache: Cache,
    observer: ObserverId,
}

impl DefaultCorpusRanker {
    pub fn new(corpora: Arc<Corpora>, repository: Arc<ShortcutRepository>) -> Self {
        let cache: Cache = Arc::new(Mutex::new(None));
        let weak = Arc::downgrade(&cache);
        let observer = corpora.register_observer(move || {
            if let Some(cache) = weak.upgrade() {
                *cache.lock() = None;
            }
        });
        Self {
            corpora,
            repository,
            cache,
            observer,
        }
    }

    /// Ranked corpora, from the cache when possible.
    pub async fn ranked_corpora(&self) -> Result<Vec<Arc<dyn Corpus>>> {
        if let Some(cached) = self.cache.lock().clone() {
            return Ok(cached);
        }
        let scores = self.repository.corpus_scores().await?;
        let candidates: Vec<Arc<dyn Corpus>> = self
            .corpora
            .enabled_corpora()
            .into_iter()
            .filter(|c| c.include_in_all())
            .collect();
        let ranked = rank_corpora(candidates, &scores);
        debug!(corpora = ranked.len(), scored = scores.len(), "corpus ranking computed");
        *self.cache.lock() = Some(ranked.clone());
        Ok(ranked)
    }

    /// Deliver the ranking to `callback` from a background task.
    ///
    /// If the scores cannot be read, the corpora are ranked without them.
    pub fn get_corpora_in_all<F>(self: &Arc<Self>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Vec<Arc<dyn Corpus>>) + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let ranked = match this.ranked_corpora().await {
                Ok(ranked) => ranked,
                Err(e) => {
                    warn!(error = %e, "corpus scores unavailable");
                    let candidates = this
                        .corpora
                        .enabled_corpora()
                        .into_iter()
                        .filter(|c| c.include_in_all())
                        .collect();
                    rank_corpora(candidates, &HashMap::new())
                }
            };
            callback(ranked);
        })
    }

    /// Drop the cached ranking.
    pub fn clear(&self) {
        *self.cache.lock() = None;
    }
}

impl Drop for DefaultCorpusRanker {
    fn drop(&mut self) {
        self.corpora.unregister_observer(self.observer);
    }
}

/// Sort `corpora` by default-enabled, score and label.
pub fn rank_corpora(mut corpora: Vec<Arc<dyn Corpus>>, scores: &HashMap<String, i64>) -> Vec<Arc<dyn Corpus>> {
    let score = |c: &Arc<dyn Corpus>| {
        if c.is_web_corpus() {
            i64::MAX
        } else {
            scores.get(c.name()).copied().unwrap_or(0)
        }
    };
    corpora.sort_by(|a, b| {
        b.is_default_enabled()
            .cmp(&a.is_default_enabled())
            .then_with(|| score(b).cmp(&score(a)))
            .then_with(|| a.label().cmp(b.label()))
    });
    corpora
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShortcutsConfig;
    use crate::corpus::{SingleSourceCorpus, WebCorpus};
    use crate::static_source::StaticSource;
    use quicksearch_core::cursor::ListSuggestionCursor;
    use quicksearch_core::store::memory::InMemoryShortcutStore;
    use quicksearch_core::suggestion::Suggestion;

    fn corpus(name: &str, label: &str, default_enabled: bool) -> Arc<dyn Corpus> {
        Arc::new(SingleSourceCorpus::new(Arc::new(StaticSource::new(name, label))).default_enabled(default_enabled))
    }

    fn names(corpora: &[Arc<dyn Corpus>]) -> Vec<&str> {
        corpora.iter().map(|c| c.name()).collect()
    }

    #[test]
    fn test_rank_order() {
        let web: Arc<dyn Corpus> = Arc::new(
            WebCorpus::new("web", "Web", vec![Arc::new(StaticSource::new("google", "Google").web(true))])
                .default_enabled(true),
        );
        let corpora = vec![
            corpus("music", "Music", false),
            corpus("contacts", "Contacts", true),
            corpus("apps", "Apps", true),
            corpus("books", "Books", false),
            web,
        ];
        let scores = HashMap::from([("contacts".to_string(), 10), ("music".to_string(), 4)]);
        let ranked = rank_corpora(corpora, &scores);
        assert_eq!(names(&ranked), vec!["web", "contacts", "apps", "music", "books"]);
    }

    #[tokio::test]
    async fn test_cache_invalidated_by_registry_change() {
        let corpora = Arc::new(Corpora::new());
        corpora.register_corpus(corpus("apps", "Apps", true), true);
        corpora.register_corpus(corpus("music", "Music", false), true);
        corpora.register_corpus(corpus("books", "Books", false), true);
        let store = Arc::new(InMemoryShortcutStore::new(30 * 86_400_000));
        let config = ShortcutsConfig {
            min_clicks_for_source_ranking: 1,
            ..ShortcutsConfig::default()
        };
        let repository = Arc::new(ShortcutRepository::new(store, Arc::clone(&corpora), config));
        let ranker = Arc::new(DefaultCorpusRanker::new(Arc::clone(&corpora), Arc::clone(&repository)));

        assert_eq!(names(&ranker.ranked_corpora().await.unwrap()), vec!["apps", "books", "music"]);

        let shown = ListSuggestionCursor::from_rows("s", vec![Arc::new(Suggestion::new("music", "Song"))]);
        repository.report_click(&shown, 0, 1_000);
        repository.flush().await;
        // Still cached.
        assert_eq!(names(&ranker.ranked_corpora().await.unwrap()), vec!["apps", "books", "music"]);

        ranker.clear();
        assert_eq!(names(&ranker.ranked_corpora().await.unwrap()), vec!["apps", "music", "books"]);

        corpora.set_enabled("books", false);
        assert_eq!(names(&ranker.ranked_corpora().await.unwrap()), vec!["apps", "music"]);

        let (tx, rx) = tokio::sync::oneshot::channel();
        ranker.get_corpora_in_all(move |ranked| {
            let _ = tx.send(ranked.len());
        });
        assert_eq!(rx.await.unwrap(), 2);
    }
}
