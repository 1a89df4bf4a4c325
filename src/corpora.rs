//! The corpus registry.
//!
//! [`Corpora`] owns every registered corpus, remembers which ones the user
//! has enabled and answers lookups by corpus or source name. Observers
//! registered with [`Corpora::register_observer`] are told about every
//! change; the corpus ranker uses this to drop its cached ordering.
//!
//! [`Corpora::from_config`] builds the registry from the `[sources.*]`
//! sections: web sources are grouped into one [`WebCorpus`], sources that
//! name a shared `corpus` form a [`MultiSourceCorpus`], and every other
//! source becomes a [`SingleSourceCorpus`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::RwLock;
use tracing::debug;

use quicksearch_core::corpus::{corpus_contains_source, Corpus};
use quicksearch_core::observer::{ObserverId, ObserverList};
use quicksearch_core::source::Source;

use crate::config::Config;
use crate::corpus::{MultiSourceCorpus, SingleSourceCorpus, WebCorpus};
use crate::static_source::StaticSource;

/// Name of the corpus built from web sources.
pub const WEB_CORPUS_NAME: &str = "web";

#[derive(Default)]
struct Registry {
    corpora: Vec<Arc<dyn Corpus>>,
    enabled: HashSet<String>,
}

/// Registered corpora and their enabled state.
#[derive(Default)]
pub struct Corpora {
    registry: RwLock<Registry>,
    observers: ObserverList,
}

impl Corpora {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the static sources in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let corpora = Self::new();

        let mut web: Vec<Arc<dyn Source>> = Vec::new();
        let mut web_default = false;
        let mut web_enabled = false;
        let mut groups: BTreeMap<String, (Vec<Arc<dyn Source>>, bool, bool)> = BTreeMap::new();

        for (name, cfg) in &config.sources {
            let source: Arc<dyn Source> = Arc::new(StaticSource::from_config(name, cfg));
            if cfg.web {
                web_default |= cfg.default_enabled;
                web_enabled |= cfg.enabled;
                web.push(source);
                continue;
            }
            let corpus = cfg.corpus.clone().unwrap_or_else(|| name.clone());
            let group = groups.entry(corpus).or_insert_with(|| (Vec::new(), false, false));
            group.0.push(source);
            group.1 |= cfg.default_enabled;
            group.2 |= cfg.enabled;
        }

        if !web.is_empty() {
            if groups.contains_key(WEB_CORPUS_NAME) {
                bail!("corpus name '{}' is reserved for web sources", WEB_CORPUS_NAME);
            }
            let corpus = WebCorpus::new(WEB_CORPUS_NAME, "Web", web).default_enabled(web_default);
            corpora.register_corpus(Arc::new(corpus), web_enabled);
        }
        for (name, (sources, default_enabled, enabled)) in groups {
            let corpus: Arc<dyn Corpus> = if sources.len() == 1 && sources[0].name() == name {
                Arc::new(SingleSourceCorpus::new(Arc::clone(&sources[0])).default_enabled(default_enabled))
            } else {
                let label = capitalize(&name);
                Arc::new(MultiSourceCorpus::new(name, label, sources).default_enabled(default_enabled))
            };
            corpora.register_corpus(corpus, enabled);
        }
        Ok(corpora)
    }

    /// Add a corpus, replacing any corpus of the same name.
    pub fn register_corpus(&self, corpus: Arc<dyn Corpus>, enabled: bool) {
        {
            let mut reg = self.registry.write();
            let name = corpus.name().to_string();
            reg.corpora.retain(|c| c.name() != name);
            if enabled {
                reg.enabled.insert(name.clone());
            } else {
                reg.enabled.remove(&name);
            }
            debug!(corpus = %name, enabled, "corpus registered");
            reg.corpora.push(corpus);
        }
        self.observers.notify();
    }

    /// All corpora in registration order.
    pub fn corpora(&self) -> Vec<Arc<dyn Corpus>> {
        self.registry.read().corpora.clone()
    }

    pub fn corpus(&self, name: &str) -> Option<Arc<dyn Corpus>> {
        self.registry
            .read()
            .corpora
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn web_corpus(&self) -> Option<Arc<dyn Corpus>> {
        self.registry
            .read()
            .corpora
            .iter()
            .find(|c| c.is_web_corpus())
            .cloned()
    }

    /// Look up a source of any registered corpus.
    pub fn source(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.registry
            .read()
            .corpora
            .iter()
            .flat_map(|c| c.sources())
            .find(|s| s.name() == name)
    }

    pub fn corpus_for_source(&self, source: &str) -> Option<Arc<dyn Corpus>> {
        self.registry
            .read()
            .corpora
            .iter()
            .find(|c| corpus_contains_source(c.as_ref(), source))
            .cloned()
    }

    /// Enable or disable a corpus. Unknown names are ignored.
    pub fn set_enabled(&self, name: &str, enabled: bool) {
        let changed = {
            let mut reg = self.registry.write();
            if !reg.corpora.iter().any(|c| c.name() == name) {
                return;
            }
            if enabled {
                reg.enabled.insert(name.to_string())
            } else {
                reg.enabled.remove(name)
            }
        };
        if changed {
            self.observers.notify();
        }
    }

    pub fn is_corpus_enabled(&self, name: &str) -> bool {
        self.registry.read().enabled.contains(name)
    }

    pub fn is_corpus_default_enabled(&self, name: &str) -> bool {
        self.corpus(name).map_or(false, |c| c.is_default_enabled())
    }

    /// Enabled corpora in registration order.
    pub fn enabled_corpora(&self) -> Vec<Arc<dyn Corpus>> {
        let reg = self.registry.read();
        reg.corpora
            .iter()
            .filter(|c| reg.enabled.contains(c.name()))
            .cloned()
            .collect()
    }

    pub fn register_observer(&self, callback: impl Fn() + Send + Sync + 'static) -> ObserverId {
        self.observers.register(callback)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
