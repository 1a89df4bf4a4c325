//! Promoters: policies that pick the bounded list of rows shown for a query.
//!
//! A promoter reads the shortcuts and corpus results of a [`Suggestions`]
//! aggregate and appends rows to an output [`ListSuggestionCursor`]. Promoters
//! chain: each one fills what it can and hands the remaining slots to the
//! next. An optional [`SuggestionFilter`] restricts which rows a promoter may
//! take.
//!
//! | Promoter | Picks |
//! |----------|-------|
//! | [`ShortcutPromoter`] | Shortcuts, capped per source |
//! | [`RankAwarePromoter`] | Corpus results, striped round-robin, default-enabled corpora first |
//! | [`SingleCorpusPromoter`] | Shortcuts then results of one corpus |
//! | [`SingleCorpusResultsPromoter`] | Same, without web search rows |
//! | [`WebPromoter`] | Web search shortcuts then web results |
//!
//! `max_promoted` is a hard bound on the output size. The output list may
//! reject a row as a duplicate; rejected rows never count against a budget.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::corpus::{corpus_contains_source, CorpusResult};
use crate::cursor::{ListSuggestionCursor, SuggestionCursor};
use crate::params::SuggestParams;
use crate::suggestion::Suggestion;
use crate::suggestions::Suggestions;

/// Picks rows for display.
pub trait Promoter: Send + Sync {
    /// Append at most `max_promoted - promoted.count()` rows to `promoted`.
    fn pick_promoted(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    );
}

/// Predicate restricting the rows a promoter may take.
pub trait SuggestionFilter: Send + Sync {
    fn accept(&self, suggestion: &Suggestion) -> bool;
}

impl<F> SuggestionFilter for F
where
    F: Fn(&Suggestion) -> bool + Send + Sync,
{
    fn accept(&self, suggestion: &Suggestion) -> bool {
        self(suggestion)
    }
}

/// Accepts web search rows only.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSearchFilter;

impl SuggestionFilter for WebSearchFilter {
    fn accept(&self, suggestion: &Suggestion) -> bool {
        suggestion.is_web_search_suggestion()
    }
}

/// Rejects web search rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonWebSearchFilter;

impl SuggestionFilter for NonWebSearchFilter {
    fn accept(&self, suggestion: &Suggestion) -> bool {
        !suggestion.is_web_search_suggestion()
    }
}

/// Filter and successor shared by every promoter.
#[derive(Default)]
struct Chain {
    filter: Option<Arc<dyn SuggestionFilter>>,
    next: Option<Box<dyn Promoter>>,
}

impl Chain {
    fn accept(&self, suggestion: &Suggestion) -> bool {
        self.filter.as_ref().map_or(true, |f| f.accept(suggestion))
    }

    /// Offer one row. Returns whether it filled a slot.
    fn offer(&self, suggestion: Arc<Suggestion>, promoted: &mut ListSuggestionCursor) -> bool {
        self.accept(&suggestion) && promoted.add(suggestion)
    }

    fn pick_next(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        if let Some(next) = &self.next {
            if promoted.count() < max_promoted {
                next.pick_promoted(suggestions, max_promoted, promoted);
            }
        }
    }
}

macro_rules! chain_builders {
    ($ty:ty) => {
        impl $ty {
            /// Only take rows accepted by `filter`.
            pub fn with_filter(mut self, filter: Arc<dyn SuggestionFilter>) -> Self {
                self.chain.filter = Some(filter);
                self
            }

            /// Hand remaining slots to `next`.
            pub fn with_next(mut self, next: Box<dyn Promoter>) -> Self {
                self.chain.next = Some(next);
                self
            }
        }
    };
}

fn slots_left(promoted: &ListSuggestionCursor, max_promoted: usize) -> usize {
    max_promoted.saturating_sub(promoted.count())
}

/// Promotes shortcuts, at most [`Source::max_shortcuts`] per source.
///
/// [`Source::max_shortcuts`]: crate::source::Source::max_shortcuts
pub struct ShortcutPromoter {
    params: SuggestParams,
    chain: Chain,
}

chain_builders!(ShortcutPromoter);

impl ShortcutPromoter {
    pub fn new(params: SuggestParams) -> Self {
        Self {
            params,
            chain: Chain::default(),
        }
    }
}

impl Promoter for ShortcutPromoter {
    fn pick_promoted(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        if let Some(shortcuts) = suggestions.shortcuts() {
            let mut per_source: HashMap<String, usize> = HashMap::new();
            for suggestion in shortcuts.suggestions() {
                if promoted.count() >= max_promoted {
                    break;
                }
                let Some(source) = suggestions.source(&suggestion.source) else {
                    continue;
                };
                let taken = per_source.get(&suggestion.source).copied().unwrap_or(0);
                if taken >= source.max_shortcuts(&self.params) {
                    continue;
                }
                let name = suggestion.source.clone();
                if self.chain.offer(suggestion, promoted) {
                    per_source.insert(name, taken + 1);
                }
            }
        }
        self.chain.pick_next(suggestions, max_promoted, promoted);
    }
}

/// One corpus result and the next row to consider from it.
struct Stripe {
    result: Arc<CorpusResult>,
    position: usize,
}

impl Stripe {
    fn has_more(&self) -> bool {
        self.position < self.result.count()
    }
}

/// Round-robin over corpus results, default-enabled corpora first.
///
/// The slots above the keyboard are split evenly across the default-enabled
/// corpora. Remaining slots go round-robin to the rest of the
/// default-enabled rows, then to the other corpora.
pub struct RankAwarePromoter {
    params: SuggestParams,
    chain: Chain,
}

chain_builders!(RankAwarePromoter);

impl RankAwarePromoter {
    pub fn new(params: SuggestParams) -> Self {
        Self {
            params,
            chain: Chain::default(),
        }
    }

    fn promote_top(
        &self,
        stripes: &mut VecDeque<Stripe>,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        let left = slots_left(promoted, max_promoted);
        if left == 0 || stripes.is_empty() {
            return;
        }
        let to_fill = self
            .params
            .num_suggestions_above_keyboard
            .saturating_sub(promoted.count())
            .min(left);
        if to_fill == 0 {
            return;
        }
        let stripe = (to_fill / stripes.len()).max(1);
        self.round_robin(stripes, to_fill, stripe, promoted);
    }

    fn promote_equally(
        &self,
        stripes: &mut VecDeque<Stripe>,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        let left = slots_left(promoted, max_promoted);
        if left == 0 || stripes.is_empty() {
            return;
        }
        let stripe = (left / stripes.len()).max(1);
        self.round_robin(stripes, left, stripe, promoted);
        let left = slots_left(promoted, max_promoted);
        if left > 0 {
            self.round_robin(stripes, left, left, promoted);
        }
    }

    /// Take up to `stripe` rows from each corpus in turn until `max_to_add`
    /// rows were added or every corpus is exhausted.
    fn round_robin(
        &self,
        stripes: &mut VecDeque<Stripe>,
        max_to_add: usize,
        stripe: usize,
        promoted: &mut ListSuggestionCursor,
    ) -> usize {
        let mut added = 0;
        while added < max_to_add {
            let Some(mut entry) = stripes.pop_front() else {
                break;
            };
            added += self.promote(&mut entry, stripe.min(max_to_add - added), promoted);
            if entry.has_more() {
                stripes.push_back(entry);
            }
        }
        added
    }

    fn promote(&self, entry: &mut Stripe, max_to_add: usize, promoted: &mut ListSuggestionCursor) -> usize {
        let mut added = 0;
        while added < max_to_add && entry.has_more() {
            if let Some(suggestion) = entry.result.suggestion(entry.position) {
                if self.chain.offer(suggestion, promoted) {
                    added += 1;
                }
            }
            entry.position += 1;
        }
        added
    }
}

impl Promoter for RankAwarePromoter {
    fn pick_promoted(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        let mut high = VecDeque::new();
        let mut low = VecDeque::new();
        for result in suggestions.corpus_results() {
            if result.is_empty() {
                continue;
            }
            let default_enabled = result.corpus().is_default_enabled();
            let stripe = Stripe { result, position: 0 };
            if default_enabled {
                high.push_back(stripe);
            } else {
                low.push_back(stripe);
            }
        }
        self.promote_top(&mut high, max_promoted, promoted);
        self.promote_equally(&mut high, max_promoted, promoted);
        self.promote_equally(&mut low, max_promoted, promoted);
        self.chain.pick_next(suggestions, max_promoted, promoted);
    }
}

/// Shortcuts and results of a single corpus, for focused display.
pub struct SingleCorpusPromoter {
    corpus: String,
    max_shortcuts: usize,
    chain: Chain,
}

chain_builders!(SingleCorpusPromoter);

impl SingleCorpusPromoter {
    pub fn new(corpus: impl Into<String>, max_shortcuts: usize) -> Self {
        Self {
            corpus: corpus.into(),
            max_shortcuts,
            chain: Chain::default(),
        }
    }
}

impl Promoter for SingleCorpusPromoter {
    fn pick_promoted(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        let corpus = suggestions
            .expected_corpora()
            .iter()
            .find(|c| c.name() == self.corpus);
        if let (Some(corpus), Some(shortcuts)) = (corpus, suggestions.shortcuts()) {
            let limit = self.max_shortcuts.min(max_promoted);
            for suggestion in shortcuts.suggestions() {
                if promoted.count() >= limit {
                    break;
                }
                if corpus_contains_source(corpus.as_ref(), &suggestion.source) {
                    self.chain.offer(suggestion, promoted);
                }
            }
        }
        if let Some(result) = suggestions.corpus_result(&self.corpus) {
            for suggestion in result.suggestions() {
                if promoted.count() >= max_promoted {
                    break;
                }
                self.chain.offer(suggestion, promoted);
            }
        }
        self.chain.pick_next(suggestions, max_promoted, promoted);
    }
}

/// [`SingleCorpusPromoter`] that leaves out web search rows.
pub struct SingleCorpusResultsPromoter {
    inner: SingleCorpusPromoter,
}

impl SingleCorpusResultsPromoter {
    pub fn new(corpus: impl Into<String>, max_shortcuts: usize) -> Self {
        Self {
            inner: SingleCorpusPromoter::new(corpus, max_shortcuts)
                .with_filter(Arc::new(NonWebSearchFilter)),
        }
    }

    pub fn with_next(mut self, next: Box<dyn Promoter>) -> Self {
        self.inner = self.inner.with_next(next);
        self
    }
}

impl Promoter for SingleCorpusResultsPromoter {
    fn pick_promoted(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        self.inner.pick_promoted(suggestions, max_promoted, promoted);
    }
}

/// Web search shortcuts first, then web results. Non-web rows are never
/// taken.
pub struct WebPromoter {
    max_shortcuts: usize,
    chain: Chain,
}

chain_builders!(WebPromoter);

impl WebPromoter {
    pub fn new(max_shortcuts: usize) -> Self {
        Self {
            max_shortcuts,
            chain: Chain::default(),
        }
    }

    fn offer(&self, suggestion: Arc<Suggestion>, promoted: &mut ListSuggestionCursor) -> bool {
        suggestion.is_web_search_suggestion() && self.chain.offer(suggestion, promoted)
    }
}

impl Promoter for WebPromoter {
    fn pick_promoted(
        &self,
        suggestions: &Suggestions,
        max_promoted: usize,
        promoted: &mut ListSuggestionCursor,
    ) {
        if let Some(shortcuts) = suggestions.shortcuts() {
            let limit = self.max_shortcuts.min(max_promoted);
            for suggestion in shortcuts.suggestions() {
                if promoted.count() >= limit {
                    break;
                }
                self.offer(suggestion, promoted);
            }
        }
        if let Some(result) = suggestions.web_result() {
            for suggestion in result.suggestions() {
                if promoted.count() >= max_promoted {
                    break;
                }
                self.offer(suggestion, promoted);
            }
        }
        self.chain.pick_next(suggestions, max_promoted, promoted);
    }
}

/// Shortcuts, then rank-aware corpus results.
pub fn default_promoter(params: &SuggestParams) -> Box<dyn Promoter> {
    Box::new(
        ShortcutPromoter::new(params.clone())
            .with_next(Box::new(RankAwarePromoter::new(params.clone()))),
    )
}
