//! Tuning parameters for query dispatch and promotion, decoupled from
//! application config.

/// Knobs read by the promoters and the query strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestParams {
    /// Row limit passed to each source query.
    pub max_results_per_source: usize,
    /// Size of each follow-up query batch.
    pub num_promoted_sources: usize,
    /// Slots filled round-robin from the high-ranking corpora first.
    pub num_suggestions_above_keyboard: usize,
    /// Default upper bound on the promoted list.
    pub max_promoted: usize,
    /// Per-source cap on promoted shortcuts.
    pub max_shortcuts_per_source: usize,
    /// Per-source cap on promoted shortcuts for web suggestion sources.
    pub max_shortcuts_per_web_source: usize,
    /// Query corpora (and show results) for the empty query.
    pub show_suggestions_for_zero_query: bool,
    /// Include web-search shortcuts in shortcut lookups.
    pub allow_web_shortcuts: bool,
}

impl Default for SuggestParams {
    fn default() -> Self {
        Self {
            max_results_per_source: 50,
            num_promoted_sources: 4,
            num_suggestions_above_keyboard: 4,
            max_promoted: 10,
            max_shortcuts_per_source: 3,
            max_shortcuts_per_web_source: 3,
            show_suggestions_for_zero_query: false,
            allow_web_shortcuts: true,
        }
    }
}
