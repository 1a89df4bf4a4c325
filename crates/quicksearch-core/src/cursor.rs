//! Suggestion cursors.
//!
//! A cursor is an indexable, read-only sequence of [`Suggestion`] rows
//! produced for one user query. Reading never mutates the cursor, so any
//! number of readers may walk the same cursor concurrently; promoters keep
//! their own read positions.
//!
//! | Type | Role |
//! |------|------|
//! | [`SuggestionCursor`] | Trait implemented by every cursor |
//! | [`ListSuggestionCursor`] | Owned list, optionally rejecting duplicate rows |
//! | [`SuggestionPosition`] | Lightweight `(cursor, index)` reference |
//!
//! Resources behind a cursor are released when its last owner drops it.

use std::collections::HashSet;
use std::sync::Arc;

use crate::suggestion::Suggestion;

/// Read-only, random-access view over the suggestions for one query.
pub trait SuggestionCursor: Send + Sync {
    /// The query this cursor answers.
    fn user_query(&self) -> &str;

    /// Number of rows.
    fn count(&self) -> usize;

    /// Row at `position`, or `None` when out of range.
    fn suggestion(&self, position: usize) -> Option<Arc<Suggestion>>;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// All rows in order.
    fn suggestions(&self) -> Vec<Arc<Suggestion>> {
        (0..self.count()).filter_map(|i| self.suggestion(i)).collect()
    }
}

/// A `(cursor, index)` pair pointing at one row without owning it.
#[derive(Clone)]
pub struct SuggestionPosition {
    cursor: Arc<dyn SuggestionCursor>,
    position: usize,
}

impl SuggestionPosition {
    pub fn new(cursor: Arc<dyn SuggestionCursor>, position: usize) -> Self {
        Self { cursor, position }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn cursor(&self) -> &Arc<dyn SuggestionCursor> {
        &self.cursor
    }

    /// The referenced row, if still in range.
    pub fn suggestion(&self) -> Option<Arc<Suggestion>> {
        self.cursor.suggestion(self.position)
    }
}

impl std::fmt::Debug for SuggestionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionPosition")
            .field("query", &self.cursor.user_query())
            .field("position", &self.position)
            .finish()
    }
}

/// A cursor that owns a concrete ordered list of rows.
///
/// Built by copying rows out of other cursors. The no-duplicates variant
/// silently rejects rows whose [`Suggestion::suggestion_key`] is already
/// present; [`add`](ListSuggestionCursor::add) reports whether the row was
/// taken.
#[derive(Debug, Clone, Default)]
pub struct ListSuggestionCursor {
    user_query: String,
    rows: Vec<Arc<Suggestion>>,
    seen: Option<HashSet<String>>,
}

impl ListSuggestionCursor {
    /// A list that accepts every row.
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            rows: Vec::new(),
            seen: None,
        }
    }

    /// A list that rejects rows already present.
    pub fn no_duplicates(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            rows: Vec::new(),
            seen: Some(HashSet::new()),
        }
    }

    /// Build a plain list from existing rows.
    pub fn from_rows(user_query: impl Into<String>, rows: Vec<Arc<Suggestion>>) -> Self {
        Self {
            user_query: user_query.into(),
            rows,
            seen: None,
        }
    }

    /// Append a row. Returns `false` if it was rejected as a duplicate.
    pub fn add(&mut self, suggestion: Arc<Suggestion>) -> bool {
        if let Some(seen) = self.seen.as_mut() {
            if !seen.insert(suggestion.suggestion_key()) {
                return false;
            }
        }
        self.rows.push(suggestion);
        true
    }

    /// Append the row a position refers to.
    pub fn add_position(&mut self, position: &SuggestionPosition) -> bool {
        match position.suggestion() {
            Some(s) => self.add(s),
            None => false,
        }
    }

    /// Whether an equal row (by dedup key) is already present.
    pub fn contains(&self, suggestion: &Suggestion) -> bool {
        let key = suggestion.suggestion_key();
        match &self.seen {
            Some(seen) => seen.contains(&key),
            None => self.rows.iter().any(|r| r.suggestion_key() == key),
        }
    }

    pub fn rows(&self) -> &[Arc<Suggestion>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Arc<Suggestion>> {
        self.rows
    }
}

impl SuggestionCursor for ListSuggestionCursor {
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
