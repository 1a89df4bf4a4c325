//! Core suggestion row type.
//!
//! A [`Suggestion`] is produced by a [`Source`](crate::source::Source) and
//! flows unchanged through corpus results, the promoted list, and the
//! persistent shortcut history. Rows are immutable once produced; cursors
//! hand them out as `Arc<Suggestion>` so that promotion and deduplication
//! never copy row data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shortcut id that marks a suggestion as "never make a shortcut".
///
/// Clicks on suggestions carrying this id are not recorded in the
/// shortcut history.
pub const NEVER_MAKE_SHORTCUT: &str = "_-1";

/// Intent action carried by web search suggestions.
pub const WEB_SEARCH_ACTION: &str = "action.WEB_SEARCH";

/// Intent action used by corpora that launch a regular search.
pub const SEARCH_ACTION: &str = "action.SEARCH";

/// Intent action used for voice search.
pub const VOICE_SEARCH_ACTION: &str = "action.VOICE_SEARCH";

/// One suggestion row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Suggestion {
    /// Name of the source that produced this row.
    pub source: String,
    /// Optional display format tag (e.g. `"html"`).
    pub format: Option<String>,
    /// Title line.
    pub text1: String,
    /// Description line.
    pub text2: Option<String>,
    /// URL shown instead of the description, if any.
    pub text2_url: Option<String>,
    /// Primary icon reference.
    pub icon1: Option<String>,
    /// Secondary icon reference.
    pub icon2: Option<String>,
    /// Stable id used to refresh the shortcut. `None` means the row is
    /// identified by its intent tuple instead.
    pub shortcut_id: Option<String>,
    /// Show a progress indicator while the shortcut is being refreshed.
    pub spinner_while_refreshing: bool,
    pub intent_action: Option<String>,
    pub intent_data: Option<String>,
    pub intent_component: Option<String>,
    pub intent_query: Option<String>,
    pub intent_extra_data: Option<String>,
    /// Free-form tag forwarded to click logging.
    pub log_type: Option<String>,
    /// Custom columns exposed by the source.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl Suggestion {
    /// Create a bare suggestion with only a source and title.
    pub fn new(source: impl Into<String>, text1: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text1: text1.into(),
            ..Default::default()
        }
    }

    pub fn with_text2(mut self, text2: impl Into<String>) -> Self {
        self.text2 = Some(text2.into());
        self
    }

    pub fn with_shortcut_id(mut self, id: impl Into<String>) -> Self {
        self.shortcut_id = Some(id.into());
        self
    }

    pub fn with_intent(mut self, action: impl Into<String>, data: Option<String>) -> Self {
        self.intent_action = Some(action.into());
        self.intent_data = data;
        self
    }

    pub fn with_intent_query(mut self, query: impl Into<String>) -> Self {
        self.intent_query = Some(query.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Whether this row launches a web search.
    pub fn is_web_search_suggestion(&self) -> bool {
        self.intent_action.as_deref() == Some(WEB_SEARCH_ACTION)
    }

    /// Whether a click on this row may be recorded as a shortcut.
    pub fn is_shortcut_allowed(&self) -> bool {
        self.shortcut_id.as_deref() != Some(NEVER_MAKE_SHORTCUT)
    }

    /// Key used to drop duplicate rows from a promoted list.
    ///
    /// Rows with a shortcut id compare by `(source, shortcut_id)`; all
    /// other rows compare by source and intent tuple.
    pub fn suggestion_key(&self) -> String {
        match self.shortcut_id.as_deref() {
            Some(id) if id != NEVER_MAKE_SHORTCUT => format!("{}#id#{}", self.source, id),
            _ => format!(
                "{}#{}#{}#{}",
                self.source,
                self.intent_action.as_deref().unwrap_or(""),
                self.intent_data.as_deref().unwrap_or(""),
                self.intent_query.as_deref().unwrap_or(""),
            ),
        }
    }
}

/// Composite identity of a shortcut: `source#data#action#component#query`.
///
/// Used as the primary key of the persistent shortcut table, so two
/// suggestions that launch the same thing collapse into one shortcut.
pub fn intent_key(s: &Suggestion) -> String {
    format!(
        "{}#{}#{}#{}#{}",
        s.source,
        s.intent_data.as_deref().unwrap_or(""),
        s.intent_action.as_deref().unwrap_or(""),
        s.intent_component.as_deref().unwrap_or(""),
        s.intent_query.as_deref().unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_key_layout() {
        let s = Suggestion::new("apps", "Calculator")
            .with_intent("action.VIEW", Some("app://calc".to_string()))
            .with_intent_query("calc");
        assert_eq!(intent_key(&s), "apps#app://calc#action.VIEW##calc");
    }

    #[test]
    fn test_suggestion_key_prefers_shortcut_id() {
        let a = Suggestion::new("apps", "A")
            .with_shortcut_id("42")
            .with_intent("action.VIEW", Some("x".into()));
        let b = Suggestion::new("apps", "B")
            .with_shortcut_id("42")
            .with_intent("action.VIEW", Some("y".into()));
        assert_eq!(a.suggestion_key(), b.suggestion_key());
    }

    #[test]
    fn test_suggestion_key_falls_back_to_intent() {
        let a = Suggestion::new("web", "A").with_intent(WEB_SEARCH_ACTION, None).with_intent_query("q");
        let b = Suggestion::new("web", "B").with_intent(WEB_SEARCH_ACTION, None).with_intent_query("q");
        let c = Suggestion::new("web", "C").with_intent(WEB_SEARCH_ACTION, None).with_intent_query("r");
        assert_eq!(a.suggestion_key(), b.suggestion_key());
        assert_ne!(a.suggestion_key(), c.suggestion_key());
    }

    #[test]
    fn test_never_shortcut_sentinel() {
        let s = Suggestion::new("apps", "A").with_shortcut_id(NEVER_MAKE_SHORTCUT);
        assert!(!s.is_shortcut_allowed());
        assert!(Suggestion::new("apps", "B").is_shortcut_allowed());
    }
}
