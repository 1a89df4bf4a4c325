//! # QuickSearch Core
//!
//! Runtime-independent logic for QuickSearch: the suggestion model,
//! cursors, source and corpus traits, the per-query result aggregate,
//! promoters, the query strategy and the shortcut store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Scheduling, persistence and configuration
//! live in the `quicksearch` application crate.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`suggestion`] | [`Suggestion`](suggestion::Suggestion) rows and intent keys |
//! | [`cursor`] | Read-only cursors over rows |
//! | [`source`], [`corpus`] | Data providers and their results |
//! | [`suggestions`] | Live result aggregate for one query |
//! | [`shortcut_cursor`] | Refreshable shortcut rows |
//! | [`promoter`] | Policies that pick the displayed rows |
//! | [`should_query`] | Which corpora are worth querying |
//! | [`prefix`] | Prefix matching as a string range |
//! | [`store`] | Shortcut history storage |

pub mod corpus;
pub mod cursor;
pub mod observer;
pub mod params;
pub mod prefix;
pub mod promoter;
pub mod shortcut_cursor;
pub mod should_query;
pub mod source;
pub mod store;
pub mod suggestion;
pub mod suggestions;

#[cfg(test)]
mod testing;
