//! # QuickSearch
//!
//! Suggestion aggregation for a search box: one query fans out to many
//! independently failing corpora under a deadline, their results are
//! merged into a bounded promoted list, and a click history turns past
//! choices into shortcuts that are revalidated in the background.
//!
//! The pure pipeline pieces (suggestion model, cursors, promoters, query
//! strategy, storage trait) live in [`quicksearch_core`]. This crate adds
//! the runtime around them.
//!
//! ## Architecture
//!
//! ```text
//!  query ──▶ SuggestionsProvider ──▶ BatchingTaskExecutor ──▶ Corpus ──▶ Source
//!                 │                                             │
//!                 │                       CorpusResult ◀────────┘
//!                 ▼                            │
//!            PublishQueue ◀────────────────────┘
//!                 │
//!                 ▼
//!            Suggestions ◀── ShortcutCursor ◀── ShortcutRepository ◀── SQLite
//!                 │                 ▲
//!                 ▼                 └── ShortcutRefresher
//!            Promoter chain ──▶ promoted list
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qsb init                       # create the history database
//! qsb suggest "ma"               # run a query and print the promoted list
//! qsb click "ma" apps maps       # record a click
//! qsb shortcuts "m"              # shortcuts for a prefix
//! qsb corpora                    # ranked corpora with click counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite shortcut store |
//! | [`shortcut_repository`] | Click history with a serialized writer |
//! | [`refresher`] | Background shortcut revalidation |
//! | [`static_source`] | Sources defined in the config file |
//! | [`corpus`] | Single-source, multi-source and web corpora |
//! | [`corpora`] | Corpus registry and enabled set |
//! | [`executor`] | Bounded and batching task executors |
//! | [`publish`] | Single-task publish queue |
//! | [`provider`] | Query fan-out and incremental publication |
//! | [`ranker`] | Corpus ordering by click score |
//! | [`commands`] | `qsb` command implementations |

pub mod commands;
pub mod config;
pub mod corpora;
pub mod corpus;
pub mod db;
pub mod executor;
pub mod migrate;
pub mod provider;
pub mod publish;
pub mod ranker;
pub mod refresher;
pub mod shortcut_repository;
pub mod sqlite_store;
pub mod static_source;
