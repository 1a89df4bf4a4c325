//! # QuickSearch CLI (`qsb`)
//!
//! The `qsb` binary drives the suggestion pipeline from the command line:
//! it runs queries against the configured sources, records clicks and
//! inspects the shortcut history.
//!
//! ## Usage
//!
//! ```bash
//! qsb --config ./config/qsb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qsb init` | Create the SQLite database and run schema migrations |
//! | `qsb corpora` | List corpora in ranked order with click counts |
//! | `qsb suggest "<query>"` | Query all enabled corpora and print the promoted list |
//! | `qsb click "<query>" <source> <row>` | Record a click on a row |
//! | `qsb shortcuts "<query>"` | Print stored shortcuts for a query prefix |
//! | `qsb forget <intent-key>` | Remove one shortcut from the history |
//! | `qsb clear-history` | Remove every shortcut and click |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use quicksearch::{commands, config};

/// QuickSearch CLI: suggestion aggregation with click-history shortcuts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/qsb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "qsb",
    about = "QuickSearch: fan a query out to many sources and rank what comes back",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qsb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the history database.
    ///
    /// Idempotent. A database written by an older schema version is
    /// dropped and recreated.
    Init,

    /// List corpora in "search everything" order.
    Corpora,

    /// Run a query and print the promoted suggestions.
    Suggest {
        /// The query text. May be empty.
        query: String,

        /// Query only this corpus.
        #[arg(long)]
        corpus: Option<String>,

        /// Maximum number of promoted rows.
        #[arg(long)]
        max: Option<usize>,

        /// Show web search rows only.
        #[arg(long)]
        web: bool,
    },

    /// Record a click on a row.
    ///
    /// The row is looked up by shortcut id or title among the rows
    /// `source` returns for `query`.
    Click {
        query: String,
        source: String,
        /// Shortcut id or title of the clicked row.
        row: String,
    },

    /// Print the shortcuts stored for a query prefix.
    Shortcuts {
        /// Query prefix. Empty lists the whole history.
        #[arg(default_value = "")]
        query: String,
    },

    /// Remove one shortcut and its clicks.
    Forget {
        /// Intent key as printed by `suggest` or `shortcuts`.
        intent_key: String,
    },

    /// Remove every shortcut and click.
    ClearHistory,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Corpora => {
            commands::list_corpora(&cfg).await?;
        }
        Commands::Suggest {
            query,
            corpus,
            max,
            web,
        } => {
            commands::run_suggest(&cfg, &query, corpus, max, web).await?;
        }
        Commands::Click { query, source, row } => {
            commands::run_click(&cfg, &query, &source, &row).await?;
        }
        Commands::Shortcuts { query } => {
            commands::run_shortcuts(&cfg, &query).await?;
        }
        Commands::Forget { intent_key } => {
            commands::run_forget(&cfg, &intent_key).await?;
        }
        Commands::ClearHistory => {
            commands::run_clear_history(&cfg).await?;
        }
    }

    Ok(())
}
