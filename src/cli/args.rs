//! CLI argument definitions using clap
//!
//! Commands:
//! - weblog-search status --config <path> --entries <path>
//! - weblog-search rebuild [--owner <handle>]
//! - weblog-search search --query <text> [--owner <handle>] [--limit <n>]
//! - weblog-search reindex --entry-id <id> --owner <handle>
//! - weblog-search remove --entry-id <id> --owner <handle>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// weblog-search - Crash-safe full-text index for weblog entries
#[derive(Parser, Debug)]
#[command(name = "weblog-search")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(long, default_value = "./weblog-search.json")]
    pub config: PathBuf,

    /// JSON file holding the weblog entries
    #[arg(long, default_value = "./entries.json")]
    pub entries: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recover the index and report its state
    Status {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Rebuild the index from the entries file
    Rebuild {
        #[command(flatten)]
        common: CommonArgs,

        /// Rebuild only this weblog
        #[arg(long)]
        owner: Option<String>,
    },

    /// Run a query and print matching entries
    Search {
        #[command(flatten)]
        common: CommonArgs,

        /// Query text; every term must match
        #[arg(long)]
        query: String,

        /// Restrict to one weblog
        #[arg(long)]
        owner: Option<String>,

        /// Maximum hits to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Re-index one entry from the entries file
    Reindex {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        entry_id: String,

        #[arg(long)]
        owner: String,
    },

    /// Remove one entry from the index
    Remove {
        #[command(flatten)]
        common: CommonArgs,

        #[arg(long)]
        entry_id: String,

        #[arg(long)]
        owner: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
