//! CLI module for weblog-search
//!
//! Provides command-line access to:
//! - status: recover and report index state
//! - rebuild: rebuild from an entries file
//! - search: one-shot query
//! - reindex / remove: single-entry maintenance

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, CommonArgs};
pub use commands::{execute, rebuild, reindex, remove, run_command, search, status};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{print_json, write_json};

use crate::observability::init_logging;

/// Parse arguments, install logging and run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging();
    run_command(cli.command)
}
