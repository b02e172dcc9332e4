//! weblog-search CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`; prints any error to
//! stderr and exits with the error's status code.

use weblog_search::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(e.exit_status());
    }
}
