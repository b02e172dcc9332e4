//! JSON output for the CLI
//!
//! Each command prints exactly one JSON object on stdout. Logs go to stderr.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

/// Write one JSON object followed by a newline
pub fn write_json<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write one JSON object to stdout
pub fn print_json(value: &Value) -> CliResult<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_json(&mut lock, value)
}
