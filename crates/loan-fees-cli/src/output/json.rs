use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print a command result to stdout, one document per run.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_json(&mut out, value) {
        eprintln!("JSON output error: {e}");
    }
}

fn write_json<W: Write>(out: &mut W, value: &Value) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}
