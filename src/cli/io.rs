//! JSON output for CLI commands
//!
//! - Success: `{"status": "ok", "data": ...}`
//! - Failure: `{"status": "error", "code": ..., "message": ...}`
//! - One object per line on stdout

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

/// Wrap command output in a success envelope.
pub fn response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Build an error envelope.
pub fn error_response(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&response(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&error_response(code, message))
}

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelopes() {
        assert_eq!(response(json!([1])), json!({"status": "ok", "data": [1]}));
        assert_eq!(
            error_response("RANGEDB_CLI_IO_ERROR", "boom")["code"],
            "RANGEDB_CLI_IO_ERROR"
        );
    }
}
