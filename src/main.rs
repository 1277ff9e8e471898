//! rangedb CLI entry point
//!
//! Parses arguments, dispatches to the CLI module and exits non-zero on
//! failure. Failures are reported as a JSON error response on stdout and
//! as plain text on stderr.

use rangedb::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code(), &e.to_string());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
