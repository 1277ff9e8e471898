//! CLI module for rangedb
//!
//! Provides command-line interface for:
//! - ranges: List ranges with persisted state
//! - inspect: Dump the persisted records of one range
//! - open: Rebuild the replica directory and print it
//! - check-config: Validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, inspect, open, ranges, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
