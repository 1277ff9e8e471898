//! CLI argument definitions using clap
//!
//! Commands:
//! - rangedb ranges --data-dir <path>
//! - rangedb inspect --data-dir <path> --range <id>
//! - rangedb open --config <path>
//! - rangedb check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rangedb - replica lifecycle diagnostics
#[derive(Parser, Debug)]
#[command(name = "rangedb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every range with persisted state
    Ranges {
        /// Engine data directory
        #[arg(long)]
        data_dir: PathBuf,
    },

    /// Show the persisted records of one range
    Inspect {
        /// Engine data directory
        #[arg(long)]
        data_dir: PathBuf,

        /// Range id
        #[arg(long)]
        range: u64,
    },

    /// Open a node and print its replica directory
    Open {
        /// Path to configuration file
        #[arg(long, default_value = "./rangedb.json")]
        config: PathBuf,
    },

    /// Validate a configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./rangedb.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
