//! CLI error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::StorageError;
use crate::replica::ReplicaError;

/// CLI errors. Every one ends the command with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory not found: {}", .0.display())]
    DataDirMissing(PathBuf),

    #[error("range {0} not found")]
    RangeNotFound(u64),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Replica(ReplicaError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Stable code written in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "RANGEDB_CLI_CONFIG_ERROR",
            CliError::DataDirMissing(_) => "RANGEDB_CLI_DATA_DIR_MISSING",
            CliError::RangeNotFound(_) => "RANGEDB_CLI_RANGE_NOT_FOUND",
            CliError::Storage(e) => e.code().code(),
            CliError::Replica(e) => e.code(),
            CliError::Io(_) | CliError::Json(_) => "RANGEDB_CLI_IO_ERROR",
        }
    }
}

impl From<ReplicaError> for CliError {
    fn from(e: ReplicaError) -> Self {
        match e.kind() {
            crate::replica::ReplicaErrorKind::Configuration => CliError::Config(e.to_string()),
            _ => CliError::Replica(e),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
