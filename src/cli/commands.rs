//! CLI command implementations
//!
//! `ranges` and `inspect` read persisted state without building a
//! directory. `open` runs the full startup path and reports what it
//! rebuilt. Every command writes exactly one JSON response.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::descriptor::RangeId;
use crate::engine::{Engine, FileEngine, MemEngine};
use crate::lifecycle::{LifecycleConfig, LifecycleCoordinator};
use crate::observability::Logger;
use crate::state::{scan_persisted_ranges, StateLoader};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Ranges { data_dir } => ranges(&data_dir)?,
        Command::Inspect { data_dir, range } => inspect(&data_dir, RangeId(range))?,
        Command::Open { config } => open(&config)?,
        Command::CheckConfig { config } => check_config(&config)?,
    };
    write_response(data)
}

/// Every range with persisted records, in range id order.
pub fn ranges(data_dir: &Path) -> CliResult<Value> {
    let engine = open_existing(data_dir)?;
    let rows: Vec<Value> = scan_persisted_ranges(&engine)?
        .into_iter()
        .map(|(range_id, persisted)| {
            json!({
                "range_id": range_id,
                "replica_id": persisted.replica_id,
                "initialized": persisted.descriptor.is_some(),
                "tombstone": persisted.tombstone.map(|t| t.next_replica_id),
            })
        })
        .collect();
    Ok(json!(rows))
}

/// The persisted records of one range.
pub fn inspect(data_dir: &Path, range_id: RangeId) -> CliResult<Value> {
    let engine = open_existing(data_dir)?;
    let loader = StateLoader::new(range_id);
    let tombstone = loader.load_tombstone(&engine)?;
    let replica_id = loader.load_raft_replica_id(&engine)?;
    let descriptor = loader.load_descriptor(&engine)?;
    if tombstone.is_none() && replica_id.is_none() && descriptor.is_none() {
        return Err(CliError::RangeNotFound(range_id.get()));
    }
    let hard_state = loader.load_hard_state(&engine)?;
    Ok(json!({
        "range_id": range_id,
        "tombstone": tombstone,
        "replica_id": replica_id,
        "hard_state": hard_state,
        "descriptor": descriptor,
    }))
}

/// Rebuild the replica directory from a data directory and report it.
///
/// Without a `data_dir` the node starts empty on an in-memory engine.
pub fn open(config_path: &Path) -> CliResult<Value> {
    let config = LifecycleConfig::load(config_path)?;
    Logger::set_min_severity(config.log_level);

    let engine: Arc<dyn Engine> = match config.data_dir {
        Some(ref dir) => Arc::new(FileEngine::open(dir)?),
        None => Arc::new(MemEngine::new()),
    };
    let coordinator = LifecycleCoordinator::open(engine, config)?;

    Ok(json!({
        "directory": coordinator.directory().summary(),
        "metrics": coordinator.metrics().snapshot(),
    }))
}

/// Parse and validate a configuration file.
pub fn check_config(config_path: &Path) -> CliResult<Value> {
    let config = LifecycleConfig::load(config_path)?;
    Ok(serde_json::to_value(&config)?)
}

fn open_existing(data_dir: &Path) -> CliResult<FileEngine> {
    // FileEngine::open creates missing directories; a typo must not do that.
    if !data_dir.is_dir() {
        return Err(CliError::DataDirMissing(data_dir.to_path_buf()));
    }
    Ok(FileEngine::open(data_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{NodeId, RangeDescriptor, ReplicaDescriptor, ReplicaId, StoreId};
    use std::fs;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("rangedb.json");
        let data_dir = temp_dir.path().join("data");

        let config = json!({
            "data_dir": data_dir.to_string_lossy(),
            "fatal_policy": "propagate",
            "log_level": "ERROR"
        });

        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    fn seed(data_dir: &Path) {
        let engine = FileEngine::open(data_dir).unwrap();

        let initialized = StateLoader::new(RangeId(1));
        initialized
            .set_raft_replica_id(&engine, ReplicaId(1))
            .unwrap();
        initialized
            .set_descriptor(
                &engine,
                &RangeDescriptor::new(
                    RangeId(1),
                    b"a".to_vec(),
                    b"m".to_vec(),
                    vec![ReplicaDescriptor::new(NodeId(1), StoreId(1), ReplicaId(1))],
                    ReplicaId(2),
                ),
            )
            .unwrap();

        let uninitialized = StateLoader::new(RangeId(2));
        uninitialized
            .set_raft_replica_id(&engine, ReplicaId(3))
            .unwrap();

        StateLoader::new(RangeId(3))
            .set_tombstone(&engine, ReplicaId(5))
            .unwrap();
    }

    // =========================================================================
    // ranges / inspect
    // =========================================================================

    #[test]
    fn test_ranges_lists_persisted_ranges() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        seed(&data_dir);

        let rows = ranges(&data_dir).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["range_id"], 1);
        assert_eq!(rows[0]["initialized"], true);
        assert_eq!(rows[1]["replica_id"], 3);
        assert_eq!(rows[1]["initialized"], false);
        assert_eq!(rows[2]["tombstone"], 5);
    }

    #[test]
    fn test_ranges_requires_existing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = ranges(&missing).unwrap_err();
        assert_eq!(err.code(), "RANGEDB_CLI_DATA_DIR_MISSING");
        assert!(!missing.exists());
    }

    #[test]
    fn test_inspect_range() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        seed(&data_dir);

        let report = inspect(&data_dir, RangeId(1)).unwrap();
        assert_eq!(report["replica_id"], 1);
        assert_eq!(report["descriptor"]["next_replica_id"], 2);
        assert_eq!(report["hard_state"]["commit"], 0);
        assert!(report["tombstone"].is_null());
    }

    #[test]
    fn test_inspect_unknown_range() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        seed(&data_dir);

        let err = inspect(&data_dir, RangeId(42)).unwrap_err();
        assert_eq!(err.code(), "RANGEDB_CLI_RANGE_NOT_FOUND");
    }

    // =========================================================================
    // open / check-config
    // =========================================================================

    #[test]
    fn test_open_rebuilds_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        seed(&temp_dir.path().join("data"));

        let report = open(&config_path).unwrap();
        let directory = &report["directory"];
        assert_eq!(directory["replicas"], 2);
        assert_eq!(directory["uninitialized"], 1);
        assert_eq!(directory["key_index"].as_array().unwrap().len(), 1);
        assert_eq!(report["metrics"]["replica_count"], 1);
        assert_eq!(report["metrics"]["uninitialized_count"], 1);
    }

    #[test]
    fn test_open_without_data_dir_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rangedb.json");
        fs::write(&config_path, r#"{"fatal_policy": "propagate"}"#).unwrap();

        let report = open(&config_path).unwrap();
        assert_eq!(report["directory"]["replicas"], 0);
    }

    #[test]
    fn test_check_config_rejects_bad_retry() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rangedb.json");
        fs::write(
            &config_path,
            r#"{"retry": {"randomization_factor": 1.5}}"#,
        )
        .unwrap();

        let err = check_config(&config_path).unwrap_err();
        assert_eq!(err.code(), "RANGEDB_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_check_config_echoes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rangedb.json");
        fs::write(&config_path, "{}").unwrap();

        let config = check_config(&config_path).unwrap();
        assert_eq!(config["fatal_policy"], "abort");
        assert_eq!(config["retry"]["multiplier"], 2.0);
    }
}
