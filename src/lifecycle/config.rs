//! Lifecycle configuration
//!
//! Loaded from a JSON file. Every field is optional:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/rangedb",
//!   "retry": { "initial_backoff_us": 1, "max_backoff_ms": 10 },
//!   "fatal_policy": "abort",
//!   "log_level": "INFO"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event, Severity};
use crate::replica::{ReplicaError, ReplicaResult};

/// What the supervisor does with a fatal error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalPolicy {
    /// Log at FATAL and abort the process
    #[default]
    Abort,
    /// Log at FATAL and return the error to the caller
    Propagate,
}

/// Backoff between lookup-or-create attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
    #[serde(default = "default_initial_backoff_us")]
    pub initial_backoff_us: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Fraction of each delay randomized in either direction
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,

    /// Give up after this long; absent retries forever
    #[serde(default)]
    pub max_elapsed_ms: Option<u64>,
}

fn default_initial_backoff_us() -> u64 {
    1
}

fn default_max_backoff_ms() -> u64 {
    10
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_randomization_factor() -> f64 {
    0.15
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            initial_backoff_us: default_initial_backoff_us(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
            max_elapsed_ms: None,
        }
    }
}

impl RetryOptions {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_micros(self.initial_backoff_us)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> ReplicaResult<()> {
        if self.initial_backoff_us == 0 {
            return Err(ReplicaError::configuration(
                "retry.initial_backoff_us must be > 0",
            ));
        }
        if self.max_backoff() < self.initial_backoff() {
            return Err(ReplicaError::configuration(
                "retry.max_backoff_ms must not be below retry.initial_backoff_us",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ReplicaError::configuration(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.randomization_factor) {
            return Err(ReplicaError::configuration(format!(
                "retry.randomization_factor must be in [0, 1), got {}",
                self.randomization_factor
            )));
        }
        Ok(())
    }
}

/// Node-level lifecycle configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Engine directory; the CLI uses an in-memory engine when absent
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetryOptions,

    #[serde(default)]
    pub fatal_policy: FatalPolicy,

    #[serde(default)]
    pub log_level: Severity,
}

impl LifecycleConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> ReplicaResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReplicaError::configuration(format!("failed to read config: {}", e))
                .with_details(path.display().to_string())
        })?;
        let config = Self::from_json(&content)?;

        let path = path.display().to_string();
        let policy = format!("{:?}", config.fatal_policy).to_lowercase();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", &path), ("fatal_policy", &policy)],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> ReplicaResult<Self> {
        let config: LifecycleConfig = serde_json::from_str(content)
            .map_err(|e| ReplicaError::configuration(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReplicaResult<()> {
        self.retry.validate()?;
        if let Some(ref dir) = self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ReplicaError::configuration("data_dir must not be empty"));
            }
        }
        Ok(())
    }

    /// Configuration for tests and embedding: fatal errors are returned.
    pub fn propagating() -> Self {
        Self {
            fatal_policy: FatalPolicy::Propagate,
            ..Default::default()
        }
    }
}
