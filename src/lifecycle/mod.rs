//! Replica lifecycle coordination
//!
//! - `LifecycleCoordinator::get_or_create_replica`: the one way to obtain a
//!   `raft_mu`-locked replica for a (range, replica) pair
//! - `apply_snapshot` / `mark_initialized`: uninitialized -> initialized
//! - `remove_replica`: teardown and tombstones
//! - `open`: rebuild the directory at startup
//!
//! Fatal errors pass through the `Supervisor` before reaching callers.

mod config;
mod coordinator;
mod retry;
mod supervisor;
mod teardown;

pub use config::{FatalPolicy, LifecycleConfig, RetryOptions};
pub use coordinator::LifecycleCoordinator;
pub use retry::Retry;
pub use supervisor::Supervisor;
pub use teardown::RemoveOptions;
