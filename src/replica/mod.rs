//! Replica handles
//!
//! - `Replica`: identity, descriptor, destroy status and the three locks
//! - `LockedReplica`: a handle whose `raft_mu` the holder owns
//! - `ReplicaError`: caller-visible and fatal lifecycle errors

mod destroy;
mod errors;
mod handle;
mod locked;

pub use destroy::{DestroyReason, DestroyStatus};
pub use errors::{ReplicaError, ReplicaErrorKind, ReplicaResult};
pub use handle::{RaftMuState, Replica, ReplicaState};
pub use locked::{LockedReplica, ReplicaStateGuard};
