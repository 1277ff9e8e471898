//! Persisted range-local state
//!
//! Tombstones, raft hard state, replica-id markers and descriptors, keyed by
//! range id inside the engine.

mod keys;
mod loader;
mod records;

pub use keys::{
    decode_range_local_key, raft_hard_state_key, raft_replica_id_key, range_descriptor_key,
    range_id_prefix, range_tombstone_key, LocalKeyKind, LOCAL_RANGE_ID_PREFIX,
};
pub use loader::{scan_persisted_ranges, PersistedRange, StateLoader};
pub use records::{HardState, RaftReplicaId, RangeTombstone};
