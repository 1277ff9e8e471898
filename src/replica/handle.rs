//! In-memory replica handle
//!
//! Three locks, always acquired in this order:
//! 1. `raft_mu`: raft processing and log application; owned by the caller
//!    that obtained the replica through the lifecycle coordinator
//! 2. `read_only_mu`: read-only command serving vs. state transitions
//! 3. `state_mu`: descriptor, destroy status, quiescence
//!
//! Taking `state_mu` alone is always safe. Any path that needs two of them
//! takes them top to bottom; `LockedReplica` is the only way to reach
//! `raft_mu`.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::descriptor::{KeySpan, RangeDescriptor, RangeId, ReplicaId};
use crate::state::{HardState, StateLoader};

use super::destroy::DestroyStatus;

/// State guarded by `raft_mu`.
#[derive(Debug, Default)]
pub struct RaftMuState {
    pub hard_state: HardState,
}

/// State guarded by `state_mu`.
#[derive(Debug)]
pub struct ReplicaState {
    /// Absent until the replica is initialized by a snapshot or at startup
    pub desc: Option<RangeDescriptor>,
    pub destroy_status: DestroyStatus,
    quiesced: bool,
    campaign_requested: bool,
}

impl ReplicaState {
    fn new(desc: Option<RangeDescriptor>) -> Self {
        Self {
            desc,
            destroy_status: DestroyStatus::Alive,
            quiesced: true,
            campaign_requested: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.desc.is_some()
    }

    pub fn is_quiesced(&self) -> bool {
        self.quiesced
    }

    pub fn campaign_requested(&self) -> bool {
        self.campaign_requested
    }

    /// Resume ticking. Returns false if the replica has nothing to tick.
    pub fn maybe_unquiesce(&mut self, campaign_on_wake: bool) -> bool {
        if !self.is_initialized() || !self.destroy_status.is_alive() {
            return false;
        }
        self.quiesced = false;
        self.campaign_requested |= campaign_on_wake;
        true
    }
}

/// One replica of one range hosted on this node.
pub struct Replica {
    range_id: RangeId,
    replica_id: ReplicaId,
    pub(super) raft_mu: Arc<Mutex<RaftMuState>>,
    pub(super) read_only_mu: RwLock<()>,
    pub(super) state_mu: RwLock<ReplicaState>,
}

impl Replica {
    /// A fresh handle with no descriptor.
    pub(crate) fn new_uninitialized(range_id: RangeId, replica_id: ReplicaId) -> Arc<Self> {
        Self::with_state(range_id, replica_id, RaftMuState::default(), None)
    }

    /// A handle rebuilt from persisted state at startup.
    pub(crate) fn from_persisted(
        range_id: RangeId,
        replica_id: ReplicaId,
        hard_state: HardState,
        desc: Option<RangeDescriptor>,
    ) -> Arc<Self> {
        Self::with_state(range_id, replica_id, RaftMuState { hard_state }, desc)
    }

    fn with_state(
        range_id: RangeId,
        replica_id: ReplicaId,
        raft: RaftMuState,
        desc: Option<RangeDescriptor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            range_id,
            replica_id,
            raft_mu: Arc::new(Mutex::new(raft)),
            read_only_mu: RwLock::new(()),
            state_mu: RwLock::new(ReplicaState::new(desc)),
        })
    }

    pub fn range_id(&self) -> RangeId {
        self.range_id
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    pub fn loader(&self) -> StateLoader {
        StateLoader::new(self.range_id)
    }

    pub fn desc(&self) -> Option<RangeDescriptor> {
        self.state_mu.read().desc.clone()
    }

    pub fn span(&self) -> Option<KeySpan> {
        self.state_mu.read().desc.as_ref().and_then(|d| d.span())
    }

    pub fn is_initialized(&self) -> bool {
        self.state_mu.read().is_initialized()
    }

    pub fn destroy_status(&self) -> DestroyStatus {
        self.state_mu.read().destroy_status
    }

    pub fn is_quiesced(&self) -> bool {
        self.state_mu.read().is_quiesced()
    }

    /// Inspect the `state_mu` fields without any other lock.
    pub fn read_state(&self) -> RwLockReadGuard<'_, ReplicaState> {
        self.state_mu.read()
    }

    /// Shared `read_only_mu` for serving a read-only command.
    ///
    /// Never call this while holding `state_mu`.
    pub fn read_only(&self) -> RwLockReadGuard<'_, ()> {
        self.read_only_mu.read()
    }

    /// Wake the replica after it joined the key index.
    pub(crate) fn maybe_unquiesce(&self, campaign_on_wake: bool) -> bool {
        self.state_mu.write().maybe_unquiesce(campaign_on_wake)
    }

    /// True while some caller owns `raft_mu`.
    pub fn is_raft_locked(&self) -> bool {
        self.raft_mu.is_locked()
    }
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica")
            .field("range_id", &self.range_id)
            .field("replica_id", &self.replica_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.range_id, self.replica_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{NodeId, ReplicaDescriptor, StoreId};
    use crate::replica::DestroyReason;

    fn desc() -> RangeDescriptor {
        RangeDescriptor::new(
            RangeId(1),
            b"a".to_vec(),
            b"m".to_vec(),
            vec![ReplicaDescriptor::new(NodeId(1), StoreId(1), ReplicaId(1))],
            ReplicaId(2),
        )
    }

    #[test]
    fn test_new_handle_is_uninitialized_and_quiesced() {
        let r = Replica::new_uninitialized(RangeId(1), ReplicaId(1));
        assert!(!r.is_initialized());
        assert!(r.is_quiesced());
        assert!(r.destroy_status().is_alive());
        assert!(!r.is_raft_locked());
        assert_eq!(r.to_string(), "r1/1");
    }

    #[test]
    fn test_unquiesce_requires_descriptor() {
        let r = Replica::new_uninitialized(RangeId(1), ReplicaId(1));
        assert!(!r.state_mu.write().maybe_unquiesce(false));

        let r = Replica::from_persisted(RangeId(1), ReplicaId(1), HardState::default(), Some(desc()));
        let mut state = r.state_mu.write();
        assert!(state.maybe_unquiesce(false));
        assert!(!state.is_quiesced());
        assert!(!state.campaign_requested());
    }

    #[test]
    fn test_unquiesce_refused_once_removed() {
        let r = Replica::from_persisted(RangeId(1), ReplicaId(1), HardState::default(), Some(desc()));
        let mut state = r.state_mu.write();
        state.destroy_status = DestroyStatus::Removed(DestroyReason::RemovedFromRange);
        assert!(!state.maybe_unquiesce(true));
        assert!(state.is_quiesced());
    }

    #[test]
    fn test_span_from_descriptor() {
        let r = Replica::from_persisted(RangeId(1), ReplicaId(1), HardState::default(), Some(desc()));
        let span = r.span().unwrap();
        assert_eq!(span.start(), b"a");
        assert_eq!(span.end(), b"m");
    }
}
