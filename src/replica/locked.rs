//! Typed proof that `raft_mu` is held
//!
//! A `LockedReplica` can only be produced by locking `raft_mu`, and the only
//! way to reach `read_only_mu` + `state_mu` for writing is through it, which
//! fixes the acquisition order at compile time.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{RawMutex, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::Engine;

use super::destroy::{DestroyReason, DestroyStatus};
use super::errors::{ReplicaError, ReplicaResult};
use super::handle::{RaftMuState, Replica, ReplicaState};

/// A replica whose `raft_mu` is owned by the holder.
///
/// Dropping it (or calling `unlock`) releases `raft_mu`.
pub struct LockedReplica {
    replica: Arc<Replica>,
    raft: ArcMutexGuard<RawMutex, RaftMuState>,
}

impl LockedReplica {
    /// Block until `raft_mu` is available.
    pub(crate) fn lock(replica: Arc<Replica>) -> Self {
        let raft = replica.raft_mu.lock_arc();
        Self { replica, raft }
    }

    pub fn replica(&self) -> &Arc<Replica> {
        &self.replica
    }

    pub fn raft_state(&self) -> &RaftMuState {
        &self.raft
    }

    /// Take `read_only_mu` then `state_mu`, both exclusively.
    pub fn lock_state(&self) -> ReplicaStateGuard<'_> {
        let read_only = self.replica.read_only_mu.write();
        let state = self.replica.state_mu.write();
        ReplicaStateGuard {
            state,
            _read_only: read_only,
        }
    }

    pub fn read_state(&self) -> RwLockReadGuard<'_, ReplicaState> {
        self.replica.state_mu.read()
    }

    /// Release `raft_mu`, keeping a plain reference.
    pub fn unlock(self) -> Arc<Replica> {
        let LockedReplica { replica, raft } = self;
        drop(raft);
        replica
    }

    /// Durable initialization of a freshly fabricated handle.
    ///
    /// Runs with all three locks held. Any failure leaves the handle
    /// `Removed` so it can never be linked.
    pub(crate) fn initialize(&mut self, engine: &dyn Engine) -> ReplicaResult<()> {
        let replica = &*self.replica;
        let raft = &mut *self.raft;
        let _read_only = replica.read_only_mu.write();
        let mut state = replica.state_mu.write();

        let result = load_initial_state(replica, raft, engine);
        if result.is_err() {
            state.destroy_status = DestroyStatus::Removed(DestroyReason::CreationFailed);
        }
        result
    }
}

fn load_initial_state(
    replica: &Replica,
    raft: &mut RaftMuState,
    engine: &dyn Engine,
) -> ReplicaResult<()> {
    let loader = replica.loader();

    let hard_state = loader.load_hard_state(engine)?;
    if hard_state.commit != 0 {
        return Err(ReplicaError::corruption(format!(
            "{}: non-zero commit index {} on a replica this node has never seen",
            replica, hard_state.commit
        )));
    }

    // A marker left by an earlier uninitialized incarnation is overwritten;
    // its term and vote only constrain this replica further.
    loader.set_raft_replica_id(engine, replica.replica_id())?;

    raft.hard_state = hard_state;
    Ok(())
}

impl Deref for LockedReplica {
    type Target = Replica;

    fn deref(&self) -> &Replica {
        &self.replica
    }
}

impl fmt::Debug for LockedReplica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedReplica")
            .field("replica", &*self.replica)
            .finish()
    }
}

/// Exclusive `read_only_mu` + `state_mu`, released in reverse order.
pub struct ReplicaStateGuard<'a> {
    state: RwLockWriteGuard<'a, ReplicaState>,
    _read_only: RwLockWriteGuard<'a, ()>,
}

impl Deref for ReplicaStateGuard<'_> {
    type Target = ReplicaState;

    fn deref(&self) -> &ReplicaState {
        &self.state
    }
}

impl DerefMut for ReplicaStateGuard<'_> {
    fn deref_mut(&mut self) -> &mut ReplicaState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{RangeId, ReplicaId};
    use crate::engine::{FaultOp, FaultyEngine, MemEngine};
    use crate::replica::ReplicaErrorKind;
    use crate::state::{raft_replica_id_key, HardState, StateLoader};

    #[test]
    fn test_lock_holds_raft_mu_until_unlock() {
        let r = Replica::new_uninitialized(RangeId(1), ReplicaId(1));
        let locked = LockedReplica::lock(r.clone());
        assert!(r.is_raft_locked());

        let back = locked.unlock();
        assert!(Arc::ptr_eq(&back, &r));
        assert!(!r.is_raft_locked());
    }

    #[test]
    fn test_lock_state_blocks_readers() {
        let r = Replica::new_uninitialized(RangeId(1), ReplicaId(1));
        let locked = LockedReplica::lock(r.clone());
        {
            let _guard = locked.lock_state();
            assert!(r.read_only_mu.try_read().is_none());
            assert!(r.state_mu.try_read().is_none());
        }
        assert!(r.read_only_mu.try_read().is_some());
        assert!(r.state_mu.try_read().is_some());
    }

    #[test]
    fn test_initialize_persists_replica_id() {
        let engine = MemEngine::new();
        let r = Replica::new_uninitialized(RangeId(3), ReplicaId(2));
        let mut locked = LockedReplica::lock(r);
        locked.initialize(&engine).unwrap();

        assert_eq!(
            StateLoader::new(RangeId(3)).load_raft_replica_id(&engine).unwrap(),
            Some(ReplicaId(2))
        );
        assert!(locked.destroy_status().is_alive());
    }

    #[test]
    fn test_initialize_rejects_committed_hard_state() {
        let engine = MemEngine::new();
        StateLoader::new(RangeId(3))
            .set_hard_state(
                &engine,
                &HardState {
                    term: 5,
                    vote: ReplicaId(1),
                    commit: 10,
                },
            )
            .unwrap();

        let mut locked = LockedReplica::lock(Replica::new_uninitialized(RangeId(3), ReplicaId(2)));
        let err = locked.initialize(&engine).unwrap_err();
        assert_eq!(err.kind(), ReplicaErrorKind::Corruption);
        assert!(err.is_fatal());
        assert!(locked.destroy_status().is_removed());
    }

    #[test]
    fn test_initialize_loads_uncommitted_hard_state() {
        let engine = MemEngine::new();
        let hs = HardState {
            term: 4,
            vote: ReplicaId(3),
            commit: 0,
        };
        StateLoader::new(RangeId(3)).set_hard_state(&engine, &hs).unwrap();

        let mut locked = LockedReplica::lock(Replica::new_uninitialized(RangeId(3), ReplicaId(2)));
        locked.initialize(&engine).unwrap();
        assert_eq!(locked.raft_state().hard_state, hs);
    }

    #[test]
    fn test_initialize_failure_marks_removed() {
        let engine = FaultyEngine::new(MemEngine::new());
        engine.fail_always(FaultOp::Put, &raft_replica_id_key(RangeId(3)));

        let mut locked = LockedReplica::lock(Replica::new_uninitialized(RangeId(3), ReplicaId(2)));
        let err = locked.initialize(&engine).unwrap_err();
        assert_eq!(err.kind(), ReplicaErrorKind::Storage);
        assert_eq!(
            locked.destroy_status(),
            DestroyStatus::Removed(DestroyReason::CreationFailed)
        );
    }
}
