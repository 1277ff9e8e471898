//! Replica teardown
//!
//! Status moves alive -> being-removed -> removed, and the handle leaves the
//! directory before `raft_mu` is released, so no lookup can observe a
//! removed handle and return it.

use crate::descriptor::ReplicaId;
use crate::observability::{log_event_with_fields, Event};
use crate::replica::{DestroyReason, DestroyStatus, LockedReplica, ReplicaError, ReplicaResult};

use super::coordinator::LifecycleCoordinator;

/// How a replica is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Clear the range's persisted state and advance its tombstone
    pub destroy_data: bool,
    pub reason: DestroyReason,
}

impl RemoveOptions {
    pub fn destroy(reason: DestroyReason) -> Self {
        Self {
            destroy_data: true,
            reason,
        }
    }

    pub fn keep_data(reason: DestroyReason) -> Self {
        Self {
            destroy_data: false,
            reason,
        }
    }
}

impl LifecycleCoordinator {
    /// Tear down a replica whose `raft_mu` the caller holds.
    ///
    /// `next_replica_id` must be above the replica's own id; with
    /// `destroy_data` it becomes the range's tombstone. Removing an already
    /// removed replica does nothing.
    pub fn remove_replica(
        &self,
        locked: &LockedReplica,
        next_replica_id: ReplicaId,
        opts: RemoveOptions,
    ) -> ReplicaResult<()> {
        self.supervisor()
            .check(self.remove_replica_raft_mu_locked(locked, next_replica_id, opts))
    }

    pub(crate) fn remove_replica_raft_mu_locked(
        &self,
        locked: &LockedReplica,
        next_replica_id: ReplicaId,
        opts: RemoveOptions,
    ) -> ReplicaResult<()> {
        if next_replica_id <= locked.replica_id() {
            return Err(ReplicaError::invariant_violation(format!(
                "removing {} with next replica id {} would not forbid it",
                locked.replica(),
                next_replica_id
            )));
        }

        {
            let mut state = locked.lock_state();
            if state.destroy_status.is_removed() {
                return Ok(());
            }
            state.destroy_status = DestroyStatus::BeingRemoved(opts.reason);
        }

        let range = locked.range_id().to_string();
        if opts.destroy_data {
            // Past being-removed there is no way back to alive.
            if let Err(e) = self.destroy_replica_data(locked, next_replica_id, &range) {
                if e.is_fatal() {
                    return Err(e);
                }
                return Err(ReplicaError::invariant_violation(format!(
                    "failed to destroy data of {}",
                    locked.replica()
                ))
                .with_details(e.to_string()));
            }
        }

        locked.lock_state().destroy_status = DestroyStatus::Removed(opts.reason);
        let unlinked = self.directory().unlink(locked);

        self.metrics().increment_replicas_removed();
        let replica = locked.replica_id().to_string();
        log_event_with_fields(
            Event::ReplicaRemoved,
            &[
                ("range_id", &range),
                ("replica_id", &replica),
                ("reason", opts.reason.as_str()),
                ("destroy_data", if opts.destroy_data { "true" } else { "false" }),
                ("unlinked", if unlinked { "true" } else { "false" }),
            ],
        );
        Ok(())
    }

    /// Tombstone first, then the rest. An interrupted clear leaves records
    /// the tombstone already forbids.
    fn destroy_replica_data(
        &self,
        locked: &LockedReplica,
        next_replica_id: ReplicaId,
        range: &str,
    ) -> ReplicaResult<()> {
        let engine = self.engine();
        let loader = locked.loader();
        let (tombstone, advanced) = loader.set_tombstone(engine, next_replica_id)?;
        if advanced {
            self.metrics().increment_tombstones_written();
            let next = tombstone.next_replica_id.to_string();
            log_event_with_fields(
                Event::TombstoneAdvanced,
                &[("range_id", range), ("next_replica_id", &next)],
            );
        }
        loader.clear_range_data(engine)?;
        Ok(())
    }
}
