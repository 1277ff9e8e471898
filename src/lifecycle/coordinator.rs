//! Lookup-or-create for replicas
//!
//! `get_or_create_replica` makes three things appear atomic under the
//! returned replica's `raft_mu`:
//! - the directory maps this range to this and only this handle
//! - the handle is not being removed
//! - the range's tombstone does not forbid the handle's replica id
//!
//! A refusal (`ReplicaDeleted`, `ReplicaTooOld`) guarantees the requested
//! replica will never be returned.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::descriptor::{RangeDescriptor, RangeId, ReplicaDescriptor, ReplicaId};
use crate::directory::{IndexItem, ReplicaDirectory, ReplicaPlaceholder};
use crate::engine::Engine;
use crate::observability::{
    log_event_at, log_event_with_fields, Event, MetricsRegistry, OperationScope, Severity,
};
use crate::replica::{
    DestroyReason, DestroyStatus, LockedReplica, Replica, ReplicaError, ReplicaResult,
};
use crate::state::{scan_persisted_ranges, StateLoader};

use super::config::LifecycleConfig;
use super::retry::Retry;
use super::supervisor::Supervisor;
use super::teardown::RemoveOptions;

/// Outcome of one lookup or creation attempt.
///
/// `Retry` means another caller is mid-creation or mid-removal for the same
/// range; it never leaves this module.
#[derive(Debug)]
pub(crate) enum Attempt<T> {
    Done(T),
    Retry,
}

/// Entry point for obtaining a safe, `raft_mu`-locked replica handle.
pub struct LifecycleCoordinator {
    engine: Arc<dyn Engine>,
    directory: ReplicaDirectory,
    metrics: Arc<MetricsRegistry>,
    config: LifecycleConfig,
    supervisor: Supervisor,
}

impl LifecycleCoordinator {
    /// A coordinator with an empty directory.
    ///
    /// The config is validated here as well as on load; callers may build
    /// one by hand.
    pub fn new(engine: Arc<dyn Engine>, config: LifecycleConfig) -> ReplicaResult<Self> {
        config.validate()?;
        let metrics = Arc::new(MetricsRegistry::new());
        Ok(Self {
            engine,
            directory: ReplicaDirectory::new(metrics.clone()),
            metrics,
            supervisor: Supervisor::new(config.fatal_policy),
            config,
        })
    }

    /// A coordinator whose directory is rebuilt from the engine.
    pub fn open(engine: Arc<dyn Engine>, config: LifecycleConfig) -> ReplicaResult<Self> {
        let coordinator = Self::new(engine, config)?;
        coordinator.load_persisted()?;
        Ok(coordinator)
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn directory(&self) -> &ReplicaDirectory {
        &self.directory
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn get_replica(&self, range_id: RangeId) -> Option<Arc<Replica>> {
        self.directory.get(range_id)
    }

    /// The initialized replica whose span contains `key`.
    pub fn lookup_replica(&self, key: &[u8]) -> Option<Arc<Replica>> {
        match self.directory.lookup_by_key(key)?.item {
            IndexItem::Replica(r) => Some(r),
            IndexItem::Placeholder(_) => None,
        }
    }

    /// Return the replica for `(range_id, replica_id)`, creating an
    /// uninitialized one if none exists and no tombstone forbids it.
    ///
    /// On success the caller owns the replica's `raft_mu` and the flag says
    /// whether this call created it. `creating` is the descriptor of the
    /// replica that sent the triggering message, if any.
    ///
    /// Must not be called while holding `raft_mu` of a replica of the same
    /// range.
    pub fn get_or_create_replica(
        &self,
        range_id: RangeId,
        replica_id: ReplicaId,
        creating: Option<&ReplicaDescriptor>,
    ) -> ReplicaResult<(LockedReplica, bool)> {
        if replica_id.is_zero() {
            return Err(self.supervisor.escalate(ReplicaError::invariant_violation(
                format!("cannot construct a replica for {} with zero id", range_id),
            )));
        }

        let mut retry = Retry::start(&self.config.retry);
        loop {
            match self.try_get_or_create_replica(range_id, replica_id, creating) {
                Ok(Attempt::Done(found)) => return Ok(found),
                Ok(Attempt::Retry) => {}
                Err(e) => return Err(self.supervisor.escalate(e)),
            }

            self.metrics.increment_creation_retries();
            let range = range_id.to_string();
            let replica = replica_id.to_string();
            let attempt = retry.attempts().to_string();
            log_event_with_fields(
                Event::LookupRetry,
                &[
                    ("range_id", &range),
                    ("replica_id", &replica),
                    ("attempt", &attempt),
                ],
            );
            if !retry.next() {
                let elapsed = retry.elapsed().as_millis().to_string();
                log_event_at(
                    Severity::Warn,
                    Event::RetryExhausted,
                    &[
                        ("range_id", &range),
                        ("replica_id", &replica),
                        ("elapsed_ms", &elapsed),
                    ],
                );
                return Err(ReplicaError::retry_exhausted(format!(
                    "gave up on {}/{} after {} attempts",
                    range_id,
                    replica_id,
                    retry.attempts() + 1
                )));
            }
        }
    }

    /// Lookup only. `Done(None)` means the range has no handle.
    pub(crate) fn try_get_replica(
        &self,
        range_id: RangeId,
        replica_id: ReplicaId,
        creating: Option<&ReplicaDescriptor>,
    ) -> ReplicaResult<Attempt<Option<LockedReplica>>> {
        let Some(replica) = self.directory.get(range_id) else {
            return Ok(Attempt::Done(None));
        };
        let locked = LockedReplica::lock(replica);

        let (removed, being_removed, sender_too_old) = {
            let state = locked.read_state();
            (
                state.destroy_status.is_removed(),
                matches!(state.destroy_status, DestroyStatus::BeingRemoved(_)),
                creating.is_some_and(|from| sender_is_too_old(state.desc.as_ref(), from)),
            )
        };

        // Removal is finishing elsewhere; the next attempt will not find it.
        if removed {
            return Ok(Attempt::Retry);
        }

        if let Some(from) = creating.filter(|_| sender_too_old) {
            self.metrics.increment_creations_refused();
            let range = range_id.to_string();
            let sender = from.replica_id.to_string();
            log_event_with_fields(
                Event::SenderTooOld,
                &[("range_id", &range), ("sender_replica_id", &sender)],
            );
            return Err(ReplicaError::replica_too_old(from.replica_id));
        }

        match locked.replica_id().cmp(&replica_id) {
            Ordering::Less => {
                let range = range_id.to_string();
                let existing = locked.replica_id().to_string();
                let requested = replica_id.to_string();
                log_event_with_fields(
                    Event::StaleReplicaFound,
                    &[
                        ("range_id", &range),
                        ("existing_replica_id", &existing),
                        ("requested_replica_id", &requested),
                    ],
                );
                let opts = RemoveOptions::destroy(DestroyReason::Superseded);
                self.remove_replica_raft_mu_locked(&locked, replica_id, opts)?;
                Ok(Attempt::Retry)
            }
            Ordering::Greater => {
                // The sender is behind and addressed an older incarnation.
                self.metrics.increment_creations_refused();
                let range = range_id.to_string();
                let requested = replica_id.to_string();
                log_event_with_fields(
                    Event::ReplicaCreateRefused,
                    &[
                        ("range_id", &range),
                        ("replica_id", &requested),
                        ("reason", "newer_replica_present"),
                    ],
                );
                Err(ReplicaError::replica_deleted())
            }
            // Teardown runs under raft_mu, so seeing it unfinished means it
            // failed. The older id may already be tombstoned.
            Ordering::Equal if being_removed => Err(ReplicaError::replica_deleted()),
            Ordering::Equal => Ok(Attempt::Done(Some(locked))),
        }
    }

    pub(crate) fn try_get_or_create_replica(
        &self,
        range_id: RangeId,
        replica_id: ReplicaId,
        creating: Option<&ReplicaDescriptor>,
    ) -> ReplicaResult<Attempt<(LockedReplica, bool)>> {
        match self.try_get_replica(range_id, replica_id, creating)? {
            Attempt::Retry => return Ok(Attempt::Retry),
            Attempt::Done(Some(locked)) => return Ok(Attempt::Done((locked, false))),
            Attempt::Done(None) => {}
        }

        let Some(token) = self.directory.begin_creating(range_id) else {
            return Ok(Attempt::Retry);
        };

        // Someone may have finished creating it while we took the token.
        match self.try_get_replica(range_id, replica_id, creating)? {
            Attempt::Retry => return Ok(Attempt::Retry),
            Attempt::Done(Some(locked)) => return Ok(Attempt::Done((locked, false))),
            Attempt::Done(None) => {}
        }

        // Only the token holder reads or writes this range's tombstone now.
        let loader = StateLoader::new(range_id);
        if let Some(tombstone) = loader.load_tombstone(self.engine())? {
            if tombstone.forbids(replica_id) {
                self.metrics.increment_creations_refused();
                let range = range_id.to_string();
                let requested = replica_id.to_string();
                let next = tombstone.next_replica_id.to_string();
                log_event_with_fields(
                    Event::ReplicaCreateRefused,
                    &[
                        ("range_id", &range),
                        ("replica_id", &requested),
                        ("reason", "tombstone"),
                        ("next_replica_id", &next),
                    ],
                );
                return Err(ReplicaError::replica_deleted());
            }
        }

        let mut locked = LockedReplica::lock(Replica::new_uninitialized(range_id, replica_id));
        if let Err(e) = locked.initialize(self.engine()) {
            let range = range_id.to_string();
            let rendered = e.to_string();
            log_event_at(
                Severity::Error,
                Event::ReplicaCreateFailed,
                &[("range_id", &range), ("error", &rendered)],
            );
            return Err(e);
        }

        if let Err(e) = self.directory.insert_uninitialized(&token, locked.replica()) {
            locked.lock_state().destroy_status =
                DestroyStatus::Removed(DestroyReason::CreationFailed);
            return Err(e);
        }
        drop(token);

        self.metrics.increment_replicas_created();
        let range = range_id.to_string();
        let replica = replica_id.to_string();
        log_event_with_fields(
            Event::ReplicaCreated,
            &[("range_id", &range), ("replica_id", &replica)],
        );
        Ok(Attempt::Done((locked, true)))
    }

    /// Move a replica that just received its descriptor into the key index.
    ///
    /// Returns false if it was not uninitialized.
    pub fn mark_initialized(&self, locked: &LockedReplica) -> ReplicaResult<bool> {
        self.supervisor.check(self.directory.mark_initialized(locked))
    }

    /// Initialize an uninitialized replica from a snapshot's descriptor.
    ///
    /// The span is reserved with a placeholder while the descriptor is
    /// persisted, then handed to the replica itself.
    pub fn apply_snapshot(&self, locked: &LockedReplica, desc: RangeDescriptor) -> ReplicaResult<()> {
        self.supervisor.check(self.apply_snapshot_raft_mu_locked(locked, desc))
    }

    fn apply_snapshot_raft_mu_locked(
        &self,
        locked: &LockedReplica,
        desc: RangeDescriptor,
    ) -> ReplicaResult<()> {
        desc.validate().map_err(ReplicaError::invalid_snapshot)?;
        if desc.range_id != locked.range_id() {
            return Err(ReplicaError::invalid_snapshot(format!(
                "snapshot for {} sent to {}",
                desc.range_id,
                locked.replica()
            )));
        }
        if desc.replica_by_id(locked.replica_id()).is_none() {
            return Err(ReplicaError::invalid_snapshot(format!(
                "snapshot descriptor {} does not contain {}",
                desc,
                locked.replica()
            )));
        }
        {
            let state = locked.read_state();
            if !state.destroy_status.is_alive() {
                return Err(ReplicaError::replica_deleted()
                    .with_details(format!("{} is {}", locked.replica(), state.destroy_status)));
            }
            if state.is_initialized() {
                return Err(ReplicaError::invalid_snapshot(format!(
                    "{} is already initialized",
                    locked.replica()
                )));
            }
        }

        let span = desc.span().ok_or_else(|| {
            ReplicaError::invalid_snapshot(format!("{} has an empty key span", desc))
        })?;
        let scope = OperationScope::begin(
            "SNAPSHOT_APPLY",
            vec![
                ("range_id", locked.range_id().to_string()),
                ("span", span.to_string()),
            ],
        );

        let placeholder = Arc::new(ReplicaPlaceholder::new(locked.range_id(), span));
        if let Err(e) = self.directory.add_placeholder(placeholder) {
            scope.fail(e.message(), false);
            return Err(e);
        }

        if let Err(e) = locked.loader().set_descriptor(self.engine(), &desc) {
            self.directory.remove_placeholder(locked.range_id());
            let e = ReplicaError::from(e);
            scope.fail(e.message(), e.is_fatal());
            return Err(e);
        }
        locked.lock_state().desc = Some(desc);

        match self.directory.mark_initialized(locked) {
            Ok(true) => {
                scope.complete(&[]);
                Ok(())
            }
            Ok(false) => {
                self.directory.remove_placeholder(locked.range_id());
                let e = ReplicaError::invariant_violation(format!(
                    "{} received a snapshot but is not tracked as uninitialized",
                    locked.replica()
                ));
                scope.fail(e.message(), true);
                Err(e)
            }
            Err(e) => {
                scope.fail(e.message(), e.is_fatal());
                Err(e)
            }
        }
    }

    /// Rebuild the directory from persisted range state.
    fn load_persisted(&self) -> ReplicaResult<()> {
        let scope = OperationScope::begin("NODE_OPEN", Vec::new());
        match self.load_persisted_inner() {
            Ok((initialized, uninitialized, skipped)) => {
                let initialized = initialized.to_string();
                let uninitialized = uninitialized.to_string();
                let skipped = skipped.to_string();
                scope.complete(&[
                    ("initialized", &initialized),
                    ("uninitialized", &uninitialized),
                    ("skipped", &skipped),
                ]);
                Ok(())
            }
            Err(e) => {
                scope.fail(e.message(), e.is_fatal());
                Err(self.supervisor.escalate(e))
            }
        }
    }

    fn load_persisted_inner(&self) -> ReplicaResult<(usize, usize, usize)> {
        let (mut initialized, mut uninitialized, mut skipped) = (0, 0, 0);

        for (range_id, persisted) in scan_persisted_ranges(self.engine())? {
            let range = range_id.to_string();
            let Some(replica_id) = persisted.replica_id else {
                if persisted.descriptor.is_some() {
                    return Err(ReplicaError::corruption(format!(
                        "{} has a descriptor but no replica id",
                        range_id
                    )));
                }
                // Tombstone or leftover hard state only.
                continue;
            };

            if let Some(tombstone) = persisted.tombstone {
                if tombstone.forbids(replica_id) {
                    // Teardown stopped between tombstone and clear; finish it
                    // so a newer replica starts from empty state.
                    StateLoader::new(range_id).clear_range_data(self.engine())?;
                    skipped += 1;
                    let replica = replica_id.to_string();
                    log_event_at(
                        Severity::Warn,
                        Event::NodeOpenSkippedReplica,
                        &[
                            ("range_id", &range),
                            ("replica_id", &replica),
                            ("reason", "tombstone"),
                        ],
                    );
                    continue;
                }
            }

            let hard_state = persisted.hard_state.unwrap_or_default();
            match persisted.descriptor {
                Some(desc) => {
                    desc.validate().map_err(|e| {
                        ReplicaError::corruption(format!("persisted descriptor invalid: {}", e))
                    })?;
                    if desc.range_id != range_id {
                        return Err(ReplicaError::corruption(format!(
                            "descriptor for {} stored under {}",
                            desc.range_id, range_id
                        )));
                    }
                    let replica =
                        Replica::from_persisted(range_id, replica_id, hard_state, Some(desc));
                    self.directory.insert_initialized(&replica)?;
                    initialized += 1;
                }
                None => {
                    if hard_state.commit != 0 {
                        return Err(ReplicaError::corruption(format!(
                            "uninitialized {} has non-zero commit index {}",
                            range_id, hard_state.commit
                        )));
                    }
                    let replica = Replica::from_persisted(range_id, replica_id, hard_state, None);
                    let token = self.directory.begin_creating(range_id).ok_or_else(|| {
                        ReplicaError::invariant_violation(format!(
                            "{} is being created during open",
                            range_id
                        ))
                    })?;
                    self.directory.insert_uninitialized(&token, &replica)?;
                    uninitialized += 1;
                }
            }
        }

        Ok((initialized, uninitialized, skipped))
    }
}

/// True if `from` was a member of the range and has since been removed.
fn sender_is_too_old(desc: Option<&RangeDescriptor>, from: &ReplicaDescriptor) -> bool {
    desc.is_some_and(|d| d.is_removed_member(from.replica_id))
}
