//! Node-wide replica directory
//!
//! - `by_range_id`: at most one live handle per range
//! - `by_key`: non-overlapping index of initialized replicas and placeholders
//! - `uninitialized`: handles with no descriptor yet
//! - `creating`: ranges under construction, see `CreationToken`
//!
//! All maps live behind one mutex held only for short, non-blocking
//! sections. Lock order: a replica's `raft_mu` and `read_only_mu` come
//! before the directory lock, its `state_mu` after.

mod creation;
mod key_index;
mod placeholder;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::descriptor::RangeId;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::replica::{LockedReplica, Replica, ReplicaError, ReplicaResult};

pub use creation::CreationToken;
pub use key_index::{IndexEntry, IndexItem, KeyIndex};
pub use placeholder::ReplicaPlaceholder;

#[derive(Debug, Default)]
struct DirectoryState {
    by_range_id: HashMap<RangeId, Arc<Replica>>,
    by_key: KeyIndex,
    uninitialized: HashMap<RangeId, Arc<Replica>>,
    placeholders: HashMap<RangeId, Arc<ReplicaPlaceholder>>,
    creating: HashSet<RangeId>,
}

/// Registry of every replica handle on this node.
#[derive(Debug)]
pub struct ReplicaDirectory {
    inner: Mutex<DirectoryState>,
    metrics: Arc<MetricsRegistry>,
}

impl ReplicaDirectory {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            inner: Mutex::new(DirectoryState::default()),
            metrics,
        }
    }

    pub fn get(&self, range_id: RangeId) -> Option<Arc<Replica>> {
        self.inner.lock().by_range_id.get(&range_id).cloned()
    }

    /// The replica or placeholder claiming `key`.
    pub fn lookup_by_key(&self, key: &[u8]) -> Option<IndexEntry> {
        self.inner.lock().by_key.lookup(key).cloned()
    }

    pub fn placeholder(&self, range_id: RangeId) -> Option<Arc<ReplicaPlaceholder>> {
        self.inner.lock().placeholders.get(&range_id).cloned()
    }

    /// Claim the right to create `range_id`; `None` if another caller has it.
    pub fn begin_creating(&self, range_id: RangeId) -> Option<CreationToken<'_>> {
        if self.inner.lock().creating.insert(range_id) {
            Some(CreationToken::new(self, range_id))
        } else {
            None
        }
    }

    pub fn is_creating(&self, range_id: RangeId) -> bool {
        self.inner.lock().creating.contains(&range_id)
    }

    pub fn creating_len(&self) -> usize {
        self.inner.lock().creating.len()
    }

    /// Link a freshly created, uninitialized replica.
    ///
    /// The token holder has verified the range is absent; finding any
    /// handle here means the maps are inconsistent.
    pub fn insert_uninitialized(
        &self,
        token: &CreationToken<'_>,
        replica: &Arc<Replica>,
    ) -> ReplicaResult<()> {
        if token.range_id() != replica.range_id() {
            return Err(ReplicaError::invariant_violation(format!(
                "creation token for {} used to link {}",
                token.range_id(),
                replica
            )));
        }
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.by_range_id.get(&replica.range_id()) {
            return Err(ReplicaError::invariant_violation(format!(
                "{} already linked while creating {}",
                existing, replica
            )));
        }
        inner.by_range_id.insert(replica.range_id(), replica.clone());
        inner.uninitialized.insert(replica.range_id(), replica.clone());
        self.metrics.increment_uninitialized_count();
        Ok(())
    }

    /// Link a replica loaded from disk with its descriptor.
    ///
    /// Startup only. An overlap here means two persisted ranges claim the
    /// same keys.
    pub fn insert_initialized(&self, replica: &Arc<Replica>) -> ReplicaResult<()> {
        let span = replica.span().ok_or_else(|| {
            ReplicaError::invariant_violation(format!("{} has no valid key span", replica))
        })?;
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.by_range_id.get(&replica.range_id()) {
            return Err(ReplicaError::invariant_violation(format!(
                "{} already linked while loading {}",
                existing, replica
            )));
        }
        if let Err(existing) = inner
            .by_key
            .insert(IndexEntry::replica(span, replica.clone()))
        {
            return Err(ReplicaError::corruption(format!(
                "{} overlaps persisted {}",
                replica, existing
            )));
        }
        inner.by_range_id.insert(replica.range_id(), replica.clone());
        self.metrics.increment_replica_count();
        Ok(())
    }

    /// Move an uninitialized replica that now has a descriptor into the key
    /// index, replacing its placeholder if it has one.
    ///
    /// Returns false if the replica was not uninitialized.
    pub fn mark_initialized(&self, locked: &LockedReplica) -> ReplicaResult<bool> {
        let replica = locked.replica();
        let range_id = replica.range_id();
        let mut inner = self.inner.lock();

        match inner.uninitialized.get(&range_id) {
            Some(r) if Arc::ptr_eq(r, replica) => {}
            _ => return Ok(false),
        }

        let span = {
            let state = replica.read_state();
            if !state.destroy_status.is_alive() {
                return Err(ReplicaError::invariant_violation(format!(
                    "{} is {} but still uninitialized in the directory",
                    replica, state.destroy_status
                )));
            }
            let desc = state.desc.as_ref().ok_or_else(|| {
                ReplicaError::uninitialized(format!("{} has no descriptor", replica))
            })?;
            let span = desc.span().ok_or_else(|| {
                ReplicaError::invariant_violation(format!("{} has invalid key span", desc))
            })?;
            span
        };

        let placeholder = inner.placeholders.remove(&range_id);
        if let Some(ref p) = placeholder {
            inner.by_key.remove_placeholder(p.span().start(), p);
        }
        if let Err(existing) = inner
            .by_key
            .insert(IndexEntry::replica(span.clone(), replica.clone()))
        {
            if let Some(p) = placeholder {
                // Its span was free a moment ago under the same lock.
                let restored = inner.by_key.insert(IndexEntry::placeholder(p.clone()));
                debug_assert!(restored.is_ok(), "placeholder for {} not restored", range_id);
                inner.placeholders.insert(range_id, p);
            }
            return Err(ReplicaError::invariant_violation(format!(
                "{} {} overlaps {}",
                replica, span, existing
            )));
        }
        if placeholder.is_some() {
            self.metrics.increment_placeholders_removed();
        }
        inner.uninitialized.remove(&range_id);

        if !replica.maybe_unquiesce(false) {
            return Err(ReplicaError::invariant_violation(format!(
                "{} could not be woken after initialization",
                replica
            )));
        }

        self.metrics.increment_replica_count();
        self.metrics.decrement_uninitialized_count();
        self.metrics.increment_replicas_initialized();
        drop(inner);

        let range = range_id.to_string();
        let span = span.to_string();
        log_event_with_fields(
            Event::ReplicaInitialized,
            &[("range_id", &range), ("span", &span)],
        );
        Ok(true)
    }

    /// Reserve a span for an in-flight snapshot.
    pub fn add_placeholder(&self, placeholder: Arc<ReplicaPlaceholder>) -> ReplicaResult<()> {
        let range_id = placeholder.range_id();
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.placeholders.get(&range_id) {
            return Err(ReplicaError::overlap(format!(
                "{} already reserved by {}",
                range_id, existing
            )));
        }
        if let Err(existing) = inner
            .by_key
            .insert(IndexEntry::placeholder(placeholder.clone()))
        {
            return Err(ReplicaError::overlap(format!(
                "{} overlaps {}",
                placeholder, existing
            )));
        }
        inner.placeholders.insert(range_id, placeholder.clone());
        drop(inner);

        self.metrics.increment_placeholders_added();
        let range = range_id.to_string();
        let span = placeholder.span().to_string();
        log_event_with_fields(
            Event::PlaceholderAdded,
            &[("range_id", &range), ("span", &span)],
        );
        Ok(())
    }

    /// Release a reservation; false if `range_id` had none.
    pub fn remove_placeholder(&self, range_id: RangeId) -> bool {
        let mut inner = self.inner.lock();
        let Some(placeholder) = inner.placeholders.remove(&range_id) else {
            return false;
        };
        inner
            .by_key
            .remove_placeholder(placeholder.span().start(), &placeholder);
        drop(inner);

        self.metrics.increment_placeholders_removed();
        let range = range_id.to_string();
        log_event_with_fields(Event::PlaceholderRemoved, &[("range_id", &range)]);
        true
    }

    /// Drop every reference the directory holds to this handle.
    ///
    /// Called with `raft_mu` held, after the handle was marked removed.
    /// Returns false if the handle was not linked.
    pub fn unlink(&self, locked: &LockedReplica) -> bool {
        let replica = locked.replica();
        let range_id = replica.range_id();
        let mut inner = self.inner.lock();

        match inner.by_range_id.get(&range_id) {
            Some(r) if Arc::ptr_eq(r, replica) => {}
            _ => return false,
        }
        inner.by_range_id.remove(&range_id);

        if inner.uninitialized.remove(&range_id).is_some() {
            self.metrics.decrement_uninitialized_count();
        } else if let Some(span) = replica.span() {
            if inner.by_key.remove_replica(span.start(), replica).is_some() {
                self.metrics.decrement_replica_count();
            }
        }
        true
    }

    /// Number of handles in `by_range_id`.
    pub fn len(&self) -> usize {
        self.inner.lock().by_range_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_range_id.is_empty()
    }

    pub fn uninitialized_len(&self) -> usize {
        self.inner.lock().uninitialized.len()
    }

    pub fn is_uninitialized(&self, range_id: RangeId) -> bool {
        self.inner.lock().uninitialized.contains_key(&range_id)
    }

    /// Copy of the key index in key order.
    pub fn key_index(&self) -> Vec<IndexEntry> {
        self.inner.lock().by_key.iter().cloned().collect()
    }

    pub fn summary(&self) -> DirectorySummary {
        let inner = self.inner.lock();
        let mut range_ids: Vec<RangeId> = inner.by_range_id.keys().copied().collect();
        range_ids.sort();
        DirectorySummary {
            replicas: inner.by_range_id.len(),
            uninitialized: inner.uninitialized.len(),
            placeholders: inner.placeholders.len(),
            creating: inner.creating.len(),
            range_ids,
            key_index: inner
                .by_key
                .iter()
                .map(|e| KeyIndexRow {
                    range_id: e.range_id,
                    kind: e.item.kind_str(),
                    span: e.span.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable view of the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub replicas: usize,
    pub uninitialized: usize,
    pub placeholders: usize,
    pub creating: usize,
    pub range_ids: Vec<RangeId>,
    pub key_index: Vec<KeyIndexRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyIndexRow {
    pub range_id: RangeId,
    pub kind: &'static str,
    pub span: String,
}
