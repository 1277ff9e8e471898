//! Replica lifecycle metrics
//!
//! Counters are monotonic. `replica_count` and `uninitialized_count` are
//! gauges tracking the current directory population.
//! All operations use Relaxed ordering; readers only need eventual values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lifecycle counters and gauges shared by the directory and coordinator.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Uninitialized replicas fabricated by the coordinator
    replicas_created: AtomicU64,
    /// Replicas that entered the key index
    replicas_initialized: AtomicU64,
    /// Replicas torn down
    replicas_removed: AtomicU64,
    /// Retry signals observed by the coordinator loop
    creation_retries: AtomicU64,
    /// Permanent refusals (deleted / too old)
    creations_refused: AtomicU64,
    /// Placeholder reservations
    placeholders_added: AtomicU64,
    placeholders_removed: AtomicU64,
    /// Tombstone writes that advanced the stored value
    tombstones_written: AtomicU64,
    /// Initialized replicas currently linked (gauge)
    replica_count: AtomicU64,
    /// Uninitialized replicas currently linked (gauge)
    uninitialized_count: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all values at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_replicas_created(&self) {
        self.replicas_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replicas_initialized(&self) {
        self.replicas_initialized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replicas_removed(&self) {
        self.replicas_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_creation_retries(&self) {
        self.creation_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_creations_refused(&self) {
        self.creations_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_placeholders_added(&self) {
        self.placeholders_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_placeholders_removed(&self) {
        self.placeholders_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tombstones_written(&self) {
        self.tombstones_written.fetch_add(1, Ordering::Relaxed);
    }

    // Gauges

    pub fn increment_replica_count(&self) {
        self.replica_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_replica_count(&self) {
        saturating_decrement(&self.replica_count);
    }

    pub fn increment_uninitialized_count(&self) {
        self.uninitialized_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_uninitialized_count(&self) {
        saturating_decrement(&self.uninitialized_count);
    }

    /// Initialized replicas currently linked
    pub fn replica_count(&self) -> u64 {
        self.replica_count.load(Ordering::Relaxed)
    }

    /// Uninitialized replicas currently linked
    pub fn uninitialized_count(&self) -> u64 {
        self.uninitialized_count.load(Ordering::Relaxed)
    }

    /// Get all values as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            replicas_created: self.replicas_created.load(Ordering::Relaxed),
            replicas_initialized: self.replicas_initialized.load(Ordering::Relaxed),
            replicas_removed: self.replicas_removed.load(Ordering::Relaxed),
            creation_retries: self.creation_retries.load(Ordering::Relaxed),
            creations_refused: self.creations_refused.load(Ordering::Relaxed),
            placeholders_added: self.placeholders_added.load(Ordering::Relaxed),
            placeholders_removed: self.placeholders_removed.load(Ordering::Relaxed),
            tombstones_written: self.tombstones_written.load(Ordering::Relaxed),
            replica_count: self.replica_count.load(Ordering::Relaxed),
            uninitialized_count: self.uninitialized_count.load(Ordering::Relaxed),
        }
    }
}

fn saturating_decrement(v: &AtomicU64) {
    let _ = v.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
}

/// A point-in-time copy of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub replicas_created: u64,
    pub replicas_initialized: u64,
    pub replicas_removed: u64,
    pub creation_retries: u64,
    pub creations_refused: u64,
    pub placeholders_added: u64,
    pub placeholders_removed: u64,
    pub tombstones_written: u64,
    pub replica_count: u64,
    pub uninitialized_count: u64,
}
