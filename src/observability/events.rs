//! Replica lifecycle events
//!
//! Every transition the lifecycle manager makes is logged as one of these.
//! Multi-step operations (node open, snapshot apply) are logged through
//! `OperationScope` instead.

use std::fmt;

/// Observable events of the replica lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Node
    /// A persisted replica was skipped during open
    NodeOpenSkippedReplica,
    /// Configuration loaded
    ConfigLoaded,

    // Lookup / creation
    /// A lookup or creation attempt must be retried
    LookupRetry,
    /// Existing replica is older than the requested one
    StaleReplicaFound,
    /// Message came from a replica already removed from the range
    SenderTooOld,
    /// Uninitialized replica created and linked
    ReplicaCreated,
    /// Creation refused (tombstone or newer replica present)
    ReplicaCreateRefused,
    /// Creation failed during durable initialization
    ReplicaCreateFailed,
    /// Retry budget exhausted
    RetryExhausted,

    // Initialization
    /// Replica received a descriptor and entered the key index
    ReplicaInitialized,
    /// Key span reserved for an in-flight snapshot
    PlaceholderAdded,
    /// Key span reservation released
    PlaceholderRemoved,

    // Teardown
    /// Replica marked removed and unlinked
    ReplicaRemoved,
    /// Tombstone advanced for a range
    TombstoneAdvanced,

    // Fatal
    /// Persisted state is inconsistent (FATAL)
    CorruptionDetected,
    /// In-memory invariant broken (FATAL)
    InvariantViolation,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::NodeOpenSkippedReplica => "NODE_OPEN_SKIPPED_REPLICA",
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::LookupRetry => "LOOKUP_RETRY",
            Event::StaleReplicaFound => "STALE_REPLICA_FOUND",
            Event::SenderTooOld => "SENDER_TOO_OLD",
            Event::ReplicaCreated => "REPLICA_CREATED",
            Event::ReplicaCreateRefused => "REPLICA_CREATE_REFUSED",
            Event::ReplicaCreateFailed => "REPLICA_CREATE_FAILED",
            Event::RetryExhausted => "RETRY_EXHAUSTED",

            Event::ReplicaInitialized => "REPLICA_INITIALIZED",
            Event::PlaceholderAdded => "PLACEHOLDER_ADDED",
            Event::PlaceholderRemoved => "PLACEHOLDER_REMOVED",

            Event::ReplicaRemoved => "REPLICA_REMOVED",
            Event::TombstoneAdvanced => "TOMBSTONE_ADVANCED",

            Event::CorruptionDetected => "CORRUPTION_DETECTED",
            Event::InvariantViolation => "INVARIANT_VIOLATION",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::CorruptionDetected | Event::InvariantViolation)
    }

    /// Events that are chatty under contention and only logged at TRACE.
    pub fn is_verbose(&self) -> bool {
        matches!(self, Event::LookupRetry | Event::StaleReplicaFound)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
