//! Fatal error supervision
//!
//! Corruption and invariant violations mean persisted or in-memory state can
//! no longer be trusted. They are logged at FATAL here and then either abort
//! the process or, under `FatalPolicy::Propagate`, return to the caller.

use std::process;

use crate::observability::{log_event_with_fields, Event};
use crate::replica::{ReplicaError, ReplicaErrorKind, ReplicaResult};

use super::config::FatalPolicy;

#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    policy: FatalPolicy,
}

impl Supervisor {
    pub fn new(policy: FatalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FatalPolicy {
        self.policy
    }

    /// Non-fatal errors pass through untouched.
    pub fn escalate(&self, err: ReplicaError) -> ReplicaError {
        if !err.is_fatal() {
            return err;
        }
        let event = match err.kind() {
            ReplicaErrorKind::Corruption => Event::CorruptionDetected,
            _ => Event::InvariantViolation,
        };
        let rendered = err.to_string();
        log_event_with_fields(event, &[("code", err.code()), ("error", &rendered)]);
        if self.policy == FatalPolicy::Abort {
            process::abort();
        }
        err
    }

    pub fn check<T>(&self, result: ReplicaResult<T>) -> ReplicaResult<T> {
        result.map_err(|e| self.escalate(e))
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(FatalPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propagate_returns_fatal_error() {
        let sup = Supervisor::new(FatalPolicy::Propagate);
        let err = sup.escalate(ReplicaError::corruption("commit index 7"));
        assert_eq!(err.kind(), ReplicaErrorKind::Corruption);
    }

    #[test]
    fn test_non_fatal_passes_under_abort() {
        let sup = Supervisor::new(FatalPolicy::Abort);
        let err = sup.escalate(ReplicaError::replica_deleted());
        assert_eq!(err.kind(), ReplicaErrorKind::ReplicaDeleted);
        assert_eq!(sup.check(Ok::<_, ReplicaError>(3)).unwrap(), 3);
    }
}
