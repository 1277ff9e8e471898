//! Replica lifecycle error types
//!
//! Error codes:
//! - RANGEDB_REPLICA_DELETED (ERROR severity)
//! - RANGEDB_REPLICA_TOO_OLD (ERROR severity)
//! - RANGEDB_REPLICA_OVERLAP (ERROR severity)
//! - RANGEDB_REPLICA_UNINITIALIZED (ERROR severity)
//! - RANGEDB_INVALID_SNAPSHOT (ERROR severity)
//! - RANGEDB_REPLICA_STORAGE (ERROR severity)
//! - RANGEDB_RETRY_EXHAUSTED (ERROR severity)
//! - RANGEDB_CONFIGURATION (ERROR severity)
//! - RANGEDB_REPLICA_CORRUPTION (FATAL severity)
//! - RANGEDB_INVARIANT_VIOLATION (FATAL severity)
//!
//! The retry signal used between lookup attempts is not an error; see
//! `Attempt` in the lifecycle module.

use std::fmt;

use crate::descriptor::ReplicaId;
use crate::engine::{Severity, StorageError, StorageErrorCode};

/// Replica error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaErrorKind {
    /// The requested replica was removed; the caller is behind
    ReplicaDeleted,
    /// The sending replica is no longer a member of the range
    ReplicaTooOld,
    /// A key span collides with one already claimed on this node
    Overlap,
    /// Operation requires a descriptor the replica does not have yet
    Uninitialized,
    /// Snapshot descriptor does not fit the replica receiving it
    InvalidSnapshot,
    /// Engine I/O failed
    Storage,
    /// The retry loop ran past its configured deadline
    RetryExhausted,
    /// Configuration could not be loaded or is invalid
    Configuration,
    /// Persisted state contradicts itself (FATAL)
    Corruption,
    /// In-memory state broke a lifecycle invariant (FATAL)
    InvariantViolation,
}

impl ReplicaErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ReplicaErrorKind::ReplicaDeleted => "RANGEDB_REPLICA_DELETED",
            ReplicaErrorKind::ReplicaTooOld => "RANGEDB_REPLICA_TOO_OLD",
            ReplicaErrorKind::Overlap => "RANGEDB_REPLICA_OVERLAP",
            ReplicaErrorKind::Uninitialized => "RANGEDB_REPLICA_UNINITIALIZED",
            ReplicaErrorKind::InvalidSnapshot => "RANGEDB_INVALID_SNAPSHOT",
            ReplicaErrorKind::Storage => "RANGEDB_REPLICA_STORAGE",
            ReplicaErrorKind::RetryExhausted => "RANGEDB_RETRY_EXHAUSTED",
            ReplicaErrorKind::Configuration => "RANGEDB_CONFIGURATION",
            ReplicaErrorKind::Corruption => "RANGEDB_REPLICA_CORRUPTION",
            ReplicaErrorKind::InvariantViolation => "RANGEDB_INVARIANT_VIOLATION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ReplicaErrorKind::Corruption | ReplicaErrorKind::InvariantViolation => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Permanent refusals a caller turns into a protocol-level response.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            ReplicaErrorKind::ReplicaDeleted
                | ReplicaErrorKind::ReplicaTooOld
                | ReplicaErrorKind::Overlap
        )
    }
}

impl fmt::Display for ReplicaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Replica lifecycle error
#[derive(Debug)]
pub struct ReplicaError {
    kind: ReplicaErrorKind,
    message: String,
    details: Option<String>,
    source: Option<StorageError>,
}

impl ReplicaError {
    fn new(kind: ReplicaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn replica_deleted() -> Self {
        Self::new(ReplicaErrorKind::ReplicaDeleted, "replica deleted")
    }

    /// The sender with `replica_id` has been removed from the range.
    pub fn replica_too_old(replica_id: ReplicaId) -> Self {
        Self::new(
            ReplicaErrorKind::ReplicaTooOld,
            format!("sender replica {} too old", replica_id),
        )
    }

    pub fn overlap(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::Overlap, message)
    }

    pub fn uninitialized(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::Uninitialized, message)
    }

    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::InvalidSnapshot, message)
    }

    pub fn retry_exhausted(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::RetryExhausted, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::Configuration, message)
    }

    /// Corruption (FATAL)
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::Corruption, message)
    }

    /// Invariant violation (FATAL)
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::InvariantViolation, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn kind(&self) -> ReplicaErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ReplicaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.kind, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReplicaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<StorageError> for ReplicaError {
    fn from(err: StorageError) -> Self {
        let kind = match err.code() {
            StorageErrorCode::DataCorruption => ReplicaErrorKind::Corruption,
            _ => ReplicaErrorKind::Storage,
        };
        Self {
            kind,
            message: err.message().to_string(),
            details: err.key().map(|k| format!("key: {}", k)),
            source: Some(err),
        }
    }
}

/// Result type for replica lifecycle operations
pub type ReplicaResult<T> = Result<T, ReplicaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_error_codes() {
        assert_eq!(ReplicaError::replica_deleted().code(), "RANGEDB_REPLICA_DELETED");
        assert_eq!(
            ReplicaError::replica_too_old(ReplicaId(1)).code(),
            "RANGEDB_REPLICA_TOO_OLD"
        );
        assert_eq!(ReplicaError::overlap("x").code(), "RANGEDB_REPLICA_OVERLAP");
        assert_eq!(
            ReplicaError::invariant_violation("x").code(),
            "RANGEDB_INVARIANT_VIOLATION"
        );
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(ReplicaError::corruption("x").is_fatal());
        assert!(ReplicaError::invariant_violation("x").is_fatal());
        assert!(!ReplicaError::replica_deleted().is_fatal());
        assert!(!ReplicaError::overlap("x").is_fatal());
        assert!(!ReplicaError::retry_exhausted("x").is_fatal());
    }

    #[test]
    fn test_refusals() {
        assert!(ReplicaErrorKind::ReplicaDeleted.is_refusal());
        assert!(ReplicaErrorKind::ReplicaTooOld.is_refusal());
        assert!(ReplicaErrorKind::Overlap.is_refusal());
        assert!(!ReplicaErrorKind::Storage.is_refusal());
    }

    #[test]
    fn test_from_storage_error() {
        let err: ReplicaError = StorageError::data_corruption("bad crc").into();
        assert_eq!(err.kind(), ReplicaErrorKind::Corruption);
        assert!(err.is_fatal());

        let err: ReplicaError =
            StorageError::write_failed("put", io::Error::other("disk full")).with_key(b"k").into();
        assert_eq!(err.kind(), ReplicaErrorKind::Storage);
        assert_eq!(err.details(), Some("key: k"));
        assert!(err.source().is_some());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = ReplicaError::replica_too_old(ReplicaId(2)).with_details("r5");
        let display = err.to_string();
        assert!(display.starts_with("[ERROR] RANGEDB_REPLICA_TOO_OLD"));
        assert!(display.contains("sender replica 2 too old"));
        assert!(display.contains("(r5)"));
    }
}
