//! Destroy status of a replica handle

use std::fmt;

/// Why a replica is being or has been torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// The range no longer lists this replica
    RemovedFromRange,
    /// A newer replica of the same range was requested on this node
    Superseded,
    /// Durable initialization failed before the handle was linked
    CreationFailed,
}

impl DestroyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestroyReason::RemovedFromRange => "removed_from_range",
            DestroyReason::Superseded => "superseded",
            DestroyReason::CreationFailed => "creation_failed",
        }
    }
}

impl fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// alive -> being-removed -> removed; never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestroyStatus {
    #[default]
    Alive,
    BeingRemoved(DestroyReason),
    Removed(DestroyReason),
}

impl DestroyStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, DestroyStatus::Alive)
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, DestroyStatus::Removed(_))
    }

    pub fn reason(&self) -> Option<DestroyReason> {
        match self {
            DestroyStatus::Alive => None,
            DestroyStatus::BeingRemoved(r) | DestroyStatus::Removed(r) => Some(*r),
        }
    }
}

impl fmt::Display for DestroyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestroyStatus::Alive => write!(f, "alive"),
            DestroyStatus::BeingRemoved(r) => write!(f, "being-removed ({})", r),
            DestroyStatus::Removed(r) => write!(f, "removed ({})", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(DestroyStatus::default().is_alive());
        assert_eq!(DestroyStatus::Alive.reason(), None);

        let pending = DestroyStatus::BeingRemoved(DestroyReason::Superseded);
        assert!(!pending.is_alive());
        assert!(!pending.is_removed());
        assert_eq!(pending.reason(), Some(DestroyReason::Superseded));

        assert!(DestroyStatus::Removed(DestroyReason::CreationFailed).is_removed());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DestroyStatus::Removed(DestroyReason::RemovedFromRange).to_string(),
            "removed (removed_from_range)"
        );
    }
}
