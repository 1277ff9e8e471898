//! Persisted range-local records
//!
//! Stored as JSON inside the engine. A record that cannot be decoded is
//! corruption.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::descriptor::ReplicaId;
use crate::engine::{StorageError, StorageResult};

/// Deletion marker for a range.
///
/// Any replica with `replica_id < next_replica_id` is gone for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTombstone {
    pub next_replica_id: ReplicaId,
}

impl RangeTombstone {
    /// True if this tombstone forbids creating `replica_id`.
    pub fn forbids(&self, replica_id: ReplicaId) -> bool {
        replica_id < self.next_replica_id
    }
}

/// Persisted raft hard state.
///
/// An uninitialized replica must have `commit == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardState {
    pub term: u64,
    pub vote: ReplicaId,
    pub commit: u64,
}

/// The replica id this node last created for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaftReplicaId {
    pub replica_id: ReplicaId,
}

pub(crate) fn encode<T: Serialize>(record: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| {
        StorageError::write_failed(
            "failed to encode record",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

pub(crate) fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::data_corruption(format!("failed to decode record: {}", e)).with_key(key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tombstone_forbids_strictly_below() {
        let t = RangeTombstone {
            next_replica_id: ReplicaId(3),
        };
        assert!(t.forbids(ReplicaId(1)));
        assert!(t.forbids(ReplicaId(2)));
        assert!(!t.forbids(ReplicaId(3)));
        assert!(!t.forbids(ReplicaId(4)));
    }

    #[test]
    fn test_default_tombstone_forbids_nothing_valid() {
        assert!(!RangeTombstone::default().forbids(ReplicaId(1)));
    }

    #[test]
    fn test_encoding_is_plain_json() {
        let bytes = encode(&RangeTombstone {
            next_replica_id: ReplicaId(7),
        })
        .unwrap();
        assert_eq!(bytes, br#"{"next_replica_id":7}"#.to_vec());
    }

    #[test]
    fn test_undecodable_record_is_corruption() {
        let err = decode::<HardState>(b"k", b"not json").unwrap_err();
        assert!(err.is_fatal());
    }
}
