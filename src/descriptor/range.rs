//! Range and replica descriptors
//!
//! Cluster metadata describing a range's key span and its replica membership.
//! The lifecycle manager treats these as data: membership lookup and span
//! extraction only.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{NodeId, RangeId, ReplicaId, StoreId};
use super::span::KeySpan;

/// One member of a range's replica set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaDescriptor {
    pub node_id: NodeId,
    pub store_id: StoreId,
    pub replica_id: ReplicaId,
}

impl ReplicaDescriptor {
    pub fn new(node_id: NodeId, store_id: StoreId, replica_id: ReplicaId) -> Self {
        Self {
            node_id,
            store_id,
            replica_id,
        }
    }
}

impl fmt::Display for ReplicaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}):{}", self.node_id, self.store_id, self.replica_id)
    }
}

/// Key span and membership of a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub range_id: RangeId,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub replicas: Vec<ReplicaDescriptor>,
    /// Smallest replica id the range has not yet handed out.
    pub next_replica_id: ReplicaId,
    /// Bumped on every split, merge or membership change.
    #[serde(default)]
    pub generation: u64,
}

impl RangeDescriptor {
    pub fn new(
        range_id: RangeId,
        start_key: impl Into<Vec<u8>>,
        end_key: impl Into<Vec<u8>>,
        replicas: Vec<ReplicaDescriptor>,
        next_replica_id: ReplicaId,
    ) -> Self {
        Self {
            range_id,
            start_key: start_key.into(),
            end_key: end_key.into(),
            replicas,
            next_replica_id,
            generation: 0,
        }
    }

    /// The key span, or `None` if the bounds are empty or inverted.
    pub fn span(&self) -> Option<KeySpan> {
        KeySpan::new(self.start_key.clone(), self.end_key.clone())
    }

    pub fn replica_by_id(&self, replica_id: ReplicaId) -> Option<&ReplicaDescriptor> {
        self.replicas.iter().find(|r| r.replica_id == replica_id)
    }

    /// True if `replica_id` was handed out by this range and has since left it.
    pub fn is_removed_member(&self, replica_id: ReplicaId) -> bool {
        self.replica_by_id(replica_id).is_none() && replica_id < self.next_replica_id
    }

    /// Checks the fields a descriptor must satisfy to be installed.
    pub fn validate(&self) -> Result<(), String> {
        if self.span().is_none() {
            return Err(format!(
                "{}: start key must sort before end key",
                self.range_id
            ));
        }
        for r in &self.replicas {
            if r.replica_id.is_zero() {
                return Err(format!("{}: replica {} has zero id", self.range_id, r));
            }
            if r.replica_id >= self.next_replica_id {
                return Err(format!(
                    "{}: replica {} not below next_replica_id {}",
                    self.range_id, r, self.next_replica_id
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{{{}-{}}} [",
            self.range_id,
            String::from_utf8_lossy(&self.start_key),
            String::from_utf8_lossy(&self.end_key)
        )?;
        for (i, r) in self.replicas.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, ", next={}, gen={}]", self.next_replica_id, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64) -> ReplicaDescriptor {
        ReplicaDescriptor::new(NodeId(id), StoreId(id), ReplicaId(id))
    }

    fn desc() -> RangeDescriptor {
        RangeDescriptor::new(RangeId(5), "a", "m", vec![member(1), member(3)], ReplicaId(4))
    }

    #[test]
    fn test_membership_lookup() {
        let d = desc();
        assert!(d.replica_by_id(ReplicaId(1)).is_some());
        assert!(d.replica_by_id(ReplicaId(2)).is_none());
    }

    #[test]
    fn test_removed_member() {
        let d = desc();
        // 2 was handed out and is gone
        assert!(d.is_removed_member(ReplicaId(2)));
        // 3 is still a member
        assert!(!d.is_removed_member(ReplicaId(3)));
        // 4 has not been handed out yet
        assert!(!d.is_removed_member(ReplicaId(4)));
    }

    #[test]
    fn test_validate() {
        assert!(desc().validate().is_ok());

        let mut inverted = desc();
        inverted.end_key = b"a".to_vec();
        assert!(inverted.validate().is_err());

        let mut bad_next = desc();
        bad_next.next_replica_id = ReplicaId(3);
        assert!(bad_next.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_generation_default() {
        let json = r#"{"range_id":1,"start_key":[97],"end_key":[98],"replicas":[],"next_replica_id":1}"#;
        let d: RangeDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.generation, 0);
        assert_eq!(d.span().unwrap().start(), b"a");
    }
}
