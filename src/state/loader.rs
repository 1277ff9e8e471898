//! Per-range access to persisted records

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::{RangeDescriptor, RangeId, ReplicaId};
use crate::engine::{Engine, StorageResult};

use super::keys::{
    decode_range_local_key, raft_hard_state_key, raft_replica_id_key, range_descriptor_key,
    range_tombstone_key, LocalKeyKind, LOCAL_RANGE_ID_PREFIX,
};
use super::records::{decode, encode, HardState, RaftReplicaId, RangeTombstone};

/// Reads and writes the range-id local records of one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLoader {
    range_id: RangeId,
}

impl StateLoader {
    pub fn new(range_id: RangeId) -> Self {
        Self { range_id }
    }

    pub fn range_id(&self) -> RangeId {
        self.range_id
    }

    fn load<T: serde::de::DeserializeOwned>(
        engine: &dyn Engine,
        key: &[u8],
    ) -> StorageResult<Option<T>> {
        match engine.get(key)? {
            None => Ok(None),
            Some(bytes) => decode(key, &bytes).map(Some),
        }
    }

    /// The tombstone, if the range has ever been torn down with data destruction.
    pub fn load_tombstone(&self, engine: &dyn Engine) -> StorageResult<Option<RangeTombstone>> {
        Self::load(engine, &range_tombstone_key(self.range_id))
    }

    /// Advance the tombstone to `next_replica_id`.
    ///
    /// Never lowers the stored value. Returns the tombstone now on disk and
    /// whether this call changed it.
    pub fn set_tombstone(
        &self,
        engine: &dyn Engine,
        next_replica_id: ReplicaId,
    ) -> StorageResult<(RangeTombstone, bool)> {
        let existing = self.load_tombstone(engine)?.unwrap_or_default();
        if existing.next_replica_id >= next_replica_id {
            return Ok((existing, false));
        }
        let tombstone = RangeTombstone { next_replica_id };
        engine.put(&range_tombstone_key(self.range_id), &encode(&tombstone)?)?;
        Ok((tombstone, true))
    }

    /// The raft hard state; absent means all-zero.
    pub fn load_hard_state(&self, engine: &dyn Engine) -> StorageResult<HardState> {
        Ok(Self::load(engine, &raft_hard_state_key(self.range_id))?.unwrap_or_default())
    }

    pub fn set_hard_state(&self, engine: &dyn Engine, hs: &HardState) -> StorageResult<()> {
        engine.put(&raft_hard_state_key(self.range_id), &encode(hs)?)
    }

    pub fn load_raft_replica_id(&self, engine: &dyn Engine) -> StorageResult<Option<ReplicaId>> {
        Ok(Self::load::<RaftReplicaId>(engine, &raft_replica_id_key(self.range_id))?
            .map(|r| r.replica_id))
    }

    /// Record the replica id this node is creating for the range.
    ///
    /// Overwriting with the same or a later id after a crash is harmless.
    pub fn set_raft_replica_id(&self, engine: &dyn Engine, replica_id: ReplicaId) -> StorageResult<()> {
        engine.put(
            &raft_replica_id_key(self.range_id),
            &encode(&RaftReplicaId { replica_id })?,
        )
    }

    pub fn load_descriptor(&self, engine: &dyn Engine) -> StorageResult<Option<RangeDescriptor>> {
        Self::load(engine, &range_descriptor_key(self.range_id))
    }

    pub fn set_descriptor(&self, engine: &dyn Engine, desc: &RangeDescriptor) -> StorageResult<()> {
        engine.put(&range_descriptor_key(self.range_id), &encode(desc)?)
    }

    /// Delete everything the range stores except its tombstone.
    pub fn clear_range_data(&self, engine: &dyn Engine) -> StorageResult<()> {
        engine.delete(&range_descriptor_key(self.range_id))?;
        engine.delete(&raft_hard_state_key(self.range_id))?;
        engine.delete(&raft_replica_id_key(self.range_id))
    }
}

/// Everything persisted for one range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedRange {
    pub tombstone: Option<RangeTombstone>,
    pub hard_state: Option<HardState>,
    pub replica_id: Option<ReplicaId>,
    pub descriptor: Option<RangeDescriptor>,
}

/// Group every range-id local record in the engine by range.
pub fn scan_persisted_ranges(
    engine: &dyn Engine,
) -> StorageResult<BTreeMap<RangeId, PersistedRange>> {
    let mut ranges: BTreeMap<RangeId, PersistedRange> = BTreeMap::new();
    for (key, value) in engine.scan_prefix(LOCAL_RANGE_ID_PREFIX)? {
        let Some((range_id, kind)) = decode_range_local_key(&key) else {
            continue;
        };
        let entry = ranges.entry(range_id).or_default();
        match kind {
            LocalKeyKind::Tombstone => entry.tombstone = Some(decode(&key, &value)?),
            LocalKeyKind::HardState => entry.hard_state = Some(decode(&key, &value)?),
            LocalKeyKind::RaftReplicaId => {
                entry.replica_id = Some(decode::<RaftReplicaId>(&key, &value)?.replica_id)
            }
            LocalKeyKind::Descriptor => entry.descriptor = Some(decode(&key, &value)?),
        }
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemEngine;

    #[test]
    fn test_tombstone_never_decreases() {
        let engine = MemEngine::new();
        let loader = StateLoader::new(RangeId(5));
        assert_eq!(loader.load_tombstone(&engine).unwrap(), None);

        let (t, changed) = loader.set_tombstone(&engine, ReplicaId(4)).unwrap();
        assert!(changed);
        assert_eq!(t.next_replica_id, ReplicaId(4));

        let (t, changed) = loader.set_tombstone(&engine, ReplicaId(2)).unwrap();
        assert!(!changed);
        assert_eq!(t.next_replica_id, ReplicaId(4));

        let (_, changed) = loader.set_tombstone(&engine, ReplicaId(4)).unwrap();
        assert!(!changed);
        assert_eq!(
            loader.load_tombstone(&engine).unwrap().unwrap().next_replica_id,
            ReplicaId(4)
        );
    }

    #[test]
    fn test_absent_hard_state_is_zero() {
        let engine = MemEngine::new();
        let loader = StateLoader::new(RangeId(1));
        assert_eq!(loader.load_hard_state(&engine).unwrap(), HardState::default());

        let hs = HardState {
            term: 3,
            vote: ReplicaId(2),
            commit: 0,
        };
        loader.set_hard_state(&engine, &hs).unwrap();
        assert_eq!(loader.load_hard_state(&engine).unwrap(), hs);
    }

    #[test]
    fn test_clear_range_data_keeps_tombstone() {
        let engine = MemEngine::new();
        let loader = StateLoader::new(RangeId(9));
        loader.set_raft_replica_id(&engine, ReplicaId(2)).unwrap();
        loader.set_hard_state(&engine, &HardState::default()).unwrap();
        loader.set_tombstone(&engine, ReplicaId(2)).unwrap();

        loader.clear_range_data(&engine).unwrap();

        assert_eq!(loader.load_raft_replica_id(&engine).unwrap(), None);
        assert!(loader.load_tombstone(&engine).unwrap().is_some());
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_scan_groups_by_range() {
        let engine = MemEngine::new();
        StateLoader::new(RangeId(1))
            .set_raft_replica_id(&engine, ReplicaId(1))
            .unwrap();
        StateLoader::new(RangeId(2))
            .set_tombstone(&engine, ReplicaId(3))
            .unwrap();
        engine.put(b"unrelated", b"x").unwrap();

        let ranges = scan_persisted_ranges(&engine).unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[&RangeId(1)].replica_id, Some(ReplicaId(1)));
        assert_eq!(
            ranges[&RangeId(2)].tombstone,
            Some(RangeTombstone {
                next_replica_id: ReplicaId(3)
            })
        );
    }
}
