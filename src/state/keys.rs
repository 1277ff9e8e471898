//! Range-id local key layout
//!
//! `\x01r` + range id (u64 big-endian) + 4-byte suffix.
//! Big-endian ids keep every range's keys contiguous and ordered by id.

use crate::descriptor::RangeId;

/// Prefix shared by all range-id local keys
pub const LOCAL_RANGE_ID_PREFIX: &[u8] = b"\x01r";

pub const SUFFIX_RANGE_TOMBSTONE: &[u8; 4] = b"rftb";
pub const SUFFIX_RAFT_HARD_STATE: &[u8; 4] = b"rfth";
pub const SUFFIX_RAFT_REPLICA_ID: &[u8; 4] = b"rftr";
pub const SUFFIX_RANGE_DESCRIPTOR: &[u8; 4] = b"rdsc";

const ID_LEN: usize = 8;
const SUFFIX_LEN: usize = 4;

/// Which record a range-id local key holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKeyKind {
    Tombstone,
    HardState,
    RaftReplicaId,
    Descriptor,
}

impl LocalKeyKind {
    fn suffix(self) -> &'static [u8; 4] {
        match self {
            LocalKeyKind::Tombstone => SUFFIX_RANGE_TOMBSTONE,
            LocalKeyKind::HardState => SUFFIX_RAFT_HARD_STATE,
            LocalKeyKind::RaftReplicaId => SUFFIX_RAFT_REPLICA_ID,
            LocalKeyKind::Descriptor => SUFFIX_RANGE_DESCRIPTOR,
        }
    }

    fn from_suffix(suffix: &[u8]) -> Option<Self> {
        [
            LocalKeyKind::Tombstone,
            LocalKeyKind::HardState,
            LocalKeyKind::RaftReplicaId,
            LocalKeyKind::Descriptor,
        ]
        .into_iter()
        .find(|k| k.suffix().as_slice() == suffix)
    }
}

/// All keys belonging to `range_id` start with this.
pub fn range_id_prefix(range_id: RangeId) -> Vec<u8> {
    let mut key = Vec::with_capacity(LOCAL_RANGE_ID_PREFIX.len() + ID_LEN);
    key.extend_from_slice(LOCAL_RANGE_ID_PREFIX);
    key.extend_from_slice(&range_id.get().to_be_bytes());
    key
}

pub fn range_local_key(range_id: RangeId, kind: LocalKeyKind) -> Vec<u8> {
    let mut key = range_id_prefix(range_id);
    key.extend_from_slice(kind.suffix());
    key
}

pub fn range_tombstone_key(range_id: RangeId) -> Vec<u8> {
    range_local_key(range_id, LocalKeyKind::Tombstone)
}

pub fn raft_hard_state_key(range_id: RangeId) -> Vec<u8> {
    range_local_key(range_id, LocalKeyKind::HardState)
}

pub fn raft_replica_id_key(range_id: RangeId) -> Vec<u8> {
    range_local_key(range_id, LocalKeyKind::RaftReplicaId)
}

pub fn range_descriptor_key(range_id: RangeId) -> Vec<u8> {
    range_local_key(range_id, LocalKeyKind::Descriptor)
}

/// Split a range-id local key into its range and kind.
pub fn decode_range_local_key(key: &[u8]) -> Option<(RangeId, LocalKeyKind)> {
    let rest = key.strip_prefix(LOCAL_RANGE_ID_PREFIX)?;
    if rest.len() != ID_LEN + SUFFIX_LEN {
        return None;
    }
    let (id, suffix) = rest.split_at(ID_LEN);
    let id = u64::from_be_bytes(id.try_into().ok()?);
    Some((RangeId(id), LocalKeyKind::from_suffix(suffix)?))
}
