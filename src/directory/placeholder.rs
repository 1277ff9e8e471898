//! Key span reservations for in-flight snapshots

use std::fmt;

use crate::descriptor::{KeySpan, RangeId};

/// Claims a span in the key index while a snapshot for `range_id` is applied.
#[derive(Debug, PartialEq, Eq)]
pub struct ReplicaPlaceholder {
    range_id: RangeId,
    span: KeySpan,
}

impl ReplicaPlaceholder {
    pub fn new(range_id: RangeId, span: KeySpan) -> Self {
        Self { range_id, span }
    }

    pub fn range_id(&self) -> RangeId {
        self.range_id
    }

    pub fn span(&self) -> &KeySpan {
        &self.span
    }
}

impl fmt::Display for ReplicaPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "placeholder {} {}", self.range_id, self.span)
    }
}
