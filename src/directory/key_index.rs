//! Key-ordered index of claimed spans
//!
//! Holds initialized replicas and placeholders side by side. Entries never
//! overlap; an insert that would overlap is rejected and leaves the index
//! as it was.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use crate::descriptor::{KeySpan, RangeId};
use crate::replica::Replica;

use super::placeholder::ReplicaPlaceholder;

/// What claims a span.
#[derive(Debug, Clone)]
pub enum IndexItem {
    Replica(Arc<Replica>),
    Placeholder(Arc<ReplicaPlaceholder>),
}

impl IndexItem {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, IndexItem::Placeholder(_))
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            IndexItem::Replica(_) => "replica",
            IndexItem::Placeholder(_) => "placeholder",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub span: KeySpan,
    pub range_id: RangeId,
    pub item: IndexItem,
}

impl IndexEntry {
    pub fn replica(span: KeySpan, replica: Arc<Replica>) -> Self {
        Self {
            span,
            range_id: replica.range_id(),
            item: IndexItem::Replica(replica),
        }
    }

    pub fn placeholder(placeholder: Arc<ReplicaPlaceholder>) -> Self {
        Self {
            span: placeholder.span().clone(),
            range_id: placeholder.range_id(),
            item: IndexItem::Placeholder(placeholder),
        }
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.item.kind_str(), self.range_id, self.span)
    }
}

/// Non-overlapping spans keyed by start key.
#[derive(Debug, Default)]
pub struct KeyIndex {
    entries: BTreeMap<Vec<u8>, IndexEntry>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry whose span overlaps `span`, if any.
    pub fn find_overlap(&self, span: &KeySpan) -> Option<&IndexEntry> {
        // Entries are disjoint, so among those starting before span.end the
        // last one also ends last.
        self.entries
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(span.end())))
            .next_back()
            .map(|(_, e)| e)
            .filter(|e| e.span.overlaps(span))
    }

    /// Insert, or hand back a copy of the entry in the way.
    pub fn insert(&mut self, entry: IndexEntry) -> Result<(), Box<IndexEntry>> {
        if let Some(existing) = self.find_overlap(&entry.span) {
            return Err(Box::new(existing.clone()));
        }
        self.entries.insert(entry.span.start().to_vec(), entry);
        Ok(())
    }

    /// The entry containing `key`.
    pub fn lookup(&self, key: &[u8]) -> Option<&IndexEntry> {
        self.entries
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(_, e)| e)
            .filter(|e| e.span.contains_key(key))
    }

    /// Remove the entry starting at `start` if it is `replica`.
    pub fn remove_replica(&mut self, start: &[u8], replica: &Arc<Replica>) -> Option<IndexEntry> {
        self.remove_if(start, |item| match item {
            IndexItem::Replica(r) => Arc::ptr_eq(r, replica),
            IndexItem::Placeholder(_) => false,
        })
    }

    /// Remove the entry starting at `start` if it is `placeholder`.
    pub fn remove_placeholder(
        &mut self,
        start: &[u8],
        placeholder: &Arc<ReplicaPlaceholder>,
    ) -> Option<IndexEntry> {
        self.remove_if(start, |item| match item {
            IndexItem::Placeholder(p) => Arc::ptr_eq(p, placeholder),
            IndexItem::Replica(_) => false,
        })
    }

    fn remove_if(&mut self, start: &[u8], pred: impl Fn(&IndexItem) -> bool) -> Option<IndexEntry> {
        if !pred(&self.entries.get(start)?.item) {
            return None;
        }
        self.entries.remove(start)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }
}
