//! Key index overlap tests
//!
//! Random sequences of span claims, replicas and placeholders mixed, must
//! never leave two overlapping entries in the index. A rejected claim must
//! leave the index exactly as it was.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rangedb::descriptor::{
    KeySpan, NodeId, RangeDescriptor, RangeId, ReplicaDescriptor, ReplicaId, StoreId,
};
use rangedb::directory::{IndexEntry, KeyIndex, ReplicaPlaceholder};
use rangedb::engine::MemEngine;
use rangedb::lifecycle::{LifecycleConfig, LifecycleCoordinator};
use rangedb::replica::ReplicaErrorKind;

// =============================================================================
// Test Utilities
// =============================================================================

fn random_span(rng: &mut StdRng) -> KeySpan {
    let start: u8 = rng.gen_range(0..40);
    let len: u8 = rng.gen_range(1..6);
    KeySpan::new(vec![start], vec![start + len]).unwrap()
}

fn assert_disjoint(entries: &[IndexEntry]) {
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            assert!(!a.span.overlaps(&b.span), "{} overlaps {}", a, b);
        }
    }
}

fn snapshot_of(entries: &[IndexEntry]) -> Vec<(RangeId, KeySpan)> {
    entries.iter().map(|e| (e.range_id, e.span.clone())).collect()
}

// =============================================================================
// KeyIndex
// =============================================================================

#[test]
fn test_random_inserts_never_overlap() {
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index = KeyIndex::new();

        for i in 0..200u64 {
            let span = random_span(&mut rng);
            let before = snapshot_of(&index.iter().cloned().collect::<Vec<_>>());
            let expected_conflict = index.find_overlap(&span).map(|e| e.range_id);

            let placeholder = Arc::new(ReplicaPlaceholder::new(RangeId(i), span));
            match index.insert(IndexEntry::placeholder(placeholder)) {
                Ok(()) => assert!(expected_conflict.is_none()),
                Err(existing) => {
                    assert_eq!(Some(existing.range_id), expected_conflict);
                    let after = snapshot_of(&index.iter().cloned().collect::<Vec<_>>());
                    assert_eq!(before, after);
                }
            }
        }

        let entries: Vec<IndexEntry> = index.iter().cloned().collect();
        assert_disjoint(&entries);
        assert!(!entries.is_empty());
    }
}

#[test]
fn test_adjacent_spans_do_not_overlap() {
    let mut index = KeyIndex::new();
    for (i, (start, end)) in [(b"a", b"c"), (b"c", b"e"), (b"e", b"g")].iter().enumerate() {
        let span = KeySpan::new(start.to_vec(), end.to_vec()).unwrap();
        let placeholder = Arc::new(ReplicaPlaceholder::new(RangeId(i as u64), span));
        index.insert(IndexEntry::placeholder(placeholder)).unwrap();
    }
    assert_eq!(index.len(), 3);
    assert_eq!(index.lookup(b"c").unwrap().range_id, RangeId(1));
    assert!(index.lookup(b"g").is_none());
}

// =============================================================================
// Directory with replicas and placeholders
// =============================================================================

#[test]
fn test_mixed_claims_never_overlap() {
    let c = LifecycleCoordinator::new(Arc::new(MemEngine::new()), LifecycleConfig::propagating())
        .unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for i in 1..=120u64 {
        let range_id = RangeId(i);
        let span = random_span(&mut rng);
        let before = snapshot_of(&c.directory().key_index());

        let result = if rng.gen_bool(0.5) {
            c.directory()
                .add_placeholder(Arc::new(ReplicaPlaceholder::new(range_id, span)))
        } else {
            let (locked, created) = c
                .get_or_create_replica(range_id, ReplicaId(1), None)
                .unwrap();
            assert!(created);
            let desc = RangeDescriptor::new(
                range_id,
                span.start().to_vec(),
                span.end().to_vec(),
                vec![ReplicaDescriptor::new(NodeId(1), StoreId(1), ReplicaId(1))],
                ReplicaId(2),
            );
            c.apply_snapshot(&locked, desc)
        };

        let after = c.directory().key_index();
        match result {
            Ok(()) => assert_eq!(after.len(), before.len() + 1),
            Err(e) => {
                assert_eq!(e.kind(), ReplicaErrorKind::Overlap);
                assert_eq!(before, snapshot_of(&after));
            }
        }
        assert_disjoint(&after);
    }
}
