//! Dedup Invariant Tests
//!
//! Tests for:
//! - Equal keys always resolve to the same id
//! - Ids are dense and assigned in first-seen order
//! - Forward and reverse mappings are inverses
//! - `count >= unique_count`, `count` grows by one per add
//! - Mappings stay exact once the cache and initial slots overflow

use std::collections::HashSet;

use spillsst::{PlainText, SharedStringsTable, TableConfig, TableError};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_root() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// A table small enough that every structure spills almost immediately.
fn spilling_table(root: &TempDir) -> SharedStringsTable {
    let config = TableConfig {
        forward_cache_capacity: 4,
        initial_index_slots: 2,
        write_buffer_bytes: 64,
        read_buffer_bytes: 32,
        ..TableConfig::in_dir(root.path())
    };
    SharedStringsTable::with_config(config).unwrap()
}

fn key(i: usize) -> String {
    format!("<t>cell {}</t>", i)
}

// =============================================================================
// Idempotent dedup
// =============================================================================

#[test]
fn test_repeated_key_returns_same_id() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);

    let first = table.add_entry(&PlainText::new("Total")).unwrap();
    for _ in 0..10 {
        table.add_key("<t>other</t>").unwrap();
        assert_eq!(table.add_entry(&PlainText::new("Total")).unwrap(), first);
    }

    assert_eq!(table.unique_count(), 2);
    assert_eq!(table.count(), 21);
    table.close().unwrap();
}

#[test]
fn test_whitespace_is_part_of_the_key() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);

    let plain = table.add_entry(&PlainText::new("x")).unwrap();
    let padded = table.add_entry(&PlainText::new("x ")).unwrap();

    assert_ne!(plain, padded);
    assert_eq!(table.unique_count(), 2);
    table.close().unwrap();
}

// =============================================================================
// Dense ids
// =============================================================================

#[test]
fn test_ids_are_dense_in_first_seen_order() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);

    let mut seen = HashSet::new();
    for round in 0..3 {
        for i in 0..200 {
            let id = table.add_key(&key(i)).unwrap();
            if round == 0 {
                assert_eq!(id, i as u32);
            }
            seen.insert(id);
        }
    }

    assert_eq!(seen.len(), 200);
    assert_eq!(seen, (0..200u32).collect::<HashSet<_>>());
    table.close().unwrap();
}

// =============================================================================
// Mapping inverse law
// =============================================================================

#[test]
fn test_forward_and_reverse_are_inverse_after_spilling() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);

    for i in 0..1000 {
        table.add_key(&key(i)).unwrap();
    }

    for id in 0..table.unique_count() {
        let k = table.get_by_index(id).unwrap();
        assert_eq!(k, key(id as usize));
        assert_eq!(table.lookup(k.as_str()).unwrap(), Some(id));
    }

    let metrics = table.metrics();
    assert!(metrics.index_grows > 0);
    assert!(metrics.cache_misses > 0);
    table.close().unwrap();
}

#[test]
fn test_unknown_key_is_absent() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);

    for i in 0..50 {
        table.add_key(&key(i)).unwrap();
    }

    assert_eq!(table.lookup(key(50).as_str()).unwrap(), None);
    assert_eq!(table.unique_count(), 50);
    table.close().unwrap();
}

#[test]
fn test_out_of_range_id_is_contract_violation() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);
    table.add_key("<t>a</t>").unwrap();

    let err = table.get_by_index(7).unwrap_err();
    assert!(matches!(err, TableError::IdOutOfRange { id: 7, .. }));
    assert!(err.is_contract_violation());
    table.close().unwrap();
}

// =============================================================================
// Count monotonicity
// =============================================================================

#[test]
fn test_count_grows_by_one_per_add() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);

    let keys = ["a", "b", "a", "c", "b", "a"];
    for (i, k) in keys.iter().enumerate() {
        let before = table.count();
        table.add_key(k).unwrap();
        assert_eq!(table.count(), before + 1);
        assert_eq!(table.count(), i as u64 + 1);
        assert!(table.count() >= table.unique_count() as u64);
    }

    assert_eq!(table.unique_count(), 3);
    let metrics = table.metrics();
    assert_eq!(metrics.entries_added, 6);
    assert_eq!(metrics.duplicates, 3);
    table.close().unwrap();
}

#[test]
fn test_lookup_is_side_effect_free() {
    let root = create_temp_root();
    let mut table = spilling_table(&root);
    table.add_key("a").unwrap();

    for _ in 0..5 {
        table.lookup("a").unwrap();
        table.lookup("missing").unwrap();
    }

    assert_eq!(table.count(), 1);
    assert_eq!(table.unique_count(), 1);
    table.close().unwrap();
}
