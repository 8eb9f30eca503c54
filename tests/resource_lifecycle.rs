//! Resource Lifecycle Tests
//!
//! Tests for:
//! - Store directories are removed by `close` and by drop
//! - The staged file outlives `close` and is removed on drop
//! - `keep_staged` hands the staged file over
//! - Operations after `close` fail with `Closed`
//! - Corrupted spill files surface as fatal storage errors

use std::fs;
use std::path::{Path, PathBuf};

use spillsst::storage::Severity;
use spillsst::{SharedStringsTable, TableConfig, TableError};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_root() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn open_table(root: &TempDir) -> SharedStringsTable {
    SharedStringsTable::with_config(TableConfig::in_dir(root.path())).unwrap()
}

fn entries(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn find_entry(root: &Path, prefix: &str) -> PathBuf {
    fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(prefix))
                .unwrap_or(false)
        })
        .unwrap_or_else(|| panic!("no entry starting with {}", prefix))
}

// =============================================================================
// Allocation
// =============================================================================

#[test]
fn test_open_allocates_two_stores_and_staged_file() {
    let root = create_temp_root();
    let table = open_table(&root);

    let names = entries(root.path());
    assert_eq!(names.len(), 3);
    assert!(names.iter().any(|n| n.starts_with("sst-forward-")));
    assert!(names.iter().any(|n| n.starts_with("sst-reverse-")));
    assert!(names
        .iter()
        .any(|n| n.starts_with("shared-string-table-") && n.ends_with(".xml")));
    drop(table);
}

#[test]
fn test_concurrent_tables_do_not_collide() {
    let root = create_temp_root();
    let mut a = open_table(&root);
    let mut b = open_table(&root);

    a.add_key("only in a").unwrap();
    b.add_key("only in b").unwrap();

    assert_eq!(a.lookup("only in b").unwrap(), None);
    assert_eq!(b.lookup("only in a").unwrap(), None);
    assert_ne!(a.staged_path(), b.staged_path());
    assert_ne!(a.table_id(), b.table_id());

    a.close().unwrap();
    b.close().unwrap();
}

#[test]
fn test_unusable_temp_dir_is_init_failure() {
    let root = create_temp_root();
    let missing = root.path().join("missing");

    let err = SharedStringsTable::with_config(TableConfig::in_dir(&missing))
        .err()
        .unwrap();

    assert!(matches!(err, TableError::Init { .. }));
    assert_eq!(err.severity(), Severity::Fatal);
    assert!(entries(root.path()).is_empty());
}

// =============================================================================
// Release
// =============================================================================

#[test]
fn test_close_removes_stores_and_keeps_staged_file() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    for i in 0..100 {
        table.add_key(&format!("<t>{}</t>", i)).unwrap();
    }
    table.commit().unwrap();
    table.close().unwrap();

    let names = entries(root.path());
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("shared-string-table-"));
    assert!(fs::read_to_string(table.staged_path())
        .unwrap()
        .ends_with("</sst>"));

    drop(table);
    assert!(entries(root.path()).is_empty());
}

#[test]
fn test_drop_without_close_removes_everything() {
    let root = create_temp_root();
    {
        let mut table = open_table(&root);
        table.add_key("transient").unwrap();
        table.commit().unwrap();
    }
    assert!(entries(root.path()).is_empty());
}

#[test]
fn test_keep_staged_survives_drop() {
    let root = create_temp_root();
    let mut table = open_table(&root);
    table.add_key("<t>kept</t>").unwrap();
    table.commit().unwrap();
    table.close().unwrap();

    let kept = table.keep_staged().unwrap();
    drop(table);

    assert_eq!(entries(root.path()).len(), 1);
    assert!(fs::read_to_string(&kept).unwrap().contains("<si><t>kept</t></si>"));
}

// =============================================================================
// Post-close contract
// =============================================================================

#[test]
fn test_mutations_after_close_fail_fast() {
    let root = create_temp_root();
    let mut table = open_table(&root);
    table.add_key("a").unwrap();
    table.close().unwrap();

    let err = table.add_key("b").unwrap_err();
    assert!(matches!(err, TableError::Closed));
    assert!(err.is_contract_violation());
    assert!(matches!(table.commit(), Err(TableError::Closed)));
    assert!(matches!(table.close(), Err(TableError::Closed)));

    assert_eq!(table.count(), 1);
    assert_eq!(table.unique_count(), 1);
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_corrupted_reverse_store_is_fatal() {
    let root = create_temp_root();
    let config = TableConfig {
        write_buffer_bytes: 1,
        ..TableConfig::in_dir(root.path())
    };
    let mut table = SharedStringsTable::with_config(config).unwrap();

    // A one-byte buffer forces the first record to disk on the second add.
    table.add_key("<t>first</t>").unwrap();
    table.add_key("<t>second</t>").unwrap();

    let reverse_dir = find_entry(root.path(), "sst-reverse-");
    let keys_file = fs::read_dir(&reverse_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().map(|e| e == "keys").unwrap_or(false))
        .unwrap();
    let mut contents = fs::read(&keys_file).unwrap();
    contents[6] ^= 0xFF;
    fs::write(&keys_file, contents).unwrap();

    let err = table.get_by_index(0).unwrap_err();
    assert!(matches!(err, TableError::Storage(_)));
    assert_eq!(err.severity(), Severity::Fatal);

    let mut sink = Vec::new();
    assert!(table.write_to(&mut sink).is_err());
    table.close().unwrap();
}
