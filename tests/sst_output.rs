//! SST Output Tests
//!
//! Tests for the serialized document:
//! - Exact header, root and item layout
//! - Self-closed root for an empty table
//! - Attribute values reflect counters at serialization time
//! - Commit replaces the staged file each time

use std::fs;
use std::io::Read;

use spillsst::{SharedStringsTable, TableConfig, SPREADSHEETML_NAMESPACE};
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

fn render(table: &mut SharedStringsTable) -> String {
    let mut out = Vec::new();
    table.write_to(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

// =============================================================================
// Document shape
// =============================================================================

#[test]
fn test_two_unique_of_three() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    table.add_key("A").unwrap();
    table.add_key("B").unwrap();
    table.add_key("A").unwrap();

    assert_eq!(table.count(), 3);
    assert_eq!(table.unique_count(), 2);
    assert_eq!(
        render(&mut table),
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n\
             <sst count=\"3\" uniqueCount=\"2\" xmlns=\"{}\">\
             <si>A</si><si>B</si></sst>",
            SPREADSHEETML_NAMESPACE
        )
    );
    table.close().unwrap();
}

#[test]
fn test_empty_table_has_self_closed_root() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    let xml = render(&mut table);
    assert!(xml.ends_with(&format!(
        "<sst count=\"0\" uniqueCount=\"0\" xmlns=\"{}\"/>",
        SPREADSHEETML_NAMESPACE
    )));
    assert!(!xml.contains("<si>"));
    assert!(!xml.contains("</sst>"));
    table.close().unwrap();
}

#[test]
fn test_keys_are_emitted_verbatim_in_id_order() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    let keys = [
        "<t>z</t>",
        r#"<t xml:space="preserve"> lead</t>"#,
        "<r><t>rich</t></r>",
        "<t>a &amp; b</t>",
    ];
    for k in keys {
        table.add_key(k).unwrap();
    }

    let xml = render(&mut table);
    let body: String = keys.iter().map(|k| format!("<si>{}</si>", k)).collect();
    assert!(xml.ends_with(&format!("{}</sst>", body)));
    table.close().unwrap();
}

#[test]
fn test_large_table_streams_from_disk() {
    let root = create_temp_root();
    let config = TableConfig {
        forward_cache_capacity: 16,
        initial_index_slots: 8,
        write_buffer_bytes: 256,
        read_buffer_bytes: 128,
        ..TableConfig::in_dir(root.path())
    };
    let mut table = SharedStringsTable::with_config(config).unwrap();

    for i in 0..2000 {
        table.add_key(&format!("<t>{}</t>", i)).unwrap();
    }

    let xml = render(&mut table);
    assert_eq!(xml.matches("<si>").count(), 2000);
    assert!(xml.contains("<si><t>0</t></si><si><t>1</t></si>"));
    assert!(xml.ends_with("<si><t>1999</t></si></sst>"));
    table.close().unwrap();
}

// =============================================================================
// Commit
// =============================================================================

#[test]
fn test_commit_overwrites_staged_file() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    table.add_key("first").unwrap();
    table.add_key("second").unwrap();
    table.commit().unwrap();
    let before = fs::read_to_string(table.staged_path()).unwrap();
    assert!(before.contains("uniqueCount=\"2\""));

    table.add_key("first").unwrap();
    table.commit().unwrap();
    let after = fs::read_to_string(table.staged_path()).unwrap();

    assert!(after.contains("count=\"3\" uniqueCount=\"2\""));
    assert_eq!(after.matches("<si>").count(), 2);
    assert_eq!(table.metrics().commits, 2);
    table.close().unwrap();
}

#[test]
fn test_staged_input_matches_write_to() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    table.add_key("<t>x</t>").unwrap();
    table.commit().unwrap();

    let mut staged = String::new();
    table
        .staged_input()
        .unwrap()
        .read_to_string(&mut staged)
        .unwrap();
    assert_eq!(staged, render(&mut table));
    table.close().unwrap();
}

#[test]
fn test_empty_commit_writes_empty_document() {
    let root = create_temp_root();
    let mut table = open_table(&root);

    table.commit().unwrap();

    let staged = fs::read_to_string(table.staged_path()).unwrap();
    assert!(staged.ends_with("uniqueCount=\"0\" xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"/>"));
    table.close().unwrap();
}
