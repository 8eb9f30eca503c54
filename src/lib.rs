//! spillsst - A disk-spilling, deduplicating shared strings table
//!
//! Collects canonical string keys, assigns each distinct key a dense id and
//! streams the result out as a SpreadsheetML `sst` document.

pub mod index;
pub mod observability;
pub mod storage;
pub mod table;

pub use table::{
    Fragment, PlainText, SharedStringsTable, TableConfig, TableError, TableResult,
    SPREADSHEETML_NAMESPACE,
};
