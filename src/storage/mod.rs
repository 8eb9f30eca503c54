//! Backing storage for the dedup index
//!
//! Both mappings of a shared strings table spill to disk here:
//! - `StringStore`: append-only key records plus a dense offset file (id -> key)
//! - `HashIndex`: open-addressing slot file keyed by key hash (key -> id)
//!
//! # Design Principles
//!
//! - Files are private to one table and created fresh (`create_new`)
//! - Checksum-verified key records; a mismatch is data corruption
//! - No fsync: the files are scratch space, not a durable database

mod checksum;
mod errors;
mod hash_index;
mod record;
mod string_store;

pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use hash_index::{HashIndex, InsertOutcome};
pub use string_store::{StringScan, StringStore};
