//! Shared strings table subsystem
//!
//! # Design Principles
//!
//! - Keys are canonical XML fragments, compared and emitted verbatim
//! - Ids are dense and assigned in first-seen order
//! - Both mappings spill to disk; memory stays bounded
//! - Output is streamed, never materialized
//!
//! # Lifecycle
//!
//! ```ignore
//! use spillsst::{PlainText, SharedStringsTable};
//!
//! let mut table = SharedStringsTable::new()?;
//! table.add_entry(&PlainText::new("Revenue"))?;
//! table.commit()?;
//! let xml = table.staged_input()?;
//! table.close()?;
//! ```

mod config;
mod counters;
mod errors;
mod fragment;
mod resources;
mod serializer;
mod table;

pub use config::TableConfig;
pub use counters::{Counters, MAX_UNIQUE_STRINGS};
pub use errors::{TableError, TableResult};
pub use fragment::{Fragment, PlainText};
pub use resources::generate_namespace;
pub use serializer::{write_sst, SPREADSHEETML_NAMESPACE};
pub use table::SharedStringsTable;
