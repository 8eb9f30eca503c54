//! Dedup index subsystem
//!
//! Maintains the key <-> id bijection for a shared strings table.
//!
//! # Design Principles
//!
//! - Forward mapping (key -> id) is on the hot path of every add and sits
//!   behind a bounded in-memory cache
//! - Reverse mapping (id -> key) is written once and walked once, uncached
//! - Both mappings live on disk; eviction from the cache never loses data
//!
//! # Invariants
//!
//! - Ids are dense: `[0, len)`
//! - A key is never visible from one mapping without the other

mod cache;
mod dedup;
mod errors;

pub use cache::ForwardCache;
pub use dedup::DedupIndex;
pub use errors::{IndexError, IndexResult};
