//! Occurrence counters
//!
//! `count` includes duplicates; `unique_count` is the number of distinct
//! keys and therefore also the next id to assign.

use super::errors::{TableError, TableResult};

/// Highest number of distinct strings a table can hold.
///
/// The forward index stores `id + 1` in a u32, so the top id is reserved.
pub const MAX_UNIQUE_STRINGS: u32 = u32::MAX - 1;

/// Monotonic total and unique counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    count: u64,
    unique_count: u32,
}

impl Counters {
    /// Total `add_entry` calls, duplicates included
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Distinct keys seen so far
    pub fn unique_count(&self) -> u32 {
        self.unique_count
    }

    /// Records one occurrence, duplicate or not.
    pub fn record_occurrence(&mut self) {
        self.count += 1;
    }

    /// Returns the id the next distinct key will receive.
    pub fn next_id(&self) -> TableResult<u32> {
        if self.unique_count >= MAX_UNIQUE_STRINGS {
            return Err(TableError::CapacityExceeded {
                limit: MAX_UNIQUE_STRINGS,
            });
        }
        Ok(self.unique_count)
    }

    /// Records that the id from `next_id` has been assigned.
    pub fn record_unique(&mut self) {
        self.unique_count += 1;
        debug_assert!(self.count >= self.unique_count as u64);
    }
}
