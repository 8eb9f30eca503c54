//! Bounded in-memory cache in front of the forward index
//!
//! Two generations give a cheap not-recently-used policy:
//! - lookups hit `hot` first, then `cold` (a cold hit is promoted)
//! - inserts go to `hot`
//! - when `hot` fills, it becomes `cold` and the previous `cold` is dropped
//! - if the two together would still exceed the capacity, `cold` is dropped
//!
//! Dropped entries are still on disk, so eviction never loses data.

use std::collections::HashMap;

/// Two-generation key -> id cache holding at most `capacity` entries.
#[derive(Debug)]
pub struct ForwardCache {
    hot: HashMap<String, u32>,
    cold: HashMap<String, u32>,
    capacity: usize,
    generation_size: usize,
    evicted: u64,
}

impl ForwardCache {
    /// Creates a cache for up to `capacity` entries. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            hot: HashMap::new(),
            cold: HashMap::new(),
            capacity,
            generation_size: capacity / 2 + capacity % 2,
            evicted: 0,
        }
    }

    /// Returns whether the cache stores anything at all.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.hot.len() + self.cold.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many entries have been dropped by rotation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Looks up `key`, promoting it if found in the cold generation.
    pub fn get(&mut self, key: &str) -> Option<u32> {
        if let Some(&id) = self.hot.get(key) {
            return Some(id);
        }
        let (key, id) = self.cold.remove_entry(key)?;
        self.insert(key, id);
        Some(id)
    }

    /// Caches `key -> id`.
    pub fn insert(&mut self, key: String, id: u32) {
        if !self.is_enabled() {
            return;
        }
        if self.hot.len() >= self.generation_size {
            self.evicted += self.cold.len() as u64;
            self.cold = std::mem::take(&mut self.hot);
        }
        if self.len() >= self.capacity {
            self.evicted += self.cold.len() as u64;
            self.cold.clear();
        }
        self.hot.insert(key, id);
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.hot.clear();
        self.cold.clear();
    }
}
