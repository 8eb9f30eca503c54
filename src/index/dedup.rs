//! Dedup index: a bijection between canonical keys and dense ids
//!
//! Owns the forward store (`HashIndex`), the reverse store (`StringStore`)
//! and the forward cache. A key is appended to the reverse store first and
//! then linked from the forward store; if linking fails the append is rolled
//! back, so a key is never visible from one side only.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::cache::ForwardCache;
use super::errors::{IndexError, IndexResult};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::storage::{HashIndex, InsertOutcome, StringScan, StringStore};

/// Forward and reverse mappings kept in lockstep.
pub struct DedupIndex {
    forward: HashIndex,
    reverse: StringStore,
    cache: ForwardCache,
    metrics: Arc<MetricsRegistry>,
    read_buffer: usize,
}

impl DedupIndex {
    /// Assembles an index from two freshly created, empty stores.
    pub fn new(
        forward: HashIndex,
        reverse: StringStore,
        cache: ForwardCache,
        metrics: Arc<MetricsRegistry>,
        read_buffer: usize,
    ) -> Self {
        debug_assert!(forward.is_empty() && reverse.is_empty());
        Self {
            forward,
            reverse,
            cache,
            metrics,
            read_buffer,
        }
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> u32 {
        self.reverse.len()
    }

    /// Returns whether no key has been inserted.
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Returns the id assigned to `key`, if any. No side effects on contents.
    pub fn lookup_or_none(&mut self, key: &str) -> IndexResult<Option<u32>> {
        if self.cache.is_enabled() {
            let evicted_before = self.cache.evicted();
            let cached = self.cache.get(key);
            self.record_evictions(evicted_before);
            if let Some(id) = cached {
                self.metrics.increment_cache_hits();
                return Ok(Some(id));
            }
        }
        self.metrics.increment_cache_misses();

        let hash = key_hash(key);
        let slot_reads_before = self.forward.disk_slot_reads();
        let reverse = &mut self.reverse;
        let found = self
            .forward
            .lookup(hash, |candidate| Ok(reverse.get(candidate)?.as_deref() == Some(key)));
        self.metrics
            .add_disk_slot_reads(self.forward.disk_slot_reads() - slot_reads_before);

        let found = found?;
        if let Some(id) = found {
            self.cache_insert(key, id);
        }
        Ok(found)
    }

    /// Inserts a new key under `id`, which must be the next dense id.
    ///
    /// Inserting a key that is already present is a contract violation and
    /// leaves both mappings untouched.
    pub fn insert_new(&mut self, key: &str, id: u32) -> IndexResult<()> {
        let expected = self.reverse.len();
        if id != expected {
            return Err(IndexError::NonDenseId { id, expected });
        }
        let evicted_before = self.cache.evicted();
        let cached = self.cache.get(key);
        self.record_evictions(evicted_before);
        if let Some(existing) = cached {
            return Err(IndexError::DuplicateKey { existing });
        }

        let written = self.reverse.append(id, key)?;

        let hash = key_hash(key);
        let slot_reads_before = self.forward.disk_slot_reads();
        let grows_before = self.forward.grows();
        let reverse = &mut self.reverse;
        let outcome = self.forward.insert(hash, id, |candidate| {
            Ok(candidate != id && reverse.get(candidate)?.as_deref() == Some(key))
        });
        self.metrics
            .add_disk_slot_reads(self.forward.disk_slot_reads() - slot_reads_before);
        let grown = self.forward.grows() - grows_before;
        if grown > 0 {
            self.metrics.add_index_grows(grown);
            log_event_with_fields(
                Event::ForwardIndexGrow,
                &[("slots", self.forward.capacity().to_string().as_str())],
            );
        }

        match outcome {
            Ok(InsertOutcome::Inserted) => {
                self.metrics.add_key_bytes(written as u64);
                self.cache_insert(key, id);
                Ok(())
            }
            Ok(InsertOutcome::Existing(existing)) => {
                self.rollback(id);
                Err(IndexError::DuplicateKey { existing })
            }
            Err(e) => {
                self.rollback(id);
                Err(e.into())
            }
        }
    }

    /// Returns the key stored under `id`.
    pub fn get_by_index(&mut self, id: u32) -> IndexResult<String> {
        let len = self.reverse.len();
        self.reverse
            .get(id)?
            .ok_or(IndexError::IdOutOfRange { id, len })
    }

    /// Streams every key in ascending id order.
    pub fn scan(&mut self) -> IndexResult<StringScan> {
        Ok(self.reverse.scan(self.read_buffer)?)
    }

    /// Drops every entry from both mappings and the cache.
    pub fn clear(&mut self) -> IndexResult<()> {
        self.cache.clear();
        self.forward.clear()?;
        self.reverse.clear()?;
        Ok(())
    }

    fn cache_insert(&mut self, key: &str, id: u32) {
        let evicted_before = self.cache.evicted();
        self.cache.insert(key.to_owned(), id);
        self.record_evictions(evicted_before);
    }

    fn record_evictions(&self, evicted_before: u64) {
        let evicted = self.cache.evicted() - evicted_before;
        if evicted > 0 {
            self.metrics.add_cache_evictions(evicted);
        }
    }

    fn rollback(&mut self, id: u32) {
        if let Err(e) = self.reverse.truncate(id) {
            log_event_with_fields(
                Event::ReverseRollbackFailed,
                &[("id", id.to_string().as_str()), ("error", e.to_string().as_str())],
            );
        }
    }
}

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}
