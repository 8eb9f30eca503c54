//! Metrics registry for a shared strings table
//!
//! - Counters only, monotonic
//! - Exact values, no sampling
//! - Atomic increments so a registry can be shared with a reporter thread

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one table instance
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// `add_entry` calls
    entries_added: AtomicU64,
    /// `add_entry` calls that resolved to an existing id
    duplicates: AtomicU64,
    /// Forward lookups answered by the in-memory cache
    cache_hits: AtomicU64,
    /// Forward lookups that went to disk
    cache_misses: AtomicU64,
    /// Entries dropped from the forward cache (still on disk)
    cache_evictions: AtomicU64,
    /// Slot batches read from the forward index file
    disk_slot_reads: AtomicU64,
    /// Forward index rehashes
    index_grows: AtomicU64,
    /// Encoded key bytes appended to the reverse store
    key_bytes_spilled: AtomicU64,
    /// Successful commits
    commits: AtomicU64,
    /// Bytes of XML written by `write_to`/`commit`
    xml_bytes_written: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `add_entry` calls
    pub fn increment_entries_added(&self) {
        self.entries_added.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment duplicate entries
    pub fn increment_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cache hits
    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cache misses
    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Add entries dropped from the forward cache
    pub fn add_cache_evictions(&self, evictions: u64) {
        self.cache_evictions.fetch_add(evictions, Ordering::Relaxed);
    }

    /// Add slot batches read from disk
    pub fn add_disk_slot_reads(&self, reads: u64) {
        self.disk_slot_reads.fetch_add(reads, Ordering::Relaxed);
    }

    /// Add forward index rehashes
    pub fn add_index_grows(&self, grows: u64) {
        self.index_grows.fetch_add(grows, Ordering::Relaxed);
    }

    /// Add bytes appended to the reverse store
    pub fn add_key_bytes(&self, bytes: u64) {
        self.key_bytes_spilled.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Increment commits
    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Add bytes of serialized XML
    pub fn add_xml_bytes(&self, bytes: u64) {
        self.xml_bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_added: self.entries_added.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
            disk_slot_reads: self.disk_slot_reads.load(Ordering::Relaxed),
            index_grows: self.index_grows.load(Ordering::Relaxed),
            key_bytes_spilled: self.key_bytes_spilled.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            xml_bytes_written: self.xml_bytes_written.load(Ordering::Relaxed),
        }
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub entries_added: u64,
    pub duplicates: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub disk_slot_reads: u64,
    pub index_grows: u64,
    pub key_bytes_spilled: u64,
    pub commits: u64,
    pub xml_bytes_written: u64,
}
