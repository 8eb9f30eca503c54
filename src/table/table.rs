//! Shared strings table
//!
//! Assigns each distinct canonical key a dense id in first-seen order and
//! serializes the whole table as an `sst` document. Both mappings spill to
//! disk, so the table's memory footprint is bounded by the forward cache and
//! the write buffer rather than by the number of strings.
//!
//! Every mutating operation takes `&mut self`; callers sharing a table across
//! threads must provide their own exclusion.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use super::config::TableConfig;
use super::counters::Counters;
use super::errors::{TableError, TableResult};
use super::fragment::Fragment;
use super::resources::TableResources;
use super::serializer::write_sst;
use crate::index::DedupIndex;
use crate::observability::{
    log_event_with_fields, Event, Logger, MetricsRegistry, MetricsSnapshot, ObservationScope,
};

/// A disk-backed, deduplicating shared strings table.
pub struct SharedStringsTable {
    table_id: Uuid,
    config: TableConfig,
    counters: Counters,
    index: Option<DedupIndex>,
    resources: TableResources,
    metrics: Arc<MetricsRegistry>,
}

impl SharedStringsTable {
    /// Opens a table with the default configuration.
    pub fn new() -> TableResult<Self> {
        Self::with_config(TableConfig::default())
    }

    /// Opens a table, allocating its backing stores and staged file.
    ///
    /// Nothing is left on disk if any step fails.
    pub fn with_config(config: TableConfig) -> TableResult<Self> {
        config.validate()?;

        let metrics = Arc::new(MetricsRegistry::new());
        let resources = TableResources::allocate(&config)?;
        let index = resources.open_index(&config, Arc::clone(&metrics))?;
        let table_id = Uuid::new_v4();

        log_event_with_fields(
            Event::TableOpen,
            &[
                ("table_id", table_id.to_string().as_str()),
                ("staged", resources.staged_path().display().to_string().as_str()),
            ],
        );

        Ok(Self {
            table_id,
            config,
            counters: Counters::default(),
            index: Some(index),
            resources,
            metrics,
        })
    }

    /// Adds one occurrence of `fragment`, returning its id.
    ///
    /// Equal canonical keys always return the same id. `count` grows on every
    /// call, `unique_count` only for keys not seen before.
    pub fn add_entry<F: Fragment + ?Sized>(&mut self, fragment: &F) -> TableResult<u32> {
        let key = fragment.canonical_key();
        self.add_key(&key)
    }

    /// Adds one occurrence of an already canonical key.
    pub fn add_key(&mut self, key: &str) -> TableResult<u32> {
        let index = self.index.as_mut().ok_or(TableError::Closed)?;

        self.counters.record_occurrence();
        self.metrics.increment_entries_added();

        if let Some(id) = index.lookup_or_none(key)? {
            self.metrics.increment_duplicates();
            return Ok(id);
        }

        let id = self.counters.next_id()?;
        index.insert_new(key, id)?;
        self.counters.record_unique();
        Ok(id)
    }

    /// Returns the id of `fragment` without recording an occurrence.
    pub fn lookup<F: Fragment + ?Sized>(&mut self, fragment: &F) -> TableResult<Option<u32>> {
        let key = fragment.canonical_key();
        Ok(self.index_mut()?.lookup_or_none(&key)?)
    }

    /// Returns the canonical key stored under `id`.
    pub fn get_by_index(&mut self, id: u32) -> TableResult<String> {
        let unique_count = self.counters.unique_count();
        let index = self.index_mut()?;
        if id >= unique_count {
            return Err(TableError::IdOutOfRange { id, unique_count });
        }
        Ok(index.get_by_index(id)?)
    }

    /// Total occurrences added, duplicates included
    pub fn count(&self) -> u64 {
        self.counters.count()
    }

    /// Number of distinct keys
    pub fn unique_count(&self) -> u32 {
        self.counters.unique_count()
    }

    /// Returns whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.index.is_none()
    }

    /// Identifier used in this table's log lines
    pub fn table_id(&self) -> Uuid {
        self.table_id
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Point-in-time copy of the table's counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Serializes the table to `sink`, returning the number of bytes written.
    ///
    /// On error the sink holds a partial document that must be discarded.
    pub fn write_to<W: Write>(&mut self, sink: W) -> TableResult<u64> {
        let counters = self.counters;
        let index = self.index_mut()?;
        let bytes = write_sst(sink, counters, index.scan()?)?;
        self.metrics.add_xml_bytes(bytes);
        Ok(bytes)
    }

    /// Serializes the table into the staged file, replacing its contents.
    pub fn commit(&mut self) -> TableResult<u64> {
        if self.is_closed() {
            return Err(TableError::Closed);
        }

        let table_id = self.table_id.to_string();
        let count = self.count().to_string();
        let unique_count = self.unique_count().to_string();
        let scope = ObservationScope::with_fields(
            "COMMIT",
            &[
                ("table_id", table_id.as_str()),
                ("count", count.as_str()),
                ("unique_count", unique_count.as_str()),
            ],
        );

        let result = match self.staged_output() {
            Ok(file) => self.write_to(file),
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                self.metrics.increment_commits();
                scope.complete_with_fields(&[("bytes", bytes.to_string().as_str())]);
                Ok(bytes)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Path of the staged output file
    pub fn staged_path(&self) -> &Path {
        self.resources.staged_path()
    }

    /// Opens the staged file for reading. The caller closes the handle.
    pub fn staged_input(&self) -> TableResult<File> {
        File::open(self.staged_path()).map_err(TableError::StagedIo)
    }

    /// Opens the staged file for writing, truncating it.
    pub fn staged_output(&self) -> TableResult<File> {
        File::create(self.staged_path()).map_err(TableError::StagedIo)
    }

    /// Hands the staged file over to the caller; it is no longer removed
    /// when the table is dropped.
    pub fn keep_staged(&mut self) -> TableResult<PathBuf> {
        self.resources.keep_staged()
    }

    /// Releases both backing stores. The staged file stays readable until
    /// the table is dropped.
    ///
    /// A second call returns `TableError::Closed`.
    pub fn close(&mut self) -> TableResult<()> {
        let mut index = self.index.take().ok_or(TableError::Closed)?;

        let cleared = index.clear().map_err(TableError::from);
        drop(index);
        let released = self.resources.release_stores();

        log_event_with_fields(
            Event::TableClose,
            &[
                ("table_id", self.table_id.to_string().as_str()),
                ("count", self.count().to_string().as_str()),
                ("unique_count", self.unique_count().to_string().as_str()),
                ("metrics", self.metrics.to_json().as_str()),
            ],
        );

        cleared.and(released)
    }

    fn index_mut(&mut self) -> TableResult<&mut DedupIndex> {
        self.index.as_mut().ok_or(TableError::Closed)
    }
}

impl Drop for SharedStringsTable {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        Logger::warn(
            Event::DropWithoutClose.as_str(),
            &[("table_id", self.table_id.to_string().as_str())],
        );
        if let Err(e) = self.close() {
            log_event_with_fields(
                Event::TableCloseFailed,
                &[
                    ("table_id", self.table_id.to_string().as_str()),
                    ("error", e.to_string().as_str()),
                ],
            );
        }
    }
}
