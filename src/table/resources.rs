//! Temporary resources owned by a table
//!
//! A table owns three artifacts:
//! - a private directory for the forward store (`sst-forward-*`)
//! - a private directory for the reverse store (`sst-reverse-*`)
//! - the staged output file (`shared-string-table-*.xml`)
//!
//! All three are RAII handles from `tempfile`, so a failure halfway through
//! allocation releases whatever was already acquired. Store files inside the
//! directories are named by a random 130-bit namespace.
//!
//! The store directories are released by `release_stores` (or on drop). The
//! staged file outlives `close` and is removed on drop, unless handed over
//! with `keep_staged`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::RngCore;
use tempfile::{Builder, TempDir, TempPath};

use super::config::TableConfig;
use super::errors::{TableError, TableResult};
use crate::index::{DedupIndex, ForwardCache};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::storage::{HashIndex, StorageError, StringStore};

const NAMESPACE_BITS: usize = 130;
const NAMESPACE_ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Generates a random base-32 namespace carrying 130 bits of entropy.
pub fn generate_namespace() -> String {
    let mut bytes = [0u8; (NAMESPACE_BITS + 7) / 8];
    rand::thread_rng().fill_bytes(&mut bytes);

    (0..NAMESPACE_BITS / 5)
        .map(|digit| {
            let bit = digit * 5;
            let high = bytes[bit / 8];
            let low = bytes.get(bit / 8 + 1).copied().unwrap_or(0);
            let window = u16::from_be_bytes([high, low]);
            let value = (window >> (11 - bit % 8)) & 0x1f;
            NAMESPACE_ALPHABET[value as usize] as char
        })
        .collect()
}

/// Directories, namespaces and staged file of one table.
pub struct TableResources {
    forward_dir: Option<TempDir>,
    reverse_dir: Option<TempDir>,
    forward_namespace: String,
    reverse_namespace: String,
    staged: Option<TempPath>,
    staged_path: PathBuf,
}

impl TableResources {
    /// Allocates both store directories and the staged file.
    pub fn allocate(config: &TableConfig) -> TableResult<Self> {
        let root = config.resolved_temp_dir();

        let forward_dir = Builder::new()
            .prefix("sst-forward-")
            .tempdir_in(&root)
            .map_err(|e| TableError::init("Couldn't create forward store directory", e))?;
        let reverse_dir = Builder::new()
            .prefix("sst-reverse-")
            .tempdir_in(&root)
            .map_err(|e| TableError::init("Couldn't create reverse store directory", e))?;
        let staged = Builder::new()
            .prefix("shared-string-table-")
            .suffix(".xml")
            .tempfile_in(&root)
            .map_err(|e| TableError::init("Couldn't create staged output file", e))?
            .into_temp_path();

        Ok(Self {
            forward_dir: Some(forward_dir),
            reverse_dir: Some(reverse_dir),
            forward_namespace: generate_namespace(),
            reverse_namespace: generate_namespace(),
            staged_path: staged.to_path_buf(),
            staged: Some(staged),
        })
    }

    /// Creates the dedup index inside the store directories.
    pub fn open_index(
        &self,
        config: &TableConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> TableResult<DedupIndex> {
        let (forward_dir, reverse_dir) = match (self.forward_dir(), self.reverse_dir()) {
            (Some(f), Some(r)) => (f, r),
            _ => return Err(TableError::Closed),
        };

        let forward = HashIndex::create(
            forward_dir,
            &self.forward_namespace,
            config.initial_index_slots,
        )
        .map_err(|e| TableError::init("Couldn't create forward store", e))?;
        let reverse = StringStore::create(
            reverse_dir,
            &self.reverse_namespace,
            config.write_buffer_bytes,
        )
        .map_err(|e| TableError::init("Couldn't create reverse store", e))?;

        Ok(DedupIndex::new(
            forward,
            reverse,
            ForwardCache::new(config.forward_cache_capacity),
            metrics,
            config.read_buffer_bytes,
        ))
    }

    /// Forward store directory, `None` once released
    pub fn forward_dir(&self) -> Option<&Path> {
        self.forward_dir.as_ref().map(TempDir::path)
    }

    /// Reverse store directory, `None` once released
    pub fn reverse_dir(&self) -> Option<&Path> {
        self.reverse_dir.as_ref().map(TempDir::path)
    }

    /// Path of the staged output file
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    /// Returns whether the store directories have been released
    pub fn stores_released(&self) -> bool {
        self.forward_dir.is_none() && self.reverse_dir.is_none()
    }

    /// Removes both store directories. Later calls are no-ops.
    ///
    /// Both removals are attempted; the first failure is returned.
    pub fn release_stores(&mut self) -> TableResult<()> {
        let forward = release_dir(self.forward_dir.take());
        let reverse = release_dir(self.reverse_dir.take());
        forward.and(reverse)
    }

    /// Stops tracking the staged file so it survives the table.
    pub fn keep_staged(&mut self) -> TableResult<PathBuf> {
        match self.staged.take() {
            Some(staged) => staged
                .keep()
                .map_err(|e| TableError::StagedIo(e.error)),
            None => Ok(self.staged_path.clone()),
        }
    }
}

fn release_dir(dir: Option<TempDir>) -> TableResult<()> {
    let Some(dir) = dir else {
        return Ok(());
    };

    let path = dir.path().display().to_string();
    match dir.close() {
        Ok(()) => {
            log_event_with_fields(Event::StoreReleased, &[("path", path.as_str())]);
            Ok(())
        }
        Err(e) => {
            log_event_with_fields(
                Event::StoreReleaseFailed,
                &[("path", path.as_str()), ("error", e.to_string().as_str())],
            );
            Err(TableError::Storage(StorageError::io_error(
                format!("Failed to remove store directory: {}", path),
                e,
            )))
        }
    }
}
