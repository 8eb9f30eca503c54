//! Table configuration
//!
//! Storage placement and cache/buffer sizing for a shared strings table.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::{TableError, TableResult};

/// Shared strings table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Directory for backing stores and the staged file (default: OS temp dir)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Forward cache entries kept in memory; 0 disables the cache (default: 65536)
    #[serde(default = "default_forward_cache_capacity")]
    pub forward_cache_capacity: usize,

    /// Initial forward index slots, a power of two (default: 65536)
    #[serde(default = "default_initial_index_slots")]
    pub initial_index_slots: u64,

    /// Reverse store staging buffer in bytes (default: 64 KiB)
    #[serde(default = "default_write_buffer_bytes")]
    pub write_buffer_bytes: usize,

    /// Read buffer for serialization scans in bytes (default: 64 KiB)
    #[serde(default = "default_read_buffer_bytes")]
    pub read_buffer_bytes: usize,
}

fn default_forward_cache_capacity() -> usize {
    65536
}

fn default_initial_index_slots() -> u64 {
    65536
}

fn default_write_buffer_bytes() -> usize {
    64 * 1024
}

fn default_read_buffer_bytes() -> usize {
    64 * 1024
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            forward_cache_capacity: default_forward_cache_capacity(),
            initial_index_slots: default_initial_index_slots(),
            write_buffer_bytes: default_write_buffer_bytes(),
            read_buffer_bytes: default_read_buffer_bytes(),
        }
    }
}

impl TableConfig {
    /// Create a default config rooted at `temp_dir`
    pub fn in_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(temp_dir.into()),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> TableResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TableError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Directory the table allocates its files in
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Check sizing constraints
    pub fn validate(&self) -> TableResult<()> {
        if self.initial_index_slots < 2 || !self.initial_index_slots.is_power_of_two() {
            return Err(TableError::InvalidConfig(format!(
                "initial_index_slots must be a power of two >= 2, got {}",
                self.initial_index_slots
            )));
        }
        if self.write_buffer_bytes == 0 {
            return Err(TableError::InvalidConfig(
                "write_buffer_bytes must be non-zero".to_string(),
            ));
        }
        if self.read_buffer_bytes == 0 {
            return Err(TableError::InvalidConfig(
                "read_buffer_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
