//! Table error types
//!
//! Error codes:
//! - SST_INIT_FAILED (FATAL)
//! - SST_STORAGE_FAILED (ERROR, FATAL on corruption)
//! - SST_SERIALIZATION_FAILED (ERROR)
//! - SST_STAGED_IO_FAILED (ERROR)
//! - SST_TABLE_CLOSED, SST_ID_OUT_OF_RANGE, SST_DUPLICATE_KEY (contract violations)
//! - SST_CAPACITY_EXCEEDED (ERROR)
//! - SST_INVALID_CONFIG (ERROR)
//! - SST_INCONSISTENT (FATAL)

use std::io;

use thiserror::Error;

use crate::index::IndexError;
use crate::storage::{Severity, StorageError};

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// Shared strings table errors
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Initialization failed: {message}")]
    Init {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Storage failure: {0}")]
    Storage(#[source] StorageError),

    #[error("Serialization failed: {0}")]
    Serialization(#[source] io::Error),

    #[error("Staged file access failed: {0}")]
    StagedIo(#[source] io::Error),

    #[error("Table is closed")]
    Closed,

    #[error("Id {id} out of range (unique count {unique_count})")]
    IdOutOfRange { id: u32, unique_count: u32 },

    #[error("Key already present under id {existing}")]
    DuplicateKey { existing: u32 },

    #[error("Unique string limit of {limit} reached")]
    CapacityExceeded { limit: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Table state inconsistent: {0}")]
    Inconsistent(String),
}

impl TableError {
    /// Create an initialization error from any underlying cause
    pub fn init(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        TableError::Init {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            TableError::Init { .. } => "SST_INIT_FAILED",
            TableError::Storage(_) => "SST_STORAGE_FAILED",
            TableError::Serialization(_) => "SST_SERIALIZATION_FAILED",
            TableError::StagedIo(_) => "SST_STAGED_IO_FAILED",
            TableError::Closed => "SST_TABLE_CLOSED",
            TableError::IdOutOfRange { .. } => "SST_ID_OUT_OF_RANGE",
            TableError::DuplicateKey { .. } => "SST_DUPLICATE_KEY",
            TableError::CapacityExceeded { .. } => "SST_CAPACITY_EXCEEDED",
            TableError::InvalidConfig(_) => "SST_INVALID_CONFIG",
            TableError::Inconsistent(_) => "SST_INCONSISTENT",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            TableError::Init { .. } | TableError::Inconsistent(_) => Severity::Fatal,
            TableError::Storage(e) => e.severity(),
            _ => Severity::Error,
        }
    }

    /// Returns whether the caller broke the table's usage contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TableError::Closed | TableError::IdOutOfRange { .. } | TableError::DuplicateKey { .. }
        )
    }
}

impl From<StorageError> for TableError {
    fn from(err: StorageError) -> Self {
        TableError::Storage(err)
    }
}

impl From<IndexError> for TableError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Storage(e) => TableError::Storage(e),
            IndexError::DuplicateKey { existing } => TableError::DuplicateKey { existing },
            IndexError::IdOutOfRange { id, len } => TableError::IdOutOfRange {
                id,
                unique_count: len,
            },
            IndexError::NonDenseId { id, expected } => TableError::Inconsistent(format!(
                "id {} assigned while {} was expected",
                id, expected
            )),
        }
    }
}
