//! Dedup index error types
//!
//! Storage failures pass through unchanged. The remaining variants are
//! contract violations by the caller.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for dedup index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Dedup index errors
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Key already indexed under id {existing}")]
    DuplicateKey { existing: u32 },

    #[error("Id {id} is not the next dense id (expected {expected})")]
    NonDenseId { id: u32, expected: u32 },

    #[error("Id {id} out of range (unique count {len})")]
    IdOutOfRange { id: u32, len: u32 },
}

impl IndexError {
    /// Returns whether this error is a caller contract violation
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, IndexError::Storage(_))
    }
}
