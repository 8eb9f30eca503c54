//! Storage error types for the backing stores
//!
//! Error codes:
//! - AERO_STORAGE_IO_ERROR (ERROR severity)
//! - AERO_STORAGE_WRITE_FAILED (ERROR severity)
//! - AERO_STORAGE_READ_FAILED (ERROR severity)
//! - AERO_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, table remains usable
    Error,
    /// Table contents can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure (create, seek, flush, remove)
    AeroStorageIoError,
    /// Record or slot write failed
    AeroStorageWriteFailed,
    /// Record or slot read failed
    AeroStorageReadFailed,
    /// Checksum or framing failure
    AeroDataCorruption,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::AeroStorageIoError => "AERO_STORAGE_IO_ERROR",
            StorageErrorCode::AeroStorageWriteFailed => "AERO_STORAGE_WRITE_FAILED",
            StorageErrorCode::AeroStorageReadFailed => "AERO_STORAGE_READ_FAILED",
            StorageErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with code, context and the underlying I/O error
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    fn new(
        code: StorageErrorCode,
        message: String,
        details: Option<String>,
        source: Option<io::Error>,
    ) -> Self {
        Self {
            code,
            message,
            details,
            source,
        }
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::AeroStorageIoError, message.into(), None, Some(source))
    }

    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::AeroStorageWriteFailed, message.into(), None, Some(source))
    }

    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::AeroStorageReadFailed, message.into(), None, Some(source))
    }

    /// Corruption with no position attached (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::AeroDataCorruption, message.into(), None, None)
    }

    /// Corruption of the record starting at `offset` in the key file
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self::new(
            StorageErrorCode::AeroDataCorruption,
            reason.into(),
            Some(format!("byte_offset: {}", offset)),
            None,
        )
    }

    /// Corruption found while resolving string `id`
    pub fn corruption_for_id(id: u32, reason: impl Into<String>) -> Self {
        Self::new(
            StorageErrorCode::AeroDataCorruption,
            reason.into(),
            Some(format!("string_id: {}", id)),
            None,
        )
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether the backing store must be considered lost
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            Some(e) => Some(e),
            None => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
