//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine's write lock could not be acquired in time.
    #[error("storage busy: write lock not acquired within {waited_ms} ms")]
    Busy {
        /// How long the caller waited before giving up.
        waited_ms: u64,
    },

    /// A uniqueness or integrity constraint was violated.
    #[error("constraint violation on table '{table}': {message}")]
    ConstraintViolation {
        /// The table where the violation occurred.
        table: String,
        /// Description of the violated constraint.
        message: String,
    },

    /// The referenced table does not exist.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Name of the missing table.
        table: String,
    },

    /// The engine cannot execute this statement form.
    #[error("unsupported statement: {message}")]
    UnsupportedStatement {
        /// Description of the unsupported form.
        message: String,
    },

    /// A statement affected a different number of rows than declared.
    #[error("row count mismatch on table '{table}': expected {expected}, got {actual}")]
    RowCountMismatch {
        /// The table the statement targeted.
        table: String,
        /// Declared row count.
        expected: u64,
        /// Observed row count.
        actual: u64,
    },

    /// The store file is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Checksum mismatch detected in the store file.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Encoding or decoding the store body failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a constraint violation error.
    pub fn constraint(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a table-not-found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Creates an unsupported-statement error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedStatement {
            message: message.into(),
        }
    }

    /// Returns true when the error is transient and a retry may succeed.
    ///
    /// Lock contention and plain I/O failures are transient; constraint,
    /// format, and checksum failures are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Io(_))
    }
}
