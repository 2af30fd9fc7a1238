//! Error types for TxVault core.

use std::io;
use thiserror::Error;
use txvault_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in TxVault core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backup metadata document could not be read or written.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// A transaction exceeded its wall-clock budget.
    #[error("transaction {transaction_id} timed out after {elapsed_ms} ms")]
    TimedOut {
        /// The transaction that ran out of time.
        transaction_id: String,
        /// Elapsed wall-clock time when the timeout was detected.
        elapsed_ms: u64,
    },

    /// A transaction exhausted its retries or hit a fatal condition.
    #[error("transaction {transaction_id} failed: {source}")]
    TransactionFailed {
        /// The failed transaction.
        transaction_id: String,
        /// The last observed error.
        #[source]
        source: Box<CoreError>,
    },

    /// No backup with this id exists in the metadata document.
    #[error("backup not found: {backup_id}")]
    BackupNotFound {
        /// The requested backup id.
        backup_id: String,
    },

    /// The backup is not in a restorable status.
    #[error("backup {backup_id} is not restorable (status: {status})")]
    BackupNotRestorable {
        /// The requested backup id.
        backup_id: String,
        /// The status that blocked the restore.
        status: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true when a retry with backoff may succeed.
    ///
    /// Lock contention and transient storage I/O are retryable; constraint
    /// violations, corruption, timeouts, and refusals are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true when the error signals storage lock contention.
    ///
    /// This is the class that triggers deadlock detection before backoff.
    #[must_use]
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, CoreError::Storage(StorageError::Busy { .. }))
    }

    /// Returns true when retrying is pointless: the failure is deterministic.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_retryable_lock_contention() {
        let err = CoreError::Storage(StorageError::Busy { waited_ms: 10 });
        assert!(err.is_retryable());
        assert!(err.is_lock_contention());
    }

    #[test]
    fn io_is_retryable_but_not_lock_contention() {
        let err = CoreError::Storage(StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            "disk hiccup",
        )));
        assert!(err.is_retryable());
        assert!(!err.is_lock_contention());
    }

    #[test]
    fn constraint_violations_are_fatal() {
        let err = CoreError::Storage(StorageError::constraint("users", "duplicate id 1"));
        assert!(err.is_fatal());
        let err = CoreError::Storage(StorageError::RowCountMismatch {
            table: "users".into(),
            expected: 1,
            actual: 0,
        });
        assert!(err.is_fatal());
    }

    #[test]
    fn timeout_is_fatal() {
        let err = CoreError::TimedOut {
            transaction_id: "txn-1".into(),
            elapsed_ms: 5000,
        };
        assert!(err.is_fatal());
    }
}
