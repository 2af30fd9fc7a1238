//! Storage engine trait definition.

use crate::error::StorageResult;
use crate::statement::{BatchStatement, StatementOutcome};
use crate::value::{RecordId, Row};
use std::path::Path;

/// A storage engine for TxVault.
///
/// Engines are the transactional substrate: they execute a list of
/// statements as **one atomic unit** and expose the handful of auxiliary
/// operations the backup and audit layers need. Engines do not retry, do
/// not classify errors beyond their own failure kinds, and keep no
/// transaction bookkeeping — that all lives above them.
///
/// # Invariants
///
/// - `apply_batch` is all-or-nothing: on any error, every table's state is
///   exactly what it was before the call
/// - `snapshot_to` writes a self-contained, self-checksummed copy of the
///   whole store that a fresh engine can open
/// - Engines must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - For testing
/// - [`super::FileEngine`] - For persistent storage
pub trait StorageEngine: Send + Sync {
    /// Executes all statements as a single atomic unit.
    ///
    /// Returns one outcome per statement, in order. Row-count assertions
    /// carried by the batch are evaluated inside the unit.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails or any assertion is violated;
    /// no table is modified in that case. `Busy` signals write-lock
    /// contention and may be retried.
    fn apply_batch(&self, batch: &[BatchStatement]) -> StorageResult<Vec<StatementOutcome>>;

    /// Reads a single record by id.
    ///
    /// Returns `None` when the table or the record does not exist. The
    /// returned row has its `id` column injected.
    ///
    /// # Errors
    ///
    /// Returns an error if the read itself fails.
    fn read_record(&self, table: &str, id: RecordId) -> StorageResult<Option<Row>>;

    /// Returns the names of all tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn table_names(&self) -> StorageResult<Vec<String>>;

    /// Returns the number of records in a table.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` when the table does not exist.
    fn count_records(&self, table: &str) -> StorageResult<u64>;

    /// Writes a consistent copy of the whole store to `path`.
    ///
    /// This is the native backup primitive: the copy reflects a single
    /// point in time and carries its own integrity checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn snapshot_to(&self, path: &Path) -> StorageResult<()>;

    /// Verifies the integrity of the persisted store.
    ///
    /// Engines without a persistent form verify their in-memory state.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` or `ChecksumMismatch` when verification fails.
    fn check_integrity(&self) -> StorageResult<()>;

    /// Returns the live store file path, when the engine has one.
    fn path(&self) -> Option<&Path>;
}
