//! Fault-injecting storage engine wrapper.
//!
//! Wraps any [`StorageEngine`] and fails batches on cue: a scripted queue
//! of one-shot errors, a permanent busy mode, or a fail-after-N trigger.
//! Reads and auxiliary operations pass through untouched.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use txvault_storage::{
    BatchStatement, RecordId, Row, StatementOutcome, StorageEngine, StorageError, StorageResult,
};

/// A storage engine that fails on demand.
pub struct FaultEngine {
    inner: Arc<dyn StorageEngine>,
    scripted: Mutex<VecDeque<StorageError>>,
    always_busy: AtomicBool,
    fail_after_batches: AtomicUsize,
    batches_attempted: AtomicUsize,
    batches_applied: AtomicUsize,
}

impl FaultEngine {
    /// Wraps an engine with no faults armed.
    pub fn new(inner: Arc<dyn StorageEngine>) -> Self {
        Self {
            inner,
            scripted: Mutex::new(VecDeque::new()),
            always_busy: AtomicBool::new(false),
            fail_after_batches: AtomicUsize::new(usize::MAX),
            batches_attempted: AtomicUsize::new(0),
            batches_applied: AtomicUsize::new(0),
        }
    }

    /// Queues a one-shot error; the next batch consumes it.
    pub fn script_failure(&self, error: StorageError) {
        self.scripted.lock().push_back(error);
    }

    /// Makes every batch fail with `Busy` until [`reset`](Self::reset).
    pub fn always_busy(&self) {
        self.always_busy.store(true, Ordering::SeqCst);
    }

    /// Lets `n` batches through, then fails every one with `Busy`.
    pub fn fail_after(&self, n: usize) {
        self.fail_after_batches.store(n, Ordering::SeqCst);
    }

    /// Clears every armed fault and the counters.
    pub fn reset(&self) {
        self.scripted.lock().clear();
        self.always_busy.store(false, Ordering::SeqCst);
        self.fail_after_batches.store(usize::MAX, Ordering::SeqCst);
        self.batches_attempted.store(0, Ordering::SeqCst);
        self.batches_applied.store(0, Ordering::SeqCst);
    }

    /// Batches submitted, including failed ones.
    #[must_use]
    pub fn batches_attempted(&self) -> usize {
        self.batches_attempted.load(Ordering::SeqCst)
    }

    /// Batches that reached the inner engine and succeeded.
    #[must_use]
    pub fn batches_applied(&self) -> usize {
        self.batches_applied.load(Ordering::SeqCst)
    }
}

impl StorageEngine for FaultEngine {
    fn apply_batch(&self, batch: &[BatchStatement]) -> StorageResult<Vec<StatementOutcome>> {
        let attempt = self.batches_attempted.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }
        if self.always_busy.load(Ordering::SeqCst)
            || attempt >= self.fail_after_batches.load(Ordering::SeqCst)
        {
            return Err(StorageError::Busy { waited_ms: 1 });
        }

        let outcomes = self.inner.apply_batch(batch)?;
        self.batches_applied.fetch_add(1, Ordering::SeqCst);
        Ok(outcomes)
    }

    fn read_record(&self, table: &str, id: RecordId) -> StorageResult<Option<Row>> {
        self.inner.read_record(table, id)
    }

    fn table_names(&self) -> StorageResult<Vec<String>> {
        self.inner.table_names()
    }

    fn count_records(&self, table: &str) -> StorageResult<u64> {
        self.inner.count_records(table)
    }

    fn snapshot_to(&self, path: &Path) -> StorageResult<()> {
        self.inner.snapshot_to(path)
    }

    fn check_integrity(&self) -> StorageResult<()> {
        self.inner.check_integrity()
    }

    fn path(&self) -> Option<&Path> {
        self.inner.path()
    }
}
