//! Transaction coordinator.

use crate::audit::AuditTrail;
use crate::config::CoordinatorConfig;
use crate::error::{CoreError, CoreResult};
use crate::operation::{Operation, OperationKind};
use crate::transaction::deadlock::DeadlockDetector;
use crate::transaction::retry::RetryPolicy;
use crate::transaction::state::{
    IsolationLevel, Transaction, TransactionStatus, TransactionSummary,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use txvault_storage::{
    BatchStatement, RecordId, Row, Statement, StatementOutcome, StorageEngine, Value,
};

/// Per-call execution parameters.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Requested isolation level.
    pub isolation: IsolationLevel,
    /// Wall-clock budget; checked before every attempt.
    pub timeout: std::time::Duration,
    /// Retry budget for transient failures.
    pub max_retries: u32,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::Serializable,
            timeout: std::time::Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl ExecuteOptions {
    /// Sets the isolation level.
    #[must_use]
    pub const fn isolation(mut self, value: IsolationLevel) -> Self {
        self.isolation = value;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn timeout(mut self, value: std::time::Duration) -> Self {
        self.timeout = value;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn max_retries(mut self, value: u32) -> Self {
        self.max_retries = value;
        self
    }
}

/// Result of a committed transaction.
#[derive(Debug)]
pub struct TransactionReceipt {
    /// The transaction's id.
    pub transaction_id: String,
    /// Outcome of each operation, in submission order.
    pub outcomes: Vec<StatementOutcome>,
    /// Retries that were needed before the commit.
    pub retry_count: u32,
}

/// Orchestrates atomic multi-statement transactions over a storage engine.
///
/// Each call to [`execute`](TransactionCoordinator::execute) registers the
/// transaction with the deadlock detector, runs all operations as one
/// atomic batch with retry-and-backoff on transient failures, audits
/// before/after row state, and appends a terminal summary to the bounded
/// history log. Failure leaves every touched table unchanged.
pub struct TransactionCoordinator {
    engine: Arc<dyn StorageEngine>,
    audit: Arc<AuditTrail>,
    detector: DeadlockDetector,
    retry: RetryPolicy,
    config: CoordinatorConfig,
    active: Mutex<HashMap<String, Transaction>>,
    history: Mutex<VecDeque<TransactionSummary>>,
    id_counter: AtomicU64,
}

impl TransactionCoordinator {
    /// Creates a coordinator over the given engine.
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        audit: Arc<AuditTrail>,
        config: CoordinatorConfig,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.base_delay,
            config.max_delay,
            config.deadlock_cooldown,
        );
        Self {
            engine,
            audit,
            detector: DeadlockDetector::new(),
            retry,
            config,
            active: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            id_counter: AtomicU64::new(0),
        }
    }

    /// Returns execution options seeded from the coordinator's config.
    #[must_use]
    pub fn default_options(&self) -> ExecuteOptions {
        ExecuteOptions::default()
            .timeout(self.config.timeout)
            .max_retries(self.config.max_retries)
    }

    /// Executes an ordered list of operations as one atomic transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionFailed`] carrying the last observed
    /// error when the transaction times out, hits a fatal condition, or
    /// exhausts its retries. In every failure case the touched tables are
    /// left exactly as they were before the call.
    pub fn execute(
        &self,
        operations: Vec<Operation>,
        options: ExecuteOptions,
    ) -> CoreResult<TransactionReceipt> {
        let id = self.next_transaction_id();
        let tables: BTreeSet<String> = operations.iter().filter_map(|op| op.table()).collect();
        self.detector
            .register_transaction(&id, tables.iter().cloned());

        let mut txn = Transaction::new(
            id.clone(),
            options.isolation,
            operations.clone(),
            options.timeout,
            options.max_retries,
        );
        txn.status = TransactionStatus::Active;
        let start = txn.start;
        self.active.lock().insert(id.clone(), txn);
        debug!(transaction_id = %id, operations = operations.len(), "transaction started");

        let (result, retry_count, compensated) =
            self.run_attempts(&id, &operations, &tables, &options, start);

        self.detector.unregister_transaction(&id);
        self.complete(&id, &result, retry_count, compensated);

        result.map(|outcomes| TransactionReceipt {
            transaction_id: id,
            outcomes,
            retry_count,
        })
    }

    /// Terminal summaries of the most recent transactions, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<TransactionSummary> {
        self.history.lock().iter().cloned().collect()
    }

    /// Number of transactions currently executing.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// The audit trail backing this coordinator.
    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    fn next_transaction_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut hasher = DefaultHasher::new();
        thread::current().id().hash(&mut hasher);
        let thread_tag = hasher.finish() & 0xFFFF;
        let seq = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("txn-{millis}-{thread_tag:04x}-{seq}")
    }

    fn run_attempts(
        &self,
        id: &str,
        operations: &[Operation],
        tables: &BTreeSet<String>,
        options: &ExecuteOptions,
        start: Instant,
    ) -> (CoreResult<Vec<StatementOutcome>>, u32, bool) {
        let mut attempt: u32 = 0;
        let last_error;

        loop {
            let elapsed = start.elapsed();
            if elapsed > options.timeout {
                last_error = CoreError::TimedOut {
                    transaction_id: id.to_string(),
                    elapsed_ms: elapsed.as_millis() as u64,
                };
                break;
            }

            match self.execute_once(id, operations) {
                Ok(outcomes) => {
                    self.detector.clear_wait(id);
                    return (Ok(outcomes), attempt, false);
                }
                Err(err) if err.is_fatal() => {
                    last_error = err;
                    break;
                }
                Err(err) if attempt >= options.max_retries => {
                    last_error = err;
                    break;
                }
                Err(err) => {
                    if err.is_lock_contention() {
                        let deadlocked = tables
                            .iter()
                            .any(|table| self.detector.detect_deadlock(id, table));
                        if deadlocked {
                            info!(transaction_id = %id, "deadlock detected, cooling down");
                            thread::sleep(self.retry.deadlock_cooldown);
                        } else {
                            thread::sleep(self.retry.delay(attempt));
                        }
                    } else {
                        thread::sleep(self.retry.delay(attempt));
                    }
                    debug!(transaction_id = %id, attempt, %err, "retrying transaction");
                    attempt += 1;
                }
            }
        }

        let compensated = self.run_compensations(id, operations);
        warn!(transaction_id = %id, retries = attempt, %last_error, "transaction abandoned");
        (
            Err(CoreError::TransactionFailed {
                transaction_id: id.to_string(),
                source: Box::new(last_error),
            }),
            attempt,
            compensated,
        )
    }

    /// One attempt: before-images, the atomic batch, then after-images.
    fn execute_once(
        &self,
        id: &str,
        operations: &[Operation],
    ) -> CoreResult<Vec<StatementOutcome>> {
        let old_rows: Vec<Option<Row>> = operations
            .iter()
            .map(|op| self.snapshot_before(op))
            .collect();

        let batch: Vec<BatchStatement> = operations.iter().map(BatchStatement::from).collect();
        let outcomes = self.engine.apply_batch(&batch)?;

        for ((op, outcome), old_row) in operations.iter().zip(&outcomes).zip(old_rows) {
            if !op.statement.is_mutation() {
                continue;
            }
            let Some(table) = op.table() else { continue };
            let record_id = outcome.inserted_id.or_else(|| target_record_id(op));
            let new_row = match op.kind() {
                OperationKind::Insert | OperationKind::Update => {
                    record_id.and_then(|rid| self.snapshot_row(&table, rid))
                }
                _ => None,
            };
            self.audit
                .record(id, &table, op.kind(), record_id, old_row, new_row);
        }
        Ok(outcomes)
    }

    fn snapshot_before(&self, op: &Operation) -> Option<Row> {
        if !op.statement.is_mutation() {
            return None;
        }
        let table = op.table()?;
        let record_id = target_record_id(op)?;
        self.snapshot_row(&table, record_id)
    }

    fn snapshot_row(&self, table: &str, id: RecordId) -> Option<Row> {
        match self.engine.read_record(table, id) {
            Ok(row) => row,
            Err(err) => {
                warn!(table, id, %err, "audit snapshot read failed");
                None
            }
        }
    }

    /// Runs compensating statements in reverse order, best-effort.
    fn run_compensations(&self, id: &str, operations: &[Operation]) -> bool {
        let mut attempted = false;
        for op in operations.iter().rev() {
            let Some(compensating) = &op.compensating else {
                continue;
            };
            attempted = true;
            let batch = [BatchStatement::from(compensating.clone())];
            if let Err(err) = self.engine.apply_batch(&batch) {
                warn!(transaction_id = id, %err, "compensating statement failed");
            }
        }
        attempted
    }

    /// Removes the transaction from the registry and appends its summary.
    fn complete(
        &self,
        id: &str,
        result: &CoreResult<Vec<StatementOutcome>>,
        retry_count: u32,
        compensated: bool,
    ) {
        let Some(mut txn) = self.active.lock().remove(id) else {
            return;
        };
        txn.retry_count = retry_count;
        txn.status = match result {
            Ok(_) => TransactionStatus::Committed,
            Err(_) if compensated => TransactionStatus::RolledBack,
            Err(_) => TransactionStatus::Failed,
        };
        txn.last_error = result.as_ref().err().map(|e| e.to_string());

        let summary = txn.summary(Utc::now());
        let _ = self.audit.take_entries(id);

        let mut history = self.history.lock();
        history.push_back(summary);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }
}

/// The record a mutating operation addresses, when it is a single one.
fn target_record_id(op: &Operation) -> Option<RecordId> {
    match &op.statement {
        Statement::Update { filter, .. } | Statement::Delete { filter, .. } => filter.record_id(),
        Statement::Insert { row, .. } => row.get("id").and_then(Value::as_record_id),
        _ => None,
    }
}
