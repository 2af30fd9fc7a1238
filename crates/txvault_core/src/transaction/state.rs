//! Transaction state and terminal summaries.

use crate::operation::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created but not yet executing.
    Pending,
    /// Currently executing (possibly between retries).
    Active,
    /// All operations applied and durable.
    Committed,
    /// Abandoned; compensations were attempted.
    RolledBack,
    /// Terminated by a fatal error or exhausted retries.
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Active => "active",
            TransactionStatus::Committed => "committed",
            TransactionStatus::RolledBack => "rolled_back",
            TransactionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Requested isolation level.
///
/// The bundled engines serialize writers, so every level executes with
/// serializable semantics; the level is recorded for the caller's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Reads may observe uncommitted writes.
    ReadUncommitted,
    /// Reads observe only committed writes.
    ReadCommitted,
    /// Reads are repeatable within the transaction.
    RepeatableRead,
    /// Full serializability.
    #[default]
    Serializable,
}

/// An in-flight transaction tracked by the coordinator's registry.
#[derive(Debug)]
pub struct Transaction {
    /// Unique id derived from time and the calling thread.
    pub id: String,
    /// Current status.
    pub status: TransactionStatus,
    /// Requested isolation level.
    pub isolation: IsolationLevel,
    /// Ordered operations.
    pub operations: Vec<Operation>,
    /// Retries performed so far.
    pub retry_count: u32,
    /// Retry budget.
    pub max_retries: u32,
    /// Wall-clock budget.
    pub timeout: Duration,
    /// Monotonic start instant for timeout accounting.
    pub start: Instant,
    /// Wall-clock start for summaries.
    pub started_at: DateTime<Utc>,
    /// Last observed error, if any.
    pub last_error: Option<String>,
}

impl Transaction {
    /// Creates a new pending transaction.
    #[must_use]
    pub fn new(
        id: String,
        isolation: IsolationLevel,
        operations: Vec<Operation>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            id,
            status: TransactionStatus::Pending,
            isolation,
            operations,
            retry_count: 0,
            max_retries,
            timeout,
            start: Instant::now(),
            started_at: Utc::now(),
            last_error: None,
        }
    }

    /// Elapsed wall-clock time since the transaction started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// True once the wall-clock budget is exhausted.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.elapsed() > self.timeout
    }

    /// Builds the terminal summary for the history log.
    #[must_use]
    pub fn summary(&self, finished_at: DateTime<Utc>) -> TransactionSummary {
        TransactionSummary {
            transaction_id: self.id.clone(),
            status: self.status,
            isolation: self.isolation,
            started_at: self.started_at,
            finished_at,
            retry_count: self.retry_count,
            operation_count: self.operations.len(),
            error: self.last_error.clone(),
        }
    }
}

/// Terminal record of a transaction, kept in the bounded history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// The transaction's id.
    pub transaction_id: String,
    /// Terminal status.
    pub status: TransactionStatus,
    /// Isolation level the transaction ran under.
    pub isolation: IsolationLevel,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// When the terminal status was reached.
    pub finished_at: DateTime<Utc>,
    /// Retries performed.
    pub retry_count: u32,
    /// Number of operations submitted.
    pub operation_count: usize,
    /// Last observed error for failed transactions.
    pub error: Option<String>,
}
