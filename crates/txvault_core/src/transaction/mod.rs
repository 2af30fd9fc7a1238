//! Transaction coordination.
//!
//! The coordinator executes ordered operation lists as atomic units with
//! retry-and-backoff; the deadlock detector tracks table ownership and
//! mutual waits; the retry policy is the pure backoff arithmetic.

mod coordinator;
mod deadlock;
mod retry;
mod state;

pub use coordinator::{ExecuteOptions, TransactionCoordinator, TransactionReceipt};
pub use deadlock::DeadlockDetector;
pub use retry::RetryPolicy;
pub use state::{IsolationLevel, Transaction, TransactionStatus, TransactionSummary};
