//! # TxVault Core
//!
//! Transactional-integrity and disaster-recovery engine for TxVault.
//!
//! This crate provides:
//! - [`TransactionCoordinator`] - atomic multi-statement execution with
//!   deadlock detection, retry-with-backoff, and an audit trail
//! - [`AuditTrail`] - ordered per-transaction before/after row logging
//! - [`BackupManager`] / [`BackupValidator`] - checksummed full backups
//!   and their verification
//! - [`RetentionManager`] - age/count pruning of old backups
//! - [`RecoveryCoordinator`] - restore, point-in-time recovery, health
//!   assessment, and automated disaster recovery
//! - [`schedule_automated_backups`] - a cancellable background scheduler

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod backup;
mod config;
mod error;
mod maintenance;
mod operation;
mod recovery;
mod scheduler;
mod transaction;

pub use audit::{AuditEntry, AuditTrail};
pub use backup::{
    BackupManager, BackupMetadata, BackupStatus, BackupStatusSummary, BackupType, BackupValidator,
    CleanupReport, MetadataStore, RetentionManager, ValidationReport,
};
pub use config::{BackupConfig, CoordinatorConfig, RetentionPolicy, ScheduleConfig};
pub use error::{CoreError, CoreResult};
pub use maintenance::MaintenanceLock;
pub use operation::{infer_table, Operation, OperationKind};
pub use recovery::{HealthReport, RecoveryCoordinator};
pub use scheduler::{schedule_automated_backups, BackupScheduler};
pub use transaction::{
    DeadlockDetector, ExecuteOptions, IsolationLevel, RetryPolicy, Transaction,
    TransactionCoordinator, TransactionReceipt, TransactionStatus, TransactionSummary,
};
