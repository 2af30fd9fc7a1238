//! # TxVault Storage
//!
//! Storage engine trait and implementations for TxVault.
//!
//! This crate provides:
//! - The [`StorageEngine`] trait: execute statements as one atomic unit,
//!   plus the auxiliary operations backup and audit need
//! - [`MemoryEngine`] - in-memory engine for tests
//! - [`FileEngine`] - single-file persistent engine with a checksummed
//!   envelope and atomic rewrites
//! - The typed statement vocabulary ([`Statement`], [`Filter`], [`Value`])

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod file;
mod memory;
mod statement;
mod value;

pub use engine::StorageEngine;
pub use error::{StorageError, StorageResult};
pub use file::{compute_crc32, FileEngine, STORE_MAGIC, STORE_VERSION};
pub use memory::{MemoryEngine, DEFAULT_BUSY_TIMEOUT};
pub use statement::{BatchStatement, Statement, StatementOutcome};
pub use value::{row, Filter, RecordId, Row, Value};
