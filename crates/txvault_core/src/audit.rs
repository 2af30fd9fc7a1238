//! Per-transaction audit trail.
//!
//! The audit trail records before/after row state for every mutating
//! operation, ordered by a strictly increasing per-transaction sequence
//! number. Auditing is forensic, not correctness-critical: every failure in
//! this module is logged and swallowed, and never aborts the operation
//! being audited.
//!
//! Entries are appended to a durable JSON-lines log (one entry per line)
//! and to an in-memory buffer consumed by the transaction summary.

use crate::error::CoreResult;
use crate::operation::OperationKind;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::warn;
use txvault_storage::{RecordId, Row};

/// One recorded mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The transaction this entry belongs to.
    pub transaction_id: String,
    /// Strictly increasing per-transaction sequence number, starting at 1.
    pub sequence: u64,
    /// Table touched.
    pub table: String,
    /// Operation classification.
    pub kind: OperationKind,
    /// Targeted record, when addressable.
    pub record_id: Option<RecordId>,
    /// Row state before the operation.
    pub old_row: Option<Row>,
    /// Row state after the operation.
    pub new_row: Option<Row>,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AuditState {
    /// Next sequence number per transaction. Entries are never reused:
    /// the counter survives for the life of the trail.
    sequences: HashMap<String, u64>,
    /// Buffered entries per in-flight transaction.
    entries: HashMap<String, Vec<AuditEntry>>,
}

/// Records an ordered, per-transaction log of before/after row state.
#[derive(Debug)]
pub struct AuditTrail {
    log_path: Option<PathBuf>,
    state: Mutex<AuditState>,
}

impl AuditTrail {
    /// Creates a trail appending to the given JSON-lines log.
    #[must_use]
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path: Some(log_path),
            state: Mutex::new(AuditState::default()),
        }
    }

    /// Creates a trail with no durable log (in-memory only).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            log_path: None,
            state: Mutex::new(AuditState::default()),
        }
    }

    /// Records one mutation.
    ///
    /// Assigns the next sequence number for the transaction, buffers the
    /// entry, and appends it to the durable log. Log failures are warned
    /// about and swallowed.
    pub fn record(
        &self,
        transaction_id: &str,
        table: &str,
        kind: OperationKind,
        record_id: Option<RecordId>,
        old_row: Option<Row>,
        new_row: Option<Row>,
    ) {
        let entry = {
            let mut state = self.state.lock();
            let sequence = state
                .sequences
                .entry(transaction_id.to_string())
                .or_insert(0);
            *sequence += 1;

            let entry = AuditEntry {
                transaction_id: transaction_id.to_string(),
                sequence: *sequence,
                table: table.to_string(),
                kind,
                record_id,
                old_row,
                new_row,
                timestamp: Utc::now(),
            };
            state
                .entries
                .entry(transaction_id.to_string())
                .or_default()
                .push(entry.clone());
            entry
        };

        if let Err(err) = self.append_to_log(&entry) {
            warn!(
                transaction_id,
                sequence = entry.sequence,
                %err,
                "audit log append failed"
            );
        }
    }

    fn append_to_log(&self, entry: &AuditEntry) -> CoreResult<()> {
        let Some(path) = &self.log_path else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Returns the buffered entries for a transaction.
    #[must_use]
    pub fn entries_for(&self, transaction_id: &str) -> Vec<AuditEntry> {
        self.state
            .lock()
            .entries
            .get(transaction_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes and returns the buffered entries for a completed transaction.
    ///
    /// The sequence counter is kept so numbers are never reused.
    #[must_use]
    pub fn take_entries(&self, transaction_id: &str) -> Vec<AuditEntry> {
        self.state
            .lock()
            .entries
            .remove(transaction_id)
            .unwrap_or_default()
    }

    /// Reads every entry from the durable log.
    ///
    /// # Errors
    ///
    /// Returns an error when the log cannot be read or parsed.
    pub fn load_log(&self) -> CoreResult<Vec<AuditEntry>> {
        let Some(path) = &self.log_path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(path)?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}
