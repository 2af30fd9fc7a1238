//! In-memory storage engine.

use crate::engine::StorageEngine;
use crate::error::{StorageError, StorageResult};
use crate::statement::{BatchStatement, Statement, StatementOutcome};
use crate::value::{Filter, RecordId, Row};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default wait before a write lock acquisition fails with `Busy`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A single table: auto-increment counter plus rows keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Table {
    pub(crate) next_id: RecordId,
    pub(crate) rows: BTreeMap<RecordId, Row>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

/// The full mutable state of a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TableSet {
    pub(crate) tables: BTreeMap<String, Table>,
}

impl TableSet {
    /// Applies a whole batch, mutating `self`.
    ///
    /// Callers apply batches to a scratch clone so a failed statement leaves
    /// the live state untouched. Row-count assertions are checked here,
    /// inside the unit.
    pub(crate) fn apply_batch_statements(
        &mut self,
        batch: &[BatchStatement],
    ) -> StorageResult<Vec<StatementOutcome>> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for item in batch {
            let outcome = self.apply_statement(&item.statement)?;
            if let Some(expected) = item.expected_rows {
                if outcome.rows_affected != expected {
                    return Err(StorageError::RowCountMismatch {
                        table: item.statement.table().unwrap_or("?").to_string(),
                        expected,
                        actual: outcome.rows_affected,
                    });
                }
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn apply_statement(&mut self, statement: &Statement) -> StorageResult<StatementOutcome> {
        match statement {
            Statement::Insert { table, row } => self.insert(table, row),
            Statement::Update { table, set, filter } => self.update(table, set, filter),
            Statement::Delete { table, filter } => self.delete(table, filter),
            Statement::Select { table, filter } => self.select(table, filter),
            Statement::Raw { statement, .. } => Err(StorageError::unsupported(format!(
                "this engine does not execute raw statements: {statement}"
            ))),
        }
    }

    fn insert(&mut self, table: &str, row: &Row) -> StorageResult<StatementOutcome> {
        let entry = self.tables.entry(table.to_string()).or_default();

        let mut stored = row.clone();
        let id = match stored.remove("id") {
            None => {
                let id = entry.next_id;
                entry.next_id += 1;
                id
            }
            Some(value) => value.as_record_id().ok_or_else(|| {
                StorageError::constraint(table, format!("id must be a non-negative integer, got {value}"))
            })?,
        };

        if entry.rows.contains_key(&id) {
            return Err(StorageError::constraint(
                table,
                format!("duplicate id {id}"),
            ));
        }
        entry.next_id = entry.next_id.max(id + 1);
        entry.rows.insert(id, stored);
        Ok(StatementOutcome::inserted(id))
    }

    fn update(&mut self, table: &str, set: &Row, filter: &Filter) -> StorageResult<StatementOutcome> {
        if set.contains_key("id") {
            return Err(StorageError::constraint(table, "id is immutable"));
        }
        let entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;

        let mut affected = 0;
        for (id, row) in entry.rows.iter_mut() {
            if filter.matches(*id, row) {
                for (column, value) in set {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(StatementOutcome::affected(affected))
    }

    fn delete(&mut self, table: &str, filter: &Filter) -> StorageResult<StatementOutcome> {
        let entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;

        let doomed: Vec<RecordId> = entry
            .rows
            .iter()
            .filter(|(id, row)| filter.matches(**id, row))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            entry.rows.remove(id);
        }
        Ok(StatementOutcome::affected(doomed.len() as u64))
    }

    fn select(&self, table: &str, filter: &Filter) -> StorageResult<StatementOutcome> {
        let entry = self
            .tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;

        let rows: Vec<Row> = entry
            .rows
            .iter()
            .filter(|(id, row)| filter.matches(**id, row))
            .map(|(id, row)| with_id(*id, row))
            .collect();
        Ok(StatementOutcome::selected(rows))
    }

    pub(crate) fn read_record(&self, table: &str, id: RecordId) -> Option<Row> {
        self.tables
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .map(|row| with_id(id, row))
    }
}

/// Injects the id column into a copy of a stored row.
fn with_id(id: RecordId, row: &Row) -> Row {
    let mut out = row.clone();
    out.insert("id".to_string(), crate::value::Value::Integer(id as i64));
    out
}

/// An in-memory storage engine.
///
/// Batches execute against a scratch clone of the table set and are swapped
/// in only on success, so a failing statement never leaves partial writes.
///
/// # Thread Safety
///
/// Writers serialize on an internal lock acquired with a bounded wait;
/// exceeding the wait surfaces as [`StorageError::Busy`].
#[derive(Debug)]
pub struct MemoryEngine {
    state: RwLock<TableSet>,
    busy_timeout: Duration,
}

impl MemoryEngine {
    /// Creates an empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::with_busy_timeout(DEFAULT_BUSY_TIMEOUT)
    }

    /// Creates an engine with a specific write-lock wait bound.
    #[must_use]
    pub fn with_busy_timeout(busy_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(TableSet::default()),
            busy_timeout,
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn apply_batch(&self, batch: &[BatchStatement]) -> StorageResult<Vec<StatementOutcome>> {
        let mut state = self
            .state
            .try_write_for(self.busy_timeout)
            .ok_or(StorageError::Busy {
                waited_ms: self.busy_timeout.as_millis() as u64,
            })?;

        let mut scratch = state.clone();
        let outcomes = scratch.apply_batch_statements(batch)?;
        *state = scratch;
        Ok(outcomes)
    }

    fn read_record(&self, table: &str, id: RecordId) -> StorageResult<Option<Row>> {
        Ok(self.state.read().read_record(table, id))
    }

    fn table_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.state.read().tables.keys().cloned().collect())
    }

    fn count_records(&self, table: &str) -> StorageResult<u64> {
        let state = self.state.read();
        let entry = state
            .tables
            .get(table)
            .ok_or_else(|| StorageError::table_not_found(table))?;
        Ok(entry.rows.len() as u64)
    }

    fn snapshot_to(&self, path: &Path) -> StorageResult<()> {
        let state = self.state.read();
        crate::file::write_store_file(path, &state)
    }

    fn check_integrity(&self) -> StorageResult<()> {
        // Nothing persisted to verify.
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}
