//! Typed statements executed by a storage engine.

use crate::value::{Filter, RecordId, Row, Value};
use serde::{Deserialize, Serialize};

/// A single statement within an atomic batch.
///
/// Statements are tagged variants rather than free-form strings so the table
/// a statement touches is always known exactly. `Raw` remains as an escape
/// hatch for engines that understand a statement language; the bundled
/// engines reject it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Inserts a row. If the row carries an `id` column it is used as the
    /// record id; otherwise the engine assigns the next id for the table.
    Insert {
        /// Target table (created on first insert).
        table: String,
        /// The row to insert.
        row: Row,
    },
    /// Merges `set` into every record matched by `filter`.
    Update {
        /// Target table.
        table: String,
        /// Columns to overwrite.
        set: Row,
        /// Which records to update.
        filter: Filter,
    },
    /// Deletes every record matched by `filter`.
    Delete {
        /// Target table.
        table: String,
        /// Which records to delete.
        filter: Filter,
    },
    /// Reads every record matched by `filter`.
    Select {
        /// Target table.
        table: String,
        /// Which records to read.
        filter: Filter,
    },
    /// An opaque statement in an engine-specific language.
    Raw {
        /// The statement text.
        statement: String,
        /// Positional parameters.
        params: Vec<Value>,
    },
}

impl Statement {
    /// Returns the table this statement touches, when known exactly.
    ///
    /// `Raw` statements return `None` here; callers that need a table name
    /// for bookkeeping must fall back to inference over the statement text.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::Select { table, .. } => Some(table),
            Statement::Raw { .. } => None,
        }
    }

    /// Returns true when the statement mutates data.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Statement::Select { .. })
    }
}

/// A statement paired with an optional row-count assertion.
///
/// The assertion is evaluated inside the atomic unit: a mismatch aborts the
/// whole batch, leaving every table untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatement {
    /// The statement to execute.
    pub statement: Statement,
    /// When set, the statement must affect exactly this many rows.
    pub expected_rows: Option<u64>,
}

impl BatchStatement {
    /// Pairs a statement with a row-count assertion.
    #[must_use]
    pub fn expecting(statement: Statement, expected_rows: u64) -> Self {
        Self {
            statement,
            expected_rows: Some(expected_rows),
        }
    }
}

impl From<Statement> for BatchStatement {
    fn from(statement: Statement) -> Self {
        Self {
            statement,
            expected_rows: None,
        }
    }
}

/// Result of executing one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementOutcome {
    /// Number of records inserted, updated, or deleted.
    pub rows_affected: u64,
    /// The id assigned or used by an insert.
    pub inserted_id: Option<RecordId>,
    /// Rows returned by a select, with their `id` column injected.
    pub rows: Option<Vec<Row>>,
}

impl StatementOutcome {
    /// Outcome of a mutation touching `rows_affected` records.
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Outcome of an insert.
    #[must_use]
    pub fn inserted(id: RecordId) -> Self {
        Self {
            rows_affected: 1,
            inserted_id: Some(id),
            rows: None,
        }
    }

    /// Outcome of a select.
    #[must_use]
    pub fn selected(rows: Vec<Row>) -> Self {
        Self {
            rows_affected: 0,
            inserted_id: None,
            rows: Some(rows),
        }
    }
}
