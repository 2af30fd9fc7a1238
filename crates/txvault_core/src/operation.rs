//! Transaction operations.

use serde::{Deserialize, Serialize};
use txvault_storage::{BatchStatement, Statement};

/// Classification of an operation, recorded in audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Row insertion.
    Insert,
    /// Row update.
    Update,
    /// Row deletion.
    Delete,
    /// Read-only select.
    Select,
    /// Raw statement whose kind could not be inferred.
    Raw,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Select => "select",
            OperationKind::Raw => "raw",
        };
        write!(f, "{s}")
    }
}

/// One step of a transaction: a statement, an optional compensating
/// statement run in reverse order when the transaction is abandoned, and an
/// optional row-count assertion checked inside the atomic unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The statement to execute.
    pub statement: Statement,
    /// Inverse statement applied best-effort during rollback.
    pub compensating: Option<Statement>,
    /// When set, the statement must affect exactly this many rows.
    pub expected_rows: Option<u64>,
}

impl Operation {
    /// Wraps a statement with no compensation or assertion.
    #[must_use]
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            compensating: None,
            expected_rows: None,
        }
    }

    /// Attaches a compensating statement.
    #[must_use]
    pub fn with_compensation(mut self, compensating: Statement) -> Self {
        self.compensating = Some(compensating);
        self
    }

    /// Attaches a row-count assertion.
    #[must_use]
    pub const fn with_expected_rows(mut self, expected: u64) -> Self {
        self.expected_rows = Some(expected);
        self
    }

    /// Returns the table this operation touches.
    ///
    /// Exact for tagged statements; inferred from keywords for `Raw`.
    #[must_use]
    pub fn table(&self) -> Option<String> {
        match &self.statement {
            Statement::Raw { statement, .. } => infer_table(statement),
            other => other.table().map(str::to_string),
        }
    }

    /// Returns the operation's kind for audit classification.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match &self.statement {
            Statement::Insert { .. } => OperationKind::Insert,
            Statement::Update { .. } => OperationKind::Update,
            Statement::Delete { .. } => OperationKind::Delete,
            Statement::Select { .. } => OperationKind::Select,
            Statement::Raw { statement, .. } => infer_kind(statement),
        }
    }
}

impl From<Statement> for Operation {
    fn from(statement: Statement) -> Self {
        Self::new(statement)
    }
}

impl From<&Operation> for BatchStatement {
    fn from(op: &Operation) -> Self {
        BatchStatement {
            statement: op.statement.clone(),
            expected_rows: op.expected_rows,
        }
    }
}

/// Best-effort table-name inference over a raw statement.
///
/// Recognizes `INSERT INTO <t>`, `UPDATE <t>`, `DELETE FROM <t>`, and
/// `SELECT ... FROM <t>`. This feeds deadlock bookkeeping only, never
/// semantic query understanding.
#[must_use]
pub fn infer_table(statement: &str) -> Option<String> {
    let tokens: Vec<String> = statement
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect();
    let raw: Vec<&str> = statement.split_whitespace().collect();

    let position = match tokens.first().map(String::as_str) {
        Some("insert") if tokens.get(1).map(String::as_str) == Some("into") => Some(2),
        Some("update") => Some(1),
        Some("delete") if tokens.get(1).map(String::as_str) == Some("from") => Some(2),
        Some("select") => tokens.iter().position(|t| t == "from").map(|i| i + 1),
        _ => None,
    }?;

    raw.get(position).map(|name| clean_identifier(name))
}

fn infer_kind(statement: &str) -> OperationKind {
    let first = statement
        .split_whitespace()
        .next()
        .map(str::to_ascii_lowercase);
    match first.as_deref() {
        Some("insert") => OperationKind::Insert,
        Some("update") => OperationKind::Update,
        Some("delete") => OperationKind::Delete,
        Some("select") => OperationKind::Select,
        _ => OperationKind::Raw,
    }
}

/// Strips quoting and trailing punctuation from an inferred table name.
fn clean_identifier(token: &str) -> String {
    let cut = token.find('(').map_or(token, |index| &token[..index]);
    cut.trim_matches(|c: char| matches!(c, '"' | '`' | '\'' | ';' | ','))
        .to_string()
}
