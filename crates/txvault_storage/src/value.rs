//! Row values and filters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a record within a table.
pub type RecordId = u64;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Boolean.
    Boolean(bool),
}

impl Value {
    /// Returns the name of this value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Returns the value as a record id when it is a non-negative integer.
    #[must_use]
    pub fn as_record_id(&self) -> Option<RecordId> {
        match self {
            Value::Integer(i) if *i >= 0 => Some(*i as RecordId),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

/// A row: column name to value.
///
/// Rows are stored without their `id` column; the id is the table key and is
/// injected back into rows returned by reads.
pub type Row = BTreeMap<String, Value>;

/// Builds a row from `(column, value)` pairs.
#[must_use]
pub fn row<const N: usize>(fields: [(&str, Value); N]) -> Row {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Typed `where` clause for update, delete, and select statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches the record with this id.
    ById(RecordId),
    /// Matches records whose column equals the value.
    Eq(String, Value),
    /// Matches every record in the table.
    All,
}

impl Filter {
    /// Returns true when the filter matches the given record.
    #[must_use]
    pub fn matches(&self, id: RecordId, row: &Row) -> bool {
        match self {
            Filter::ById(want) => id == *want,
            Filter::Eq(column, value) => row.get(column) == Some(value),
            Filter::All => true,
        }
    }

    /// Returns the targeted record id when the filter addresses exactly one.
    #[must_use]
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Filter::ById(id) => Some(*id),
            _ => None,
        }
    }
}
