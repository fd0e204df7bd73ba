//! Materialized query results.
//!
//! A [`Table`] is produced fresh by every SELECT and owned by the caller. The
//! [`FromCell`] trait defines the checked conversions used by single-cell
//! selection.

use crate::error::{DbError, DbResult};
use crate::models::Value;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    /// Driver-specific type (e.g., "INTEGER", "VARCHAR", "BLOB")
    pub type_name: String,
}

impl Column {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One result row, values in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the values.
    pub fn values(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

/// A single column projected out of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnValues {
    pub column: Column,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Create a table from columns and rows.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True when the statement produced neither rows nor columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Project one column with all of its values.
    pub fn column(&self, index: usize) -> Option<ColumnValues> {
        let column = self.columns.get(index)?.clone();
        let values = self
            .rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or(Value::Null))
            .collect();
        Some(ColumnValues { column, values })
    }

    /// Find a column index by name (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Take the single value of a 1x1 table.
    ///
    /// Fails with `EmptyResult` for a 0x0 table and `CellShape` for any
    /// other shape that is not 1x1.
    pub fn into_cell(mut self) -> DbResult<Value> {
        if self.is_empty() {
            return Err(DbError::EmptyResult);
        }
        if self.rows.len() != 1 || self.columns.len() != 1 {
            return Err(DbError::CellShape {
                rows: self.rows.len(),
                columns: self.columns.len(),
            });
        }
        let mut row = self.rows.remove(0);
        if row.0.is_empty() {
            return Err(DbError::CellShape {
                rows: 1,
                columns: 0,
            });
        }
        Ok(row.0.swap_remove(0))
    }
}

/// Checked conversion from a cell value to a Rust type.
///
/// Conversions are explicit per target type: an integer cell converts to `i32`
/// only when in range, a float target accepts integer cells, and so on.
pub trait FromCell: Sized {
    /// Name used in `CellType` errors.
    const EXPECTED: &'static str;

    /// Convert the value, returning `None` if this type does not accept it.
    fn from_cell(value: Value) -> Option<Self>;

    /// Convert the value or fail with `DbError::CellType`.
    fn try_from_cell(value: Value) -> DbResult<Self> {
        let actual = value.type_name();
        Self::from_cell(value).ok_or(DbError::CellType {
            expected: Self::EXPECTED,
            actual,
        })
    }
}

impl FromCell for Value {
    const EXPECTED: &'static str = "any";

    fn from_cell(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromCell for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl FromCell for i32 {
    const EXPECTED: &'static str = "integer (i32)";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromCell for u32 {
    const EXPECTED: &'static str = "integer (u32)";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromCell for u64 {
    const EXPECTED: &'static str = "integer (u64)";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromCell for f64 {
    const EXPECTED: &'static str = "float";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FromCell for bool {
    const EXPECTED: &'static str = "bool";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            // SQLite and MySQL store booleans as 0/1 integers
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            _ => None,
        }
    }
}

impl FromCell for String {
    const EXPECTED: &'static str = "text";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl FromCell for Vec<u8> {
    const EXPECTED: &'static str = "bytes";

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: FromCell> FromCell for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_cell(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_cell(other).map(Some),
        }
    }
}
