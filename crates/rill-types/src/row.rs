use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Backend storage representation of one record: column name to value.
///
/// Columns are kept in name order so two rows with the same content always
/// compare and serialize identically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    /// Set a column, returning the previous value if any.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.columns.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    /// Like [`Row::get`], but a missing column is an error.
    pub fn require(&self, column: &str) -> Result<&Value, TypeError> {
        self.get(column)
            .ok_or_else(|| TypeError::MissingColumn(column.to_string()))
    }

    pub fn require_str(&self, column: &str) -> Result<&str, TypeError> {
        self.require(column)?
            .as_str()
            .ok_or_else(|| TypeError::ColumnType {
                column: column.to_string(),
                expected: "string",
            })
    }

    pub fn require_i64(&self, column: &str) -> Result<i64, TypeError> {
        self.require(column)?
            .as_i64()
            .ok_or_else(|| TypeError::ColumnType {
                column: column.to_string(),
                expected: "integer",
            })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// A copy of this row restricted to `columns`. Columns the row does not
    /// have are skipped.
    pub fn project(&self, columns: &[&str]) -> Row {
        let columns = columns
            .iter()
            .filter_map(|c| self.columns.get_key_value(*c))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Row { columns }
    }

    /// Overwrite this row's columns with every column set in `other`.
    pub fn apply(&mut self, other: &Row) {
        for (k, v) in &other.columns {
            self.columns.insert(k.clone(), v.clone());
        }
    }
}
