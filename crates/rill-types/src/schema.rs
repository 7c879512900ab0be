use std::collections::HashSet;

use crate::error::TypeError;
use crate::row::Row;

/// Statically declared column layout of a record type.
///
/// A schema doubles as the projection passed to backend queries. It is
/// validated once when built: at least one column, no duplicates, and every
/// name must look like an identifier (`[A-Za-z_][A-Za-z0-9_]*`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(TypeError::EmptySchema);
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !is_valid_column(column) {
                return Err(TypeError::InvalidColumn(column.clone()));
            }
            if !seen.insert(column.as_str()) {
                return Err(TypeError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column names borrowed for a backend query.
    pub fn projection(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Verify that `row` sets exactly the declared columns.
    pub fn check_row(&self, row: &Row) -> Result<(), TypeError> {
        if let Some(missing) = self.columns.iter().find(|c| !row.contains(c)) {
            return Err(TypeError::MissingColumn(missing.clone()));
        }
        if let Some(extra) = row.columns().find(|c| !self.contains(c)) {
            return Err(TypeError::UndeclaredColumn(extra.to_string()));
        }
        Ok(())
    }
}

fn is_valid_column(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
