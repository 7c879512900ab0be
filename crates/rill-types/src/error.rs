use thiserror::Error;

/// Errors produced by type construction and row access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid locator {input:?}: {reason}")]
    InvalidLocator { input: String, reason: String },

    #[error("invalid locator segment: {0:?}")]
    InvalidSegment(String),

    #[error("invalid column name: {0:?}")]
    InvalidColumn(String),

    #[error("duplicate column in schema: {0}")]
    DuplicateColumn(String),

    #[error("schema must declare at least one column")]
    EmptySchema,

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("column {0} is not declared by the schema")]
    UndeclaredColumn(String),

    #[error("column {column} is not a {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
}
