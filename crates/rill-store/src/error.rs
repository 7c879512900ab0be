use rill_backend::BackendError;
use rill_types::{Locator, TypeError};

/// Errors raised while building a store.
///
/// Read and write paths never return errors: reads degrade to "absent" or an
/// empty list and writes are fire-and-forget, with failures logged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store workers need a Tokio runtime to run on.
    #[error("no tokio runtime available to run store workers")]
    NoRuntime,

    /// The store configuration is invalid.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// A store namespace must be a concrete locator.
    #[error("store namespace {0} must not contain wildcards")]
    InvalidNamespace(Locator),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),
}

/// Errors converting between records and backend rows.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("row error: {0}")]
    Row(#[from] TypeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    Invalid(String),
}

/// Result alias for store construction.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
