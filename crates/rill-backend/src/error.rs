use rill_types::Locator;

/// Errors from backend provider operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The operation needs a concrete locator but got a wildcard one.
    #[error("locator {0} does not address a single row")]
    InvalidLocator(Locator),

    /// An insert targeted a locator that already holds a row.
    #[error("row already exists at {0}")]
    AlreadyExists(Locator),

    /// The backend cannot serve requests right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Internal state is unusable after a panic while it was locked.
    #[error("backend state poisoned: {0}")]
    Poisoned(String),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
