use std::fmt;
use std::sync::Arc;

use rill_types::{Locator, Row};

use crate::error::BackendResult;

/// Handle returned by [`Backend::register_observer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Callback fired with the affected locator whenever a row changes.
///
/// Observers are invoked on the writer's thread, so implementations should
/// hand the locator off rather than do I/O inline.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, locator: &Locator);
}

impl<F> ChangeObserver for F
where
    F: Fn(&Locator) + Send + Sync,
{
    fn on_change(&self, locator: &Locator) {
        self(locator)
    }
}

/// Keyed row storage with change notification.
///
/// All implementations must satisfy these invariants:
/// - Rows are uniquely addressed by a concrete [`Locator`].
/// - `query` returns rows in a stable iteration order.
/// - Every successful insert, update and delete fires the observers whose
///   namespace covers the affected row, no matter who issued the write.
/// - Calls may block; callers are expected to keep them off async tasks.
pub trait Backend: Send + Sync {
    /// Return every row addressed by `locator`, restricted to `projection`.
    ///
    /// A wildcard locator may match many rows. Returns an empty list when
    /// nothing matches.
    fn query(&self, locator: &Locator, projection: &[&str]) -> BackendResult<Vec<Row>>;

    /// Set the columns in `row` on every row addressed by `locator`.
    ///
    /// Returns the number of rows affected.
    fn update(&self, locator: &Locator, row: &Row) -> BackendResult<usize>;

    /// Insert a new row at `locator` and return the locator it was stored at.
    fn insert(&self, locator: &Locator, row: &Row) -> BackendResult<Locator>;

    /// Delete every row addressed by `locator`. Returns the number removed.
    fn delete(&self, locator: &Locator) -> BackendResult<usize>;

    /// Register `observer` for changes under `namespace`.
    ///
    /// A recursive observer fires for every locator the namespace contains;
    /// a non-recursive one only for the namespace locator itself.
    fn register_observer(
        &self,
        namespace: &Locator,
        recursive: bool,
        observer: Arc<dyn ChangeObserver>,
    ) -> BackendResult<ObserverId>;

    /// Remove a previously registered observer. Returns `true` if it existed.
    fn unregister_observer(&self, id: ObserverId) -> BackendResult<bool>;

    /// Whether writes are guaranteed to fire observers.
    ///
    /// Stores publish changes themselves after a successful write when this
    /// returns `false`.
    fn notifies_changes(&self) -> bool {
        true
    }
}
