//! Merge policies and the write-resolution decision.

/// Strategy for combining the stored value with an incoming write.
pub trait MergePolicy<T>: Send + Sync {
    fn merge(&self, current: &T, incoming: T) -> T;
}

/// The incoming value replaces the stored one.
#[derive(Clone, Copy, Debug, Default)]
pub struct LastWriteWins;

impl<T> MergePolicy<T> for LastWriteWins {
    fn merge(&self, _current: &T, incoming: T) -> T {
        incoming
    }
}

/// The stored value is kept; writes only fill in missing records.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepCurrent;

impl<T: Clone> MergePolicy<T> for KeepCurrent {
    fn merge(&self, current: &T, _incoming: T) -> T {
        current.clone()
    }
}

impl<T, F> MergePolicy<T> for F
where
    F: Fn(&T, T) -> T + Send + Sync,
{
    fn merge(&self, current: &T, incoming: T) -> T {
        self(current, incoming)
    }
}

/// What the write worker should do with one pending write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Nothing is stored yet.
    Insert(T),
    /// The stored value must change to this.
    Update(T),
    /// The stored value already reflects the write.
    Unchanged,
}

/// Decide how an incoming value lands on top of `current`.
///
/// `merge` is only consulted when the values differ, and a merge result equal
/// to `current` is reported as [`Resolution::Unchanged`] so no redundant
/// write (and no change notification) happens.
pub fn resolve<T, M>(current: Option<&T>, incoming: T, merge: M) -> Resolution<T>
where
    T: PartialEq,
    M: FnOnce(&T, T) -> T,
{
    match current {
        None => Resolution::Insert(incoming),
        Some(current) if *current == incoming => Resolution::Unchanged,
        Some(current) => {
            let merged = merge(current, incoming);
            if merged == *current {
                Resolution::Unchanged
            } else {
                Resolution::Update(merged)
            }
        }
    }
}

/// Final stored value after applying `writes` in order, starting from
/// `initial`, as the write worker would.
pub fn fold<T, P>(policy: &P, initial: Option<T>, writes: impl IntoIterator<Item = T>) -> Option<T>
where
    T: PartialEq,
    P: MergePolicy<T> + ?Sized,
{
    writes.into_iter().fold(initial, |state, incoming| {
        match resolve(state.as_ref(), incoming, |c, i| policy.merge(c, i)) {
            Resolution::Insert(v) | Resolution::Update(v) => Some(v),
            Resolution::Unchanged => state,
        }
    })
}
