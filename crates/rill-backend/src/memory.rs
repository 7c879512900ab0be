//! In-memory backend for tests and embedding.
//!
//! [`InMemoryBackend`] keeps rows in insertion order behind a `RwLock` and
//! fires registered observers after every write, the way a database-backed
//! provider would. It is the reference implementation of [`Backend`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use rill_types::{Locator, Row};
use tracing::trace;

use crate::error::{BackendError, BackendResult};
use crate::traits::{Backend, ChangeObserver, ObserverId};

/// Snapshot of the operation counters of an [`InMemoryBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub queries: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl BackendStats {
    /// Total number of write calls (insert, update, delete).
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.deletes
    }
}

#[derive(Default)]
struct Counters {
    queries: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

struct ObserverEntry {
    id: ObserverId,
    namespace: Locator,
    recursive: bool,
    observer: Arc<dyn ChangeObserver>,
}

impl ObserverEntry {
    fn covers(&self, locator: &Locator) -> bool {
        if self.recursive {
            self.namespace.contains(locator)
        } else {
            self.namespace.matches(locator)
        }
    }
}

/// An in-memory implementation of [`Backend`].
///
/// Rows live in a `Vec` so queries return them in insertion order. Data is
/// lost when the backend is dropped.
pub struct InMemoryBackend {
    rows: RwLock<Vec<(Locator, Row)>>,
    observers: RwLock<Vec<ObserverEntry>>,
    next_observer: AtomicU64,
    counters: Counters,
    notify: bool,
    offline: AtomicBool,
}

impl InMemoryBackend {
    /// Create an empty backend that notifies observers on every write.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Create an empty backend that never fires observers and reports
    /// `notifies_changes() == false`.
    pub fn without_notifications() -> Self {
        Self::build(false)
    }

    fn build(notify: bool) -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            observers: RwLock::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            counters: Counters::default(),
            notify,
            offline: AtomicBool::new(false),
        }
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.rows.read().expect("lock poisoned").is_empty()
    }

    /// Remove every row without firing observers.
    pub fn clear(&self) {
        self.rows.write().expect("lock poisoned").clear();
    }

    /// Locators of all stored rows in insertion order.
    pub fn locators(&self) -> Vec<Locator> {
        self.rows
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(loc, _)| loc.clone())
            .collect()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().expect("lock poisoned").len()
    }

    /// Current operation counters.
    pub fn stats(&self) -> BackendStats {
        BackendStats {
            queries: self.counters.queries.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
        }
    }

    /// While offline, every operation fails with [`BackendError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> BackendResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("backend is offline".into()));
        }
        Ok(())
    }

    /// Fire observers for each changed locator. Must be called with no
    /// locks held so observers may call back into the backend.
    fn notify(&self, changed: &[Locator]) {
        if !self.notify || changed.is_empty() {
            return;
        }
        for locator in changed {
            let targets: Vec<Arc<dyn ChangeObserver>> = match self.observers.read() {
                Ok(observers) => observers
                    .iter()
                    .filter(|entry| entry.covers(locator))
                    .map(|entry| Arc::clone(&entry.observer))
                    .collect(),
                Err(_) => return,
            };
            trace!(%locator, observers = targets.len(), "notifying observers");
            for observer in targets {
                observer.on_change(locator);
            }
        }
    }
}

fn poisoned<E: fmt::Display>(e: E) -> BackendError {
    BackendError::Poisoned(e.to_string())
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemoryBackend {
    fn query(&self, locator: &Locator, projection: &[&str]) -> BackendResult<Vec<Row>> {
        self.ensure_online()?;
        self.counters.queries.fetch_add(1, Ordering::Relaxed);

        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|(loc, _)| locator.matches(loc))
            .map(|(_, row)| row.project(projection))
            .collect())
    }

    fn update(&self, locator: &Locator, row: &Row) -> BackendResult<usize> {
        self.ensure_online()?;
        self.counters.updates.fetch_add(1, Ordering::Relaxed);

        let changed: Vec<Locator> = {
            let mut rows = self.rows.write().map_err(poisoned)?;
            rows.iter_mut()
                .filter(|(loc, _)| locator.matches(loc))
                .map(|(loc, existing)| {
                    existing.apply(row);
                    loc.clone()
                })
                .collect()
        };

        self.notify(&changed);
        Ok(changed.len())
    }

    fn insert(&self, locator: &Locator, row: &Row) -> BackendResult<Locator> {
        self.ensure_online()?;
        if locator.is_wildcard() {
            return Err(BackendError::InvalidLocator(locator.clone()));
        }
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);

        {
            let mut rows = self.rows.write().map_err(poisoned)?;
            if rows.iter().any(|(loc, _)| loc == locator) {
                return Err(BackendError::AlreadyExists(locator.clone()));
            }
            rows.push((locator.clone(), row.clone()));
        }

        self.notify(std::slice::from_ref(locator));
        Ok(locator.clone())
    }

    fn delete(&self, locator: &Locator) -> BackendResult<usize> {
        self.ensure_online()?;
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);

        let removed: Vec<Locator> = {
            let mut rows = self.rows.write().map_err(poisoned)?;
            let mut removed = Vec::new();
            rows.retain(|(loc, _)| {
                if locator.matches(loc) {
                    removed.push(loc.clone());
                    false
                } else {
                    true
                }
            });
            removed
        };

        self.notify(&removed);
        Ok(removed.len())
    }

    fn register_observer(
        &self,
        namespace: &Locator,
        recursive: bool,
        observer: Arc<dyn ChangeObserver>,
    ) -> BackendResult<ObserverId> {
        let id = ObserverId::new(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.write().map_err(poisoned)?.push(ObserverEntry {
            id,
            namespace: namespace.clone(),
            recursive,
            observer,
        });
        trace!(%id, %namespace, recursive, "observer registered");
        Ok(id)
    }

    fn unregister_observer(&self, id: ObserverId) -> BackendResult<bool> {
        let mut observers = self.observers.write().map_err(poisoned)?;
        let before = observers.len();
        observers.retain(|entry| entry.id != id);
        Ok(observers.len() != before)
    }

    fn notifies_changes(&self) -> bool {
        self.notify
    }
}

impl fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("row_count", &self.len())
            .field("observer_count", &self.observer_count())
            .field("notify", &self.notify)
            .finish()
    }
}
