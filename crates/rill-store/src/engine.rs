//! The store engine: read path, write resolution, and the change bridge.
//!
//! All backend calls block, so they run on Tokio's blocking pool. Reads may
//! run concurrently with each other and with the write worker; the only
//! ordering the engine guarantees is between writes of the same store.

use std::fmt;
use std::sync::Arc;

use rill_backend::{Backend, BackendError, ChangeObserver, ObserverId};
use rill_types::{Locator, StoreItem};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broadcast::{ChangeBroadcast, Subscription};
use crate::codec::RecordCodec;
use crate::config::StoreConfig;
use crate::error::{CodecResult, StoreError, StoreResult};
use crate::merge::{resolve, Resolution};
use crate::queue::{PendingWrite, WriteHandler, WriteQueue};

/// State shared by the caller-facing handle, the write worker and the
/// notification task.
struct Engine<C: RecordCodec> {
    name: String,
    codec: C,
    backend: Arc<dyn Backend>,
    broadcast: ChangeBroadcast<C::Record>,
    synthesize: bool,
}

impl<C: RecordCodec> Engine<C> {
    fn query_list(&self, locator: &Locator) -> Vec<C::Record> {
        let projection = self.codec.schema().projection();
        let rows = match self.backend.query(locator, &projection) {
            Ok(rows) => rows,
            Err(e) => {
                error!(store = %self.name, %locator, error = %e, "query failed");
                return Vec::new();
            }
        };

        let records: Vec<C::Record> = rows
            .iter()
            .filter_map(|row| match self.codec.read(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(store = %self.name, %locator, error = %e, "skipping undecodable row");
                    None
                }
            })
            .collect();

        if records.is_empty() {
            debug!(store = %self.name, %locator, "nothing found");
        }
        records
    }

    fn query_one(&self, locator: &Locator) -> Option<C::Record> {
        let records = self.query_list(locator);
        if records.len() > 1 {
            warn!(
                store = %self.name,
                %locator,
                count = records.len(),
                "multiple items found in a get for a single item, using the first"
            );
        }
        records.into_iter().next()
    }

    /// Re-read a changed locator and publish the fresh value.
    fn refresh(&self, locator: &Locator) {
        if !self.codec.namespace().contains(locator) {
            debug!(store = %self.name, %locator, "ignoring change outside namespace");
            return;
        }
        match self.query_one(locator) {
            Some(value) => {
                let delivered = self.broadcast.publish(StoreItem::new(locator.clone(), value));
                debug!(store = %self.name, %locator, delivered, "change published");
            }
            None => debug!(store = %self.name, %locator, "changed item no longer present"),
        }
    }

    fn encode(&self, value: &C::Record) -> CodecResult<rill_types::Row> {
        let row = self.codec.to_row(value)?;
        self.codec.schema().check_row(&row)?;
        Ok(row)
    }

    fn resolve_put(&self, locator: Locator, incoming: C::Record) {
        let projection = self.codec.schema().projection();
        let current = match self.backend.query(&locator, &projection) {
            Ok(rows) => rows.first().map(|row| self.codec.read(row)),
            Err(e) => {
                error!(store = %self.name, %locator, error = %e, "cannot read current value, write dropped");
                return;
            }
        };
        let current = match current.transpose() {
            Ok(current) => current,
            Err(e) => {
                error!(store = %self.name, %locator, error = %e, "cannot decode current value, write dropped");
                return;
            }
        };

        let resolution = resolve(current.as_ref(), incoming, |current, incoming| {
            debug!(store = %self.name, %locator, "merging values");
            self.codec.merge(current, incoming)
        });

        match resolution {
            Resolution::Unchanged => {
                debug!(store = %self.name, %locator, "data already up to date");
            }
            Resolution::Insert(value) => self.write(&locator, value, false),
            Resolution::Update(value) => self.write(&locator, value, true),
        }
    }

    fn write(&self, locator: &Locator, value: C::Record, exists: bool) {
        let row = match self.encode(&value) {
            Ok(row) => row,
            Err(e) => {
                error!(store = %self.name, %locator, error = %e, "cannot encode value, write dropped");
                return;
            }
        };

        let written = if exists {
            match self.backend.update(locator, &row) {
                Ok(0) => {
                    // Deleted between the read and the update.
                    self.insert_row(locator, &row)
                }
                Ok(_) => {
                    debug!(store = %self.name, %locator, "updated");
                    true
                }
                Err(e) => {
                    error!(store = %self.name, %locator, error = %e, "update failed");
                    false
                }
            }
        } else {
            self.insert_row(locator, &row)
        };

        if written && self.synthesize {
            let delivered = self.broadcast.publish(StoreItem::new(locator.clone(), value));
            debug!(store = %self.name, %locator, delivered, "change published by store");
        }
    }

    fn insert_row(&self, locator: &Locator, row: &rill_types::Row) -> bool {
        match self.backend.insert(locator, row) {
            Ok(stored) => {
                debug!(store = %self.name, locator = %stored, "inserted");
                true
            }
            Err(BackendError::AlreadyExists(_)) => {
                // Another writer created the row after our read.
                match self.backend.update(locator, row) {
                    Ok(_) => {
                        debug!(store = %self.name, %locator, "updated after concurrent insert");
                        true
                    }
                    Err(e) => {
                        error!(store = %self.name, %locator, error = %e, "update failed");
                        false
                    }
                }
            }
            Err(e) => {
                error!(store = %self.name, %locator, error = %e, "insert failed");
                false
            }
        }
    }

    fn resolve_delete(&self, locator: Locator) {
        match self.backend.delete(&locator) {
            Ok(removed) => debug!(store = %self.name, %locator, removed, "deleted"),
            Err(e) => error!(store = %self.name, %locator, error = %e, "delete failed"),
        }
    }
}

impl<C: RecordCodec> WriteHandler<C::Record> for Engine<C> {
    fn handle(&self, write: PendingWrite<C::Record>) {
        match write {
            PendingWrite::Put { locator, value } => self.resolve_put(locator, value),
            PendingWrite::Delete { locator } => self.resolve_delete(locator),
        }
    }
}

struct CoreInner<C: RecordCodec> {
    engine: Arc<Engine<C>>,
    queue: WriteQueue<C::Record>,
    observer: Option<ObserverId>,
    config: StoreConfig,
}

impl<C: RecordCodec> Drop for CoreInner<C> {
    fn drop(&mut self) {
        if let Some(id) = self.observer.take() {
            if let Err(e) = self.engine.backend.unregister_observer(id) {
                warn!(store = %self.config.name, error = %e, "failed to unregister change observer");
            }
        }
        info!(store = %self.config.name, "store stopped");
    }
}

/// Locator-addressed store over a [`Backend`].
///
/// Reads query the backend directly. Writes go through a per-store
/// [`WriteQueue`] that reads the current row, merges, and writes only if
/// something changed. A change observer registered on the codec's namespace
/// turns every backend change, whoever made it, into a [`StoreItem`] on the
/// store's [`ChangeBroadcast`].
///
/// Handles are cheap to clone and share one engine. The observer is
/// unregistered when the last handle is dropped.
pub struct StoreCore<C: RecordCodec> {
    inner: Arc<CoreInner<C>>,
}

impl<C: RecordCodec> Clone for StoreCore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RecordCodec> StoreCore<C> {
    /// Create a store and register its change observer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(backend: Arc<dyn Backend>, codec: C, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let namespace = codec.namespace().clone();
        if namespace.is_wildcard() {
            return Err(StoreError::InvalidNamespace(namespace));
        }

        let synthesize = !backend.notifies_changes();
        let engine = Arc::new(Engine {
            name: config.name.clone(),
            codec,
            backend: Arc::clone(&backend),
            broadcast: ChangeBroadcast::new(config.broadcast_capacity),
            synthesize,
        });

        let queue = WriteQueue::spawn(config.name.clone(), &runtime, Arc::clone(&engine));

        let (change_tx, change_rx) = mpsc::unbounded_channel::<Locator>();
        runtime.spawn(run_notifier(Arc::clone(&engine), change_rx));

        let observer: Arc<dyn ChangeObserver> = Arc::new(move |locator: &Locator| {
            // The notifier is gone only while the store is being dropped.
            let _ = change_tx.send(locator.clone());
        });
        let observer = backend.register_observer(&namespace, true, observer)?;

        info!(store = %config.name, %namespace, synthesize, "store started");

        Ok(Self {
            inner: Arc::new(CoreInner {
                engine,
                queue,
                observer: Some(observer),
                config,
            }),
        })
    }

    pub fn codec(&self) -> &C {
        &self.inner.engine.codec
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn namespace(&self) -> &Locator {
        self.inner.engine.codec.namespace()
    }

    /// All records matching `locator`, in backend order.
    ///
    /// Failures are logged and yield an empty list.
    pub async fn get(&self, locator: &Locator) -> Vec<C::Record> {
        let engine = Arc::clone(&self.inner.engine);
        let locator = locator.clone();
        match tokio::task::spawn_blocking(move || engine.query_list(&locator)).await {
            Ok(records) => records,
            Err(e) => {
                error!(store = %self.inner.config.name, error = %e, "read task failed");
                Vec::new()
            }
        }
    }

    /// The first record matching `locator`, or `None`.
    ///
    /// More than one match is logged and the first one in backend order is
    /// returned.
    pub async fn get_one(&self, locator: &Locator) -> Option<C::Record> {
        let engine = Arc::clone(&self.inner.engine);
        let locator = locator.clone();
        match tokio::task::spawn_blocking(move || engine.query_one(&locator)).await {
            Ok(record) => record,
            Err(e) => {
                error!(store = %self.inner.config.name, error = %e, "read task failed");
                None
            }
        }
    }

    /// Enqueue `value` to be merged into the row at `locator`.
    ///
    /// Returns immediately. Puts are applied in submission order; failures
    /// are logged, never reported.
    ///
    /// # Panics
    ///
    /// If `locator` is a wildcard or lies outside the store's namespace.
    pub fn put(&self, value: C::Record, locator: Locator) {
        self.check_target(&locator);
        debug!(store = %self.inner.config.name, %locator, "put queued");
        self.inner.queue.submit(PendingWrite::Put { locator, value });
    }

    /// Enqueue deletion of the row at `locator`, ordered with puts.
    ///
    /// # Panics
    ///
    /// If `locator` is a wildcard or lies outside the store's namespace.
    pub fn delete(&self, locator: Locator) {
        self.check_target(&locator);
        debug!(store = %self.inner.config.name, %locator, "delete queued");
        self.inner.queue.submit(PendingWrite::Delete { locator });
    }

    /// Wait until every write queued before this call has been applied.
    pub async fn flush(&self) {
        self.inner.queue.flush().await;
    }

    /// Writes queued but not yet applied.
    pub fn pending_writes(&self) -> usize {
        self.inner.queue.pending()
    }

    /// Live changes for every locator `filter` matches.
    pub fn subscribe(&self, filter: Locator) -> Subscription<C::Record> {
        self.inner.engine.broadcast.subscribe(filter)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.engine.broadcast.subscriber_count()
    }

    fn check_target(&self, locator: &Locator) {
        assert!(
            !locator.is_wildcard(),
            "cannot write to wildcard locator {locator}"
        );
        assert!(
            self.namespace().contains(locator),
            "locator {locator} is outside store namespace {}",
            self.namespace()
        );
    }
}

impl<C: RecordCodec> fmt::Debug for StoreCore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCore")
            .field("name", &self.inner.config.name)
            .field("namespace", self.namespace())
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}

/// Turns observed locators into published changes, in arrival order.
async fn run_notifier<C: RecordCodec>(engine: Arc<Engine<C>>, mut rx: mpsc::UnboundedReceiver<Locator>) {
    while let Some(locator) = rx.recv().await {
        debug!(store = %engine.name, %locator, "change observed");
        let task_engine = Arc::clone(&engine);
        if let Err(e) = tokio::task::spawn_blocking(move || task_engine.refresh(&locator)).await {
            error!(store = %engine.name, error = %e, "change refresh failed");
        }
    }
    debug!(store = %engine.name, "notifier stopped");
}
