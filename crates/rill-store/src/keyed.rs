use std::fmt;
use std::sync::Arc;

use futures::{future, stream, Stream, StreamExt};
use rill_backend::Backend;
use rill_types::{Locator, StoreItem};
use tracing::debug;

use crate::codec::KeyedCodec;
use crate::config::StoreConfig;
use crate::engine::StoreCore;
use crate::error::StoreResult;

/// Identifier-addressed facade over a [`StoreCore`].
///
/// Callers deal only in record identifiers; the codec maps each one to its
/// backend locator. An identifier may map to a wildcard locator, in which
/// case reads and streams cover every record it matches.
pub struct KeyedStore<C: KeyedCodec> {
    core: StoreCore<C>,
}

impl<C: KeyedCodec> Clone for KeyedStore<C> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<C: KeyedCodec> KeyedStore<C> {
    pub fn new(backend: Arc<dyn Backend>, codec: C, config: StoreConfig) -> StoreResult<Self> {
        Ok(Self {
            core: StoreCore::new(backend, codec, config)?,
        })
    }

    /// The underlying locator-addressed store.
    pub fn core(&self) -> &StoreCore<C> {
        &self.core
    }

    /// The identifier of `record`.
    pub fn id_for(&self, record: &C::Record) -> C::Id {
        self.core.codec().id_for(record)
    }

    /// The locator of `id`.
    ///
    /// # Panics
    ///
    /// If the codec cannot build a locator for `id`. That is a codec bug,
    /// not a runtime condition.
    pub fn locator_for_id(&self, id: &C::Id) -> Locator {
        match self.core.codec().locator_for_id(id) {
            Ok(locator) => locator,
            Err(e) => panic!("codec produced no locator for id {id:?}: {e}"),
        }
    }

    /// All records addressed by `id`.
    pub async fn get(&self, id: &C::Id) -> Vec<C::Record> {
        self.core.get(&self.locator_for_id(id)).await
    }

    /// The record addressed by `id`, if any.
    pub async fn get_one(&self, id: &C::Id) -> Option<C::Record> {
        self.core.get_one(&self.locator_for_id(id)).await
    }

    /// The current value of `id` (if any) followed by every later change.
    ///
    /// The subscription is taken before the current value is read, so a
    /// change racing with the read is never lost, though it may show up
    /// twice. The stream does not complete while the store is alive.
    pub fn get_stream(&self, id: &C::Id) -> impl Stream<Item = C::Record> + Send + 'static {
        let locator = self.locator_for_id(id);
        debug!(store = %self.core.config().name, %locator, "stream opened");

        let updates = self.core.subscribe(locator.clone());
        let core = self.core.clone();
        let initial = stream::once(async move { core.get_one(&locator).await }).filter_map(future::ready);

        initial.chain(updates.map(StoreItem::into_value))
    }

    /// Enqueue `record` at the locator of its own identifier.
    pub fn put(&self, record: C::Record) {
        let locator = self.locator_for_id(&self.id_for(&record));
        self.core.put(record, locator);
    }

    /// Enqueue deletion of the record addressed by `id`.
    pub fn delete(&self, id: &C::Id) {
        self.core.delete(self.locator_for_id(id));
    }

    /// Wait until every write queued so far has been applied.
    pub async fn flush(&self) {
        self.core.flush().await;
    }
}

impl<C: KeyedCodec> fmt::Debug for KeyedStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore").field("core", &self.core).finish()
    }
}
