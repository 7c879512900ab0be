//! Fan-out of backend changes to live subscribers.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use rill_types::{Locator, StoreItem};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{trace, warn};

/// Internal subscriber: a locator filter paired with its own channel.
struct Subscriber<T> {
    id: u64,
    filter: Locator,
    sender: broadcast::Sender<StoreItem<T>>,
}

type SubscriberList<T> = RwLock<Vec<Subscriber<T>>>;

/// One-emitter, many-subscriber change broadcast.
///
/// Each subscriber owns a bounded channel. Publishing never blocks and never
/// buffers for future subscribers: a subscriber only sees events published
/// after it subscribed, and one that falls more than `capacity` events
/// behind skips the oldest ones.
pub struct ChangeBroadcast<T> {
    subscribers: Arc<SubscriberList<T>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<T: Clone + Send + 'static> ChangeBroadcast<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber for every event whose locator `filter` matches.
    pub fn subscribe(&self, filter: Locator) -> Subscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("broadcast lock poisoned")
            .push(Subscriber {
                id,
                filter: filter.clone(),
                sender: tx,
            });
        Subscription {
            inner: BroadcastStream::new(rx),
            filter,
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver `item` to every matching subscriber and return how many
    /// received it.
    pub(crate) fn publish(&self, item: StoreItem<T>) -> usize {
        let subs = self.subscribers.read().expect("broadcast lock poisoned");
        let mut delivered = 0;
        for sub in subs.iter().filter(|sub| sub.filter.matches(item.locator())) {
            if sub.sender.send(item.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .expect("broadcast lock poisoned")
            .len()
    }
}

/// A live, filtered view of a [`ChangeBroadcast`].
///
/// The stream ends only when the broadcast itself is dropped. Dropping the
/// subscription detaches it from the broadcast.
pub struct Subscription<T> {
    inner: BroadcastStream<StoreItem<T>>,
    filter: Locator,
    id: u64,
    subscribers: Weak<SubscriberList<T>>,
}

impl<T> Subscription<T> {
    pub fn filter(&self) -> &Locator {
        &self.filter
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return;
        };
        // A poisoned list keeps the entry; its sender just has no receiver.
        if let Ok(mut subs) = subscribers.write() {
            subs.retain(|sub| sub.id != self.id);
        }
        trace!(filter = %self.filter, "subscription detached");
    }
}

impl<T: Clone + Send + 'static> Stream for Subscription<T> {
    type Item = StoreItem<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(item))) => return Poll::Ready(Some(item)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(filter = %self.filter, skipped, "subscriber lagged, events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
