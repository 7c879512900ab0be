//! Ordered, single-consumer write pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rill_types::Locator;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// A write waiting for the worker. Consumed exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingWrite<T> {
    Put { locator: Locator, value: T },
    Delete { locator: Locator },
}

impl<T> PendingWrite<T> {
    pub fn locator(&self) -> &Locator {
        match self {
            Self::Put { locator, .. } | Self::Delete { locator } => locator,
        }
    }
}

/// Applies one write against the backend. Runs on the blocking pool, one
/// write at a time.
pub trait WriteHandler<T>: Send + Sync + 'static {
    fn handle(&self, write: PendingWrite<T>);
}

enum Command<T> {
    Write(PendingWrite<T>),
    Flush(oneshot::Sender<()>),
}

/// Serializes every write of one store onto a single background worker.
///
/// Submission never blocks: the queue is unbounded, so a busy worker makes
/// the backlog grow instead of pushing back on producers. Writes are handed
/// to the [`WriteHandler`] strictly in submission order, and the next write
/// only starts once the previous one has finished.
pub struct WriteQueue<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
    pending: Arc<AtomicUsize>,
    name: String,
}

impl<T: Send + 'static> WriteQueue<T> {
    /// Start the worker task on `runtime`.
    pub fn spawn<H>(name: impl Into<String>, runtime: &Handle, handler: Arc<H>) -> Self
    where
        H: WriteHandler<T>,
    {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        runtime.spawn(run_worker(name.clone(), rx, handler, Arc::clone(&pending)));
        Self { tx, pending, name }
    }

    /// Enqueue a write. Returns `false` if the worker has stopped, in which
    /// case the write is dropped.
    pub fn submit(&self, write: PendingWrite<T>) -> bool {
        self.pending.fetch_add(1, Ordering::SeqCst);
        match self.tx.send(Command::Write(write)) {
            Ok(()) => true,
            Err(mpsc::error::SendError(command)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                if let Command::Write(write) = command {
                    error!(queue = %self.name, locator = %write.locator(), "write worker stopped, dropping write");
                }
                false
            }
        }
    }

    /// Wait until every write submitted before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_err() {
            return;
        }
        // An error here means the worker stopped; nothing is left to wait for.
        let _ = done_rx.await;
    }

    /// Writes submitted but not yet handled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

async fn run_worker<T, H>(
    name: String,
    mut rx: mpsc::UnboundedReceiver<Command<T>>,
    handler: Arc<H>,
    pending: Arc<AtomicUsize>,
) where
    T: Send + 'static,
    H: WriteHandler<T>,
{
    debug!(queue = %name, "write worker started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Write(write) => {
                let handler = Arc::clone(&handler);
                if let Err(e) = tokio::task::spawn_blocking(move || handler.handle(write)).await {
                    error!(queue = %name, error = %e, "write handler panicked, write dropped");
                }
                pending.fetch_sub(1, Ordering::SeqCst);
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(queue = %name, "write worker stopped");
}
