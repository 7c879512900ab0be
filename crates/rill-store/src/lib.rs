//! Reactive record stores for Rill.
//!
//! A store sits between application code and a [`Backend`](rill_backend::Backend).
//! It reads records on demand, funnels every write through a single ordered
//! worker that merges with the stored value, and turns backend change
//! notifications into live streams of fresh values.
//!
//! # Store Types
//!
//! - [`StoreCore`] -- locator-addressed store: get, put, delete, subscribe
//! - [`KeyedStore`] -- identifier-addressed facade with `get_stream`
//!
//! # Design Rules
//!
//! 1. Writes of one store are applied strictly in submission order.
//! 2. A write whose merged value equals the stored one touches nothing and
//!    publishes nothing.
//! 3. Subscribers see only changes published after they subscribed.
//! 4. Reads degrade to "absent" and writes are dropped on backend failure;
//!    both are logged, neither is returned to the caller.
//! 5. Store workers run on the ambient Tokio runtime; backend calls run on
//!    its blocking pool.

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod json;
pub mod keyed;
pub mod merge;
pub mod queue;

pub use broadcast::{ChangeBroadcast, Subscription};
pub use codec::{KeyedCodec, RecordCodec, WithPolicy};
pub use config::StoreConfig;
pub use engine::StoreCore;
pub use error::{CodecError, CodecResult, StoreError, StoreResult};
pub use keyed::KeyedStore;
pub use merge::{LastWriteWins, KeepCurrent, MergePolicy, Resolution};
pub use queue::{PendingWrite, WriteHandler, WriteQueue};
