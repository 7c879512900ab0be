//! Backend provider contract for Rill.
//!
//! A backend stores [`Row`](rill_types::Row)s addressed by
//! [`Locator`](rill_types::Locator), answers queries, applies updates, and
//! notifies registered observers whenever its contents change, including
//! changes made by writers outside any Rill store.
//!
//! # Storage Backends
//!
//! All backends implement the [`Backend`] trait:
//!
//! - [`InMemoryBackend`] -- insertion-ordered store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Backends are injected into stores; there is no process-wide instance.
//! 2. Every write fires the observers covering the affected row.
//! 3. Observers are called with no backend locks held.
//! 4. All failures are returned as [`BackendError`], never swallowed.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use memory::{BackendStats, InMemoryBackend};
pub use traits::{Backend, ChangeObserver, ObserverId};
