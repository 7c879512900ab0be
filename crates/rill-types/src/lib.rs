//! Foundation types for Rill.
//!
//! Every other Rill crate depends on `rill-types`.
//!
//! # Key Types
//!
//! - [`Locator`] -- URI-like address of a record or namespace in a backend
//! - [`Row`] -- backend storage representation of a record
//! - [`Schema`] -- statically declared column layout, used as the query projection
//! - [`StoreItem`] -- a record value paired with its locator

pub mod error;
pub mod item;
pub mod locator;
pub mod row;
pub mod schema;

pub use error::TypeError;
pub use item::StoreItem;
pub use locator::{Locator, WILDCARD};
pub use row::Row;
pub use schema::Schema;

// Column values are plain JSON values.
pub use serde_json::Value;
