use std::fmt;
use std::hash::Hash;

use rill_types::{Locator, Row, Schema, TypeError};

use crate::error::CodecResult;
use crate::merge::{LastWriteWins, MergePolicy};

/// Record-type specific hooks a [`StoreCore`](crate::StoreCore) needs.
///
/// Every method must be deterministic and free of side effects.
pub trait RecordCodec: Send + Sync + 'static {
    /// The record type held by the store.
    type Record: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Locator namespace governed by the store. Change notifications for
    /// anything outside it are ignored.
    fn namespace(&self) -> &Locator;

    /// Columns read from and written to the backend.
    fn schema(&self) -> &Schema;

    /// Decode one backend row.
    fn read(&self, row: &Row) -> CodecResult<Self::Record>;

    /// Encode a record. The row must set exactly the schema's columns.
    fn to_row(&self, record: &Self::Record) -> CodecResult<Row>;

    /// Resolve a conflict between the stored value and an incoming write.
    ///
    /// Only called when the two differ. The default is last write wins,
    /// which silently discards whatever `current` held; override it to merge
    /// field by field.
    fn merge(&self, current: &Self::Record, incoming: Self::Record) -> Self::Record {
        LastWriteWins.merge(current, incoming)
    }

    /// Wrap this codec so conflicts are resolved by `policy`.
    fn with_policy<P>(self, policy: P) -> WithPolicy<Self, P>
    where
        Self: Sized,
        P: MergePolicy<Self::Record> + 'static,
    {
        WithPolicy {
            codec: self,
            policy,
        }
    }
}

/// Identifier addressing on top of [`RecordCodec`], used by
/// [`KeyedStore`](crate::KeyedStore).
pub trait KeyedCodec: RecordCodec {
    /// Application key type.
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The identifier of a record.
    fn id_for(&self, record: &Self::Record) -> Self::Id;

    /// The backend locator of an identifier.
    ///
    /// Must be a pure function: equal identifiers always give equal
    /// locators, and distinct identifiers never share one.
    fn locator_for_id(&self, id: &Self::Id) -> Result<Locator, TypeError>;
}

/// A codec whose conflicts are resolved by a [`MergePolicy`] instead of its
/// own `merge`. Built with [`RecordCodec::with_policy`].
pub struct WithPolicy<C, P> {
    codec: C,
    policy: P,
}

impl<C, P> WithPolicy<C, P> {
    pub fn inner(&self) -> &C {
        &self.codec
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<C, P> RecordCodec for WithPolicy<C, P>
where
    C: RecordCodec,
    P: MergePolicy<C::Record> + 'static,
{
    type Record = C::Record;

    fn namespace(&self) -> &Locator {
        self.codec.namespace()
    }

    fn schema(&self) -> &Schema {
        self.codec.schema()
    }

    fn read(&self, row: &Row) -> CodecResult<Self::Record> {
        self.codec.read(row)
    }

    fn to_row(&self, record: &Self::Record) -> CodecResult<Row> {
        self.codec.to_row(record)
    }

    fn merge(&self, current: &Self::Record, incoming: Self::Record) -> Self::Record {
        self.policy.merge(current, incoming)
    }
}

impl<C, P> KeyedCodec for WithPolicy<C, P>
where
    C: KeyedCodec,
    P: MergePolicy<C::Record> + 'static,
{
    type Id = C::Id;

    fn id_for(&self, record: &Self::Record) -> Self::Id {
        self.codec.id_for(record)
    }

    fn locator_for_id(&self, id: &Self::Id) -> Result<Locator, TypeError> {
        self.codec.locator_for_id(id)
    }
}
