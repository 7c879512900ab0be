//! Codecs and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rill_backend::InMemoryBackend;
use rill_store::{CodecResult, KeyedCodec, KeyedStore, RecordCodec, StoreConfig};
use rill_types::{Locator, Row, Schema, TypeError};

/// Install a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Stable 64-bit id derived from the first bytes of a BLAKE3 hash.
pub fn hash_of(text: &str) -> u64 {
    let hash = blake3::hash(text.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

/// Plain strings keyed by their own hash. Id `0` addresses every row.
pub struct VeggieCodec {
    namespace: Locator,
    schema: Schema,
}

pub const ALL_VEGGIES: u64 = 0;

impl VeggieCodec {
    pub fn new() -> Self {
        Self {
            namespace: Locator::parse("content://rill.test/veggies").unwrap(),
            schema: Schema::new(["id", "name"]).unwrap(),
        }
    }
}

impl RecordCodec for VeggieCodec {
    type Record = String;

    fn namespace(&self) -> &Locator {
        &self.namespace
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read(&self, row: &Row) -> CodecResult<String> {
        Ok(row.require_str("name")?.to_string())
    }

    fn to_row(&self, record: &String) -> CodecResult<Row> {
        Ok(Row::new()
            .with("id", hash_of(record).to_string())
            .with("name", record.as_str()))
    }
}

impl KeyedCodec for VeggieCodec {
    type Id = u64;

    fn id_for(&self, record: &String) -> u64 {
        hash_of(record)
    }

    fn locator_for_id(&self, id: &u64) -> Result<Locator, TypeError> {
        if *id == ALL_VEGGIES {
            self.namespace.join(rill_types::WILDCARD)
        } else {
            self.namespace.join(&id.to_string())
        }
    }
}

/// A named counter, last write wins.
#[derive(Clone, Debug, PartialEq)]
pub struct Tally {
    pub key: String,
    pub count: i64,
}

impl Tally {
    pub fn new(key: &str, count: i64) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

pub struct TallyCodec {
    namespace: Locator,
    schema: Schema,
}

impl TallyCodec {
    pub fn new() -> Self {
        Self {
            namespace: Locator::parse("content://rill.test/tallies").unwrap(),
            schema: Schema::new(["key", "count"]).unwrap(),
        }
    }
}

impl RecordCodec for TallyCodec {
    type Record = Tally;

    fn namespace(&self) -> &Locator {
        &self.namespace
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read(&self, row: &Row) -> CodecResult<Tally> {
        Ok(Tally {
            key: row.require_str("key")?.to_string(),
            count: row.require_i64("count")?,
        })
    }

    fn to_row(&self, record: &Tally) -> CodecResult<Row> {
        Ok(Row::new()
            .with("key", record.key.as_str())
            .with("count", record.count))
    }
}

impl KeyedCodec for TallyCodec {
    type Id = String;

    fn id_for(&self, record: &Tally) -> String {
        record.key.clone()
    }

    fn locator_for_id(&self, id: &String) -> Result<Locator, TypeError> {
        self.namespace.join(id)
    }
}

pub fn veggie_store(backend: &Arc<InMemoryBackend>) -> KeyedStore<VeggieCodec> {
    KeyedStore::new(backend.clone(), VeggieCodec::new(), StoreConfig::named("veggies")).unwrap()
}

pub fn tally_store(backend: &Arc<InMemoryBackend>) -> KeyedStore<TallyCodec> {
    KeyedStore::new(backend.clone(), TallyCodec::new(), StoreConfig::named("tallies")).unwrap()
}
