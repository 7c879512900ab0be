mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use proptest::prelude::*;
use rill_backend::InMemoryBackend;
use rill_store::merge::fold;
use rill_store::{CodecResult, KeyedCodec, KeyedStore, LastWriteWins, RecordCodec, StoreConfig};
use rill_types::{Locator, Row, Schema, TypeError};

use common::{init_tracing, tally_store, Tally};

/// A journal entry whose text accumulates across writes.
#[derive(Clone, Debug, PartialEq)]
struct Entry {
    key: String,
    text: String,
}

fn append(current: &Entry, incoming: Entry) -> Entry {
    Entry {
        key: incoming.key,
        text: format!("{}{}", current.text, incoming.text),
    }
}

struct JournalCodec {
    namespace: Locator,
    schema: Schema,
}

impl JournalCodec {
    fn new() -> Self {
        Self {
            namespace: Locator::parse("content://rill.test/journal").unwrap(),
            schema: Schema::new(["key", "text"]).unwrap(),
        }
    }
}

impl RecordCodec for JournalCodec {
    type Record = Entry;

    fn namespace(&self) -> &Locator {
        &self.namespace
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read(&self, row: &Row) -> CodecResult<Entry> {
        Ok(Entry {
            key: row.require_str("key")?.to_string(),
            text: row.require_str("text")?.to_string(),
        })
    }

    fn to_row(&self, record: &Entry) -> CodecResult<Row> {
        Ok(Row::new()
            .with("key", record.key.as_str())
            .with("text", record.text.as_str()))
    }

    fn merge(&self, current: &Entry, incoming: Entry) -> Entry {
        append(current, incoming)
    }
}

impl KeyedCodec for JournalCodec {
    type Id = String;

    fn id_for(&self, record: &Entry) -> String {
        record.key.clone()
    }

    fn locator_for_id(&self, id: &String) -> Result<Locator, TypeError> {
        self.namespace.join(id)
    }
}

fn entry(text: &str) -> Entry {
    Entry {
        key: "day".into(),
        text: text.into(),
    }
}

#[tokio::test]
async fn put_then_get_round_trips() {
    init_tracing();
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);

    for tally in [Tally::new("a", 1), Tally::new("b", -4), Tally::new("c", i64::MAX)] {
        store.put(tally.clone());
        store.flush().await;
        assert_eq!(store.get_one(&tally.key).await, Some(tally));
    }
}

#[tokio::test]
async fn last_write_wins_by_default() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);

    let writes: Vec<i64> = (0..100).map(|i| (i * 37) % 11).collect();
    for count in &writes {
        store.put(Tally::new("hits", *count));
    }
    store.flush().await;

    let expected = fold(&LastWriteWins, None, writes.iter().map(|c| Tally::new("hits", *c)));
    assert_eq!(store.get_one(&"hits".into()).await, expected);
}

#[tokio::test]
async fn merge_sees_writes_in_submission_order() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = KeyedStore::new(backend, JournalCodec::new(), StoreConfig::named("journal")).unwrap();

    for text in ["a", "b", "c", "d"] {
        store.put(entry(text));
    }
    store.flush().await;

    assert_eq!(store.get_one(&"day".into()).await, Some(entry("abcd")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn final_state_is_left_fold_of_writes(texts in prop::collection::vec("[a-c]{1,3}", 1..12)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let stored = rt.block_on(async {
            let backend = Arc::new(InMemoryBackend::new());
            let store = KeyedStore::new(backend, JournalCodec::new(), StoreConfig::named("journal")).unwrap();
            for text in &texts {
                store.put(entry(text));
            }
            store.flush().await;
            store.get_one(&"day".into()).await
        });

        let expected = fold(&append, None, texts.iter().map(|t| entry(t)));
        prop_assert_eq!(stored, expected);
    }
}

#[tokio::test]
async fn equal_write_is_suppressed() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);
    let mut stream = Box::pin(store.get_stream(&"hits".into()));
    let _ = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;

    store.put(Tally::new("hits", 3));
    let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap();
    assert_eq!(first, Some(Tally::new("hits", 3)));

    let writes_before = backend.stats().writes();
    store.put(Tally::new("hits", 3));
    store.flush().await;

    assert_eq!(backend.stats().writes(), writes_before);
    let nothing = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
    assert!(nothing.is_err(), "no event for an unchanged value");
}

#[tokio::test]
async fn stream_starts_with_existing_value() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);
    store.put(Tally::new("hits", 9));
    store.flush().await;

    let mut stream = Box::pin(store.get_stream(&"hits".into()));
    let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap();
    assert_eq!(first, Some(Tally::new("hits", 9)));
}

#[tokio::test]
async fn stream_without_value_yields_exactly_the_next_put() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);

    let mut stream = Box::pin(store.get_stream(&"hits".into()));
    // Let the initial read finish empty before writing.
    let initial = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(initial.is_err());

    store.put(Tally::new("hits", 4));
    let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap();
    assert_eq!(event, Some(Tally::new("hits", 4)));

    let extra = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
    assert!(extra.is_err(), "exactly one event per change");
}

#[tokio::test]
async fn stream_only_sees_its_own_id() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);
    let mut stream_a = Box::pin(store.get_stream(&"a".into()));

    let writer_a = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 1..=20 {
                store.put(Tally::new("a", i));
            }
        })
    };
    let writer_b = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 1..=20 {
                store.put(Tally::new("b", -i));
            }
        })
    };
    writer_a.await.unwrap();
    writer_b.await.unwrap();
    store.flush().await;

    let mut seen = Vec::new();
    while let Ok(Some(tally)) = tokio::time::timeout(Duration::from_millis(200), stream_a.next()).await {
        seen.push(tally);
    }
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|t| t.key == "a"), "foreign event in {seen:?}");
    assert_eq!(store.get_one(&"b".into()).await, Some(Tally::new("b", -20)));
}

#[tokio::test]
async fn silent_backend_still_publishes() {
    let backend = Arc::new(InMemoryBackend::without_notifications());
    let store = tally_store(&backend);
    let mut stream = Box::pin(store.get_stream(&"hits".into()));
    let _ = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;

    store.put(Tally::new("hits", 2));
    let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap();
    assert_eq!(event, Some(Tally::new("hits", 2)));
}

#[tokio::test]
async fn writes_are_dropped_while_backend_is_offline() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = tally_store(&backend);

    backend.set_offline(true);
    store.put(Tally::new("hits", 1));
    store.flush().await;
    backend.set_offline(false);

    assert!(store.get_one(&"hits".into()).await.is_none());
    store.put(Tally::new("hits", 2));
    store.flush().await;
    assert_eq!(store.get_one(&"hits".into()).await, Some(Tally::new("hits", 2)));
}
