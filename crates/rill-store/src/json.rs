//! Helpers for records stored as a single JSON document.
//!
//! A JSON-backed record occupies two columns: its identifier and the
//! serialized document. [`encode_row`] and [`decode_row`] do the conversion
//! so a [`RecordCodec`](crate::RecordCodec) only has to pick the id.

use rill_types::{Row, Schema, TypeError, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};

pub const ID_COLUMN: &str = "id";
pub const JSON_COLUMN: &str = "json";
pub const JSON_COLUMNS: [&str; 2] = [ID_COLUMN, JSON_COLUMN];

/// The two-column schema of a JSON-backed record.
pub fn json_schema() -> Result<Schema, TypeError> {
    Schema::new(JSON_COLUMNS)
}

/// Serialize `record` into the `json` column next to `id`.
pub fn encode_row<T: Serialize>(id: impl Into<Value>, record: &T) -> CodecResult<Row> {
    let document = serde_json::to_string(record)?;
    Ok(Row::new().with(ID_COLUMN, id).with(JSON_COLUMN, document))
}

/// Deserialize the `json` column of `row`.
pub fn decode_row<T: DeserializeOwned>(row: &Row) -> CodecResult<T> {
    let document = row.require_str(JSON_COLUMN)?;
    if document.is_empty() {
        return Err(CodecError::Invalid("empty json column".into()));
    }
    Ok(serde_json::from_str(document)?)
}
