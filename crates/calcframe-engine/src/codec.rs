//! Transport-safe JSON encoding of column values.
//!
//! The codec is total: every [`Value`] encodes to some JSON value, for every
//! row of a table export. Missing data (explicit null or float NaN) encodes
//! as JSON null, wide integers as plain JSON integers, dates as ISO-8601
//! strings.

use serde_json::{Map, Number};

use crate::value::{Row, Value};

/// JSON sentinel for missing data.
const JSON_NULL: serde_json::Value = serde_json::Value::Null;

/// Encode a single value.
pub fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => JSON_NULL,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number(Number::from(*i)),
        // NaN and infinities have no JSON representation; both are the
        // missing-data sentinel on the wire.
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None => JSON_NULL,
        },
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
    }
}

/// Encode one row as a JSON object keyed by column slug.
pub fn row_to_json(row: &Row) -> serde_json::Value {
    let mut object = Map::with_capacity(row.len());
    for (slug, value) in row {
        object.insert(slug.clone(), json_value(value));
    }
    serde_json::Value::Object(object)
}

/// Encode a table as a JSON array of row objects.
pub fn table_to_json(table: &[Row]) -> serde_json::Value {
    serde_json::Value::Array(table.iter().map(row_to_json).collect())
}
