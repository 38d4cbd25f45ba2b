//! Conversion between document values and JSON.

use koaladb_codec::Value;
use koaladb_core::Document;
use serde_json::{Map, Number, Value as Json};

/// Parses a command-line value: JSON when it parses, otherwise a string.
///
/// `30` is an integer, `"30"` and `thirty` are strings, `[1,2]` an array.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str::<Json>(raw).map_or_else(|_| Value::Text(raw.to_string()), from_json)
}

/// Parses a `field=value` argument. The value may itself contain `=`.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), parse_value(value))),
        _ => Err(format!("expected field=value, got {raw:?}")),
    }
}

/// Converts JSON to a document value.
///
/// Integers outside the `i64` range become floats.
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        Json::String(s) => Value::Text(s),
        Json::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        Json::Object(fields) => {
            Value::text_map(fields.into_iter().map(|(k, v)| (k, from_json(v))))
        }
    }
}

/// Converts a document value to JSON.
///
/// Byte strings become arrays of numbers; non-text map keys are rendered
/// as their JSON text.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(pairs) => Json::Object(
            pairs
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::Text(s) => s.clone(),
                        other => to_json(other).to_string(),
                    };
                    (key, to_json(v))
                })
                .collect::<Map<String, Json>>(),
        ),
    }
}

/// Converts a document to a JSON object.
pub fn document_to_json(doc: &Document) -> Json {
    Json::Object(doc.iter().map(|(k, v)| (k.to_string(), to_json(v))).collect())
}
