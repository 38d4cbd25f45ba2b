//! Dynamic document value type.

use crate::encoder::to_canonical_cbor;
use crate::format::key_order;
use std::cmp::Ordering;

/// A dynamic CBOR value.
///
/// This is the value type of every document field in KoalaDB. Floats are
/// supported (documents carry epoch-second timestamps), but NaN is not:
/// the encoder rejects it so that every stored value compares equal to itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs (keys are sorted for canonical encoding).
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value with keys in canonical order.
    ///
    /// Keys are sorted by their canonical CBOR encoding. When a key appears
    /// more than once the last entry wins, as with repeated map inserts.
    /// Keys that cannot be encoded (NaN) go last and are left for the
    /// encoder to reject.
    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        let mut keyed: Vec<(Option<Vec<u8>>, Value, Value)> = pairs
            .into_iter()
            .map(|(key, value)| (to_canonical_cbor(&key).ok(), key, value))
            .collect();
        keyed.sort_by(|a, b| cmp_encoded(a.0.as_deref(), b.0.as_deref()));

        let mut unique: Vec<(Option<Vec<u8>>, Value, Value)> = Vec::with_capacity(keyed.len());
        for entry in keyed {
            match unique.last_mut() {
                Some(last) if last.0.is_some() && last.0 == entry.0 => last.2 = entry.2,
                _ => unique.push(entry),
            }
        }
        Value::Map(unique.into_iter().map(|(_, key, value)| (key, value)).collect())
    }

    /// Rebuilds every map inside this value with [`Value::map`].
    ///
    /// The result is what decoding its encoding yields, so a canonical value
    /// held in memory equals the one read back from a collection file.
    #[must_use]
    pub fn into_canonical(self) -> Self {
        match self {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::into_canonical).collect())
            }
            Value::Map(pairs) => Value::map(
                pairs
                    .into_iter()
                    .map(|(key, value)| (key.into_canonical(), value.into_canonical()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Create a map value from text keys.
    pub fn text_map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v.into()))
                .collect(),
        )
    }

    /// Compare two values by their canonical CBOR encodings: shorter
    /// first, then bytewise. This is the order of keys in an encoded map.
    ///
    /// Values that cannot be encoded sort after all others.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        cmp_encoded(
            to_canonical_cbor(self).ok().as_deref(),
            to_canonical_cbor(other).ok().as_deref(),
        )
    }

    /// Short name of this value's variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as a number, widening integers to `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

fn cmp_encoded(a: Option<&[u8]>, b: Option<&[u8]>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => key_order(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Value::Text).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
