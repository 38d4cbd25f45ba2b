//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::format::{
    check_len, key_order, write_head, ARRAY, BYTES, DOUBLE, FALSE, MAP, MAX_DEPTH, MAX_ITEMS,
    MAX_STRING_LEN, NEGATIVE, NULL, TEXT, TRUE, UNSIGNED,
};
use crate::value::Value;

/// Encodes a value to canonical CBOR (RFC 8949 §4.2.1).
///
/// Map keys are written in canonical order whatever order the value holds
/// them in, heads use the shortest argument, and floats are always 8-byte
/// doubles. Equal values therefore encode to equal bytes.
///
/// # Errors
///
/// Fails on NaN, on a map that repeats a key, and on values beyond the
/// decoder's limits.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(&mut out, value)?;
    Ok(out)
}

/// Appends the canonical encoding of `value` to `out`.
///
/// On error `out` may hold a partial item and should be discarded.
///
/// # Errors
///
/// See [`to_canonical_cbor`].
pub fn encode_into(out: &mut Vec<u8>, value: &Value) -> CodecResult<()> {
    write_value(out, value, 0)
}

/// `depth` counts the arrays and maps enclosing `value`.
fn write_value(out: &mut Vec<u8>, value: &Value, depth: usize) -> CodecResult<()> {
    match value {
        Value::Null => out.push(NULL),
        Value::Bool(b) => out.push(if *b { TRUE } else { FALSE }),
        Value::Integer(n) => write_integer(out, *n),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(CodecError::NaNForbidden);
            }
            out.push(DOUBLE);
            out.extend_from_slice(&f.to_bits().to_be_bytes());
        }
        Value::Bytes(bytes) => write_string(out, BYTES, bytes)?,
        Value::Text(text) => write_string(out, TEXT, text.as_bytes())?,
        Value::Array(items) => {
            enter(depth, items.len())?;
            write_head(out, ARRAY, items.len() as u64);
            for item in items {
                write_value(out, item, depth + 1)?;
            }
        }
        Value::Map(pairs) => {
            enter(depth, pairs.len())?;
            write_map(out, pairs, depth)?;
        }
    }
    Ok(())
}

#[allow(clippy::cast_sign_loss)]
fn write_integer(out: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        write_head(out, UNSIGNED, n as u64);
    } else {
        // Negative n is stored as -1 - n, which fits in u64 for every i64.
        write_head(out, NEGATIVE, (-1 - n) as u64);
    }
}

fn write_string(out: &mut Vec<u8>, major: u8, bytes: &[u8]) -> CodecResult<()> {
    check_len(bytes.len() as u64, MAX_STRING_LEN)?;
    write_head(out, major, bytes.len() as u64);
    out.extend_from_slice(bytes);
    Ok(())
}

fn enter(depth: usize, len: usize) -> CodecResult<()> {
    if depth >= MAX_DEPTH {
        return Err(CodecError::DepthExceeded { max: MAX_DEPTH });
    }
    check_len(len as u64, MAX_ITEMS)
}

/// Writes map entries sorted by encoded key.
///
/// A repeated key is an error: the decoder requires strictly increasing
/// keys, so such a map could be written but never read back.
fn write_map(out: &mut Vec<u8>, pairs: &[(Value, Value)], depth: usize) -> CodecResult<()> {
    let mut entries = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        let mut encoded = Vec::new();
        write_value(&mut encoded, key, depth + 1)?;
        entries.push((encoded, key, value));
    }
    entries.sort_by(|a, b| key_order(&a.0, &b.0));

    if let Some(pair) = entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(CodecError::invalid_structure(format!(
            "duplicate map key {:?}",
            pair[0].1
        )));
    }

    write_head(out, MAP, entries.len() as u64);
    for (encoded, _, value) in entries {
        out.extend_from_slice(&encoded);
        write_value(out, value, depth + 1)?;
    }
    Ok(())
}
