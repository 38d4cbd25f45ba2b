//! Canonical CBOR decoder.
//!
//! Only the canonical form written by [`to_canonical_cbor`](crate::to_canonical_cbor)
//! is accepted, so any input that decodes re-encodes to the same bytes.
//! Tags, undefined, and half or single precision floats never appear in a
//! collection file and are rejected.

use crate::error::{CodecError, CodecResult};
use crate::format::{
    argument_len, check_len, key_order, ARRAY, BYTES, INDEFINITE, MAP, MAX_DEPTH, MAX_ITEMS,
    MAX_STRING_LEN, NEGATIVE, TAG, TEXT, UNSIGNED,
};
use crate::value::Value;
use std::cmp::Ordering;

/// Upper bound on capacity reserved from a declared length.
const PREALLOCATE: usize = 1024;

/// Decodes exactly one canonical CBOR item.
///
/// # Errors
///
/// Fails on malformed or non-canonical input, on items outside the
/// [`Value`] model, and on bytes left after the item.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut reader = Reader {
        input: bytes,
        pos: 0,
        depth: 0,
    };
    let value = reader.value()?;
    match bytes.len() - reader.pos {
        0 => Ok(value),
        count => Err(CodecError::TrailingBytes { count }),
    }
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    /// Arrays and maps enclosing the current item.
    depth: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let input = self.input;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= input.len())
            .ok_or(CodecError::UnexpectedEof)?;
        let bytes = &input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn byte(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads the argument announced by `info`, requiring the shortest form.
    fn argument(&mut self, info: u8) -> CodecResult<u64> {
        let width = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => 1,
            25 => 2,
            26 => 4,
            27 => 8,
            INDEFINITE => return Err(CodecError::IndefiniteLength),
            _ => {
                return Err(CodecError::invalid_structure(format!(
                    "reserved additional info {info}"
                )))
            }
        };
        let mut raw = [0u8; 8];
        raw[8 - width..].copy_from_slice(self.take(width)?);
        let n = u64::from_be_bytes(raw);
        if argument_len(n) != width {
            return Err(CodecError::non_canonical(format!(
                "{n} written with a {width}-byte argument"
            )));
        }
        Ok(n)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn length(&mut self, info: u8, max: u64) -> CodecResult<usize> {
        let claimed = self.argument(info)?;
        check_len(claimed, max)?;
        Ok(claimed as usize)
    }

    fn value(&mut self) -> CodecResult<Value> {
        let initial = self.byte()?;
        let info = initial & 0x1f;

        match initial >> 5 {
            UNSIGNED => {
                let n = self.argument(info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::unsupported(format!("integer {n} above i64::MAX")))
            }
            NEGATIVE => {
                let n = self.argument(info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(-1 - n))
                    .map_err(|_| CodecError::unsupported(format!("integer -1-{n} below i64::MIN")))
            }
            BYTES => {
                let len = self.length(info, MAX_STRING_LEN)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            TEXT => {
                let len = self.length(info, MAX_STRING_LEN)?;
                let text = std::str::from_utf8(self.take(len)?).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_owned()))
            }
            ARRAY => {
                let len = self.length(info, MAX_ITEMS)?;
                self.nested(|reader| {
                    let mut items = Vec::with_capacity(len.min(PREALLOCATE));
                    for _ in 0..len {
                        items.push(reader.value()?);
                    }
                    Ok(Value::Array(items))
                })
            }
            MAP => {
                let len = self.length(info, MAX_ITEMS)?;
                self.nested(|reader| reader.map_entries(len))
            }
            TAG => Err(CodecError::unsupported("tagged item")),
            // Major type 7
            _ => self.simple(info),
        }
    }

    fn nested(&mut self, read: impl FnOnce(&mut Self) -> CodecResult<Value>) -> CodecResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::DepthExceeded { max: MAX_DEPTH });
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    /// Reads `len` entries whose encoded keys must strictly increase.
    fn map_entries(&mut self, len: usize) -> CodecResult<Value> {
        let input = self.input;
        let mut pairs = Vec::with_capacity(len.min(PREALLOCATE));
        let mut previous: Option<&'a [u8]> = None;

        for _ in 0..len {
            let start = self.pos;
            let key = self.value()?;
            let encoded = &input[start..self.pos];
            if let Some(previous) = previous {
                match key_order(previous, encoded) {
                    Ordering::Less => {}
                    Ordering::Equal => {
                        return Err(CodecError::invalid_structure(format!(
                            "duplicate map key {key:?}"
                        )))
                    }
                    Ordering::Greater => {
                        return Err(CodecError::non_canonical(format!(
                            "map key {key:?} out of order"
                        )))
                    }
                }
            }
            previous = Some(encoded);
            let value = self.value()?;
            pairs.push((key, value));
        }
        Ok(Value::Map(pairs))
    }

    fn simple(&mut self, info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 | 26 => Err(CodecError::non_canonical("float narrower than 8 bytes")),
            27 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                let f = f64::from_bits(u64::from_be_bytes(raw));
                if f.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                Ok(Value::Float(f))
            }
            INDEFINITE => Err(CodecError::invalid_structure("break outside an indefinite item")),
            other => Err(CodecError::unsupported(format!("simple value {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn reads_a_document_entry() {
        // ["u1", {"age": 30, "name": "Al", "_created_at": 1.5}]
        let mut bytes = vec![0x82, 0x62, b'u', b'1', 0xa3];
        bytes.extend_from_slice(&[0x63, b'a', b'g', b'e', 0x18, 30]);
        bytes.extend_from_slice(&[0x64, b'n', b'a', b'm', b'e', 0x62, b'A', b'l']);
        bytes.push(0x6b);
        bytes.extend_from_slice(b"_created_at");
        bytes.extend_from_slice(&[0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]);

        let expected = Value::Array(vec![
            text("u1"),
            Value::Map(vec![
                (text("age"), Value::Integer(30)),
                (text("name"), text("Al")),
                (text("_created_at"), Value::Float(1.5)),
            ]),
        ]);
        assert_eq!(from_cbor(&bytes).unwrap(), expected);
    }

    #[test]
    fn integer_range() {
        assert_eq!(from_cbor(&[0x37]).unwrap(), Value::Integer(-24));
        assert_eq!(
            from_cbor(&[0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).unwrap(),
            Value::Integer(i64::MIN)
        );
        // 2^63 does not fit either way round.
        let beyond = [0x1b, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(from_cbor(&beyond), Err(CodecError::Unsupported { .. })));
        let below = [0x3b, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(from_cbor(&below), Err(CodecError::Unsupported { .. })));
    }

    #[test]
    fn rejects_long_form_arguments() {
        for bytes in [&[0x18, 23][..], &[0x19, 0x00, 0xff], &[0x7a, 0, 0, 0, 1, b'a']] {
            assert!(
                matches!(from_cbor(bytes), Err(CodecError::NonCanonical { .. })),
                "{bytes:x?}"
            );
        }
    }

    #[test]
    fn rejects_disordered_and_repeated_keys() {
        let disordered = [0xa2, 0x62, b'a', b'a', 0x01, 0x61, b'b', 0x02];
        assert!(matches!(from_cbor(&disordered), Err(CodecError::NonCanonical { .. })));

        let repeated = [0xa2, 0x61, b'k', 0x01, 0x61, b'k', 0x02];
        assert!(matches!(
            from_cbor(&repeated),
            Err(CodecError::InvalidStructure { message }) if message.contains("duplicate map key")
        ));
    }

    #[test]
    fn floats_must_be_finite_doubles() {
        assert!(matches!(from_cbor(&[0xf9, 0x3c, 0x00]), Err(CodecError::NonCanonical { .. })));
        assert!(matches!(
            from_cbor(&[0xfa, 0x3f, 0x80, 0, 0]),
            Err(CodecError::NonCanonical { .. })
        ));
        assert_eq!(
            from_cbor(&[0xfb, 0x7f, 0xf8, 0, 0, 0, 0, 0, 0]),
            Err(CodecError::NaNForbidden)
        );
        assert_eq!(
            from_cbor(&[0xfb, 0x7f, 0xf0, 0, 0, 0, 0, 0, 0]).unwrap(),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn rejects_items_outside_the_value_model() {
        // tag 1 (epoch time) around an integer
        assert!(matches!(from_cbor(&[0xc1, 0x01]), Err(CodecError::Unsupported { .. })));
        // undefined
        assert!(matches!(from_cbor(&[0xf7]), Err(CodecError::Unsupported { .. })));
        // lone break
        assert!(matches!(from_cbor(&[0xff]), Err(CodecError::InvalidStructure { .. })));
    }

    #[test]
    fn rejects_indefinite_lengths() {
        for bytes in [&[0x5f, 0xff][..], &[0x7f, 0xff], &[0x9f, 0xff], &[0xbf, 0xff]] {
            assert_eq!(from_cbor(bytes), Err(CodecError::IndefiniteLength), "{bytes:x?}");
        }
    }

    #[test]
    fn truncated_and_trailing_input() {
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x63, b'a', b'b']), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x82, 0x01]), Err(CodecError::UnexpectedEof));
        assert_eq!(
            from_cbor(&[0xf6, 0x00, 0x00]),
            Err(CodecError::TrailingBytes { count: 2 })
        );
    }

    #[test]
    fn declared_sizes_are_bounded() {
        // An array claiming 2^32 elements in a nine-byte input
        assert_eq!(
            from_cbor(&[0x9b, 0, 0, 0, 1, 0, 0, 0, 0]),
            Err(CodecError::SizeLimitExceeded {
                claimed: 1 << 32,
                max_allowed: MAX_ITEMS,
            })
        );
        // A string claiming more bytes than are present
        assert_eq!(
            from_cbor(&[0x7a, 0x00, 0x01, 0x00, 0x00]),
            Err(CodecError::UnexpectedEof)
        );
    }

    #[test]
    fn nesting_is_bounded() {
        let mut bytes = vec![0x81; MAX_DEPTH];
        bytes.push(0xf6);
        assert!(from_cbor(&bytes).is_ok());

        let mut too_deep = vec![0x81; MAX_DEPTH + 1];
        too_deep.push(0xf6);
        assert_eq!(
            from_cbor(&too_deep),
            Err(CodecError::DepthExceeded { max: MAX_DEPTH })
        );
    }

    #[test]
    fn invalid_utf8() {
        assert_eq!(from_cbor(&[0x62, 0xc3, 0x28]), Err(CodecError::InvalidUtf8));
    }
}
