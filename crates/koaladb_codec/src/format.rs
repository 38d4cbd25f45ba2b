//! CBOR item heads and the size limits shared by the encoder and decoder.
//!
//! Both sides enforce the same limits, so anything the encoder accepts
//! the decoder reads back.

use crate::error::{CodecError, CodecResult};
use std::cmp::Ordering;

pub(crate) const UNSIGNED: u8 = 0;
pub(crate) const NEGATIVE: u8 = 1;
pub(crate) const BYTES: u8 = 2;
pub(crate) const TEXT: u8 = 3;
pub(crate) const ARRAY: u8 = 4;
pub(crate) const MAP: u8 = 5;
pub(crate) const TAG: u8 = 6;

pub(crate) const FALSE: u8 = 0xf4;
pub(crate) const TRUE: u8 = 0xf5;
pub(crate) const NULL: u8 = 0xf6;
pub(crate) const DOUBLE: u8 = 0xfb;

/// Additional info announcing an indefinite length (or a break, in major type 7).
pub(crate) const INDEFINITE: u8 = 31;

/// Maximum element count of a single array or map.
pub const MAX_ITEMS: u64 = 16 * 1024 * 1024;

/// Maximum length in bytes of a single byte or text string.
pub const MAX_STRING_LEN: u64 = 256 * 1024 * 1024;

/// Maximum number of nested arrays and maps, counting the outermost.
pub const MAX_DEPTH: usize = 128;

/// Bytes that follow the initial byte to carry the argument `n`.
pub(crate) fn argument_len(n: u64) -> usize {
    match n {
        0..=23 => 0,
        24..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    }
}

/// Appends the head of an item of `major` type with argument `n`, in the
/// shortest form.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_head(out: &mut Vec<u8>, major: u8, n: u64) {
    let major = major << 5;
    match argument_len(n) {
        0 => out.push(major | n as u8),
        width => {
            let info = match width {
                1 => 24,
                2 => 25,
                4 => 26,
                _ => 27,
            };
            out.push(major | info);
            out.extend_from_slice(&n.to_be_bytes()[8 - width..]);
        }
    }
}

/// Canonical order of two encoded map keys: shorter first, then bytewise.
pub(crate) fn key_order(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Checks a declared string or container length against `max`.
pub(crate) fn check_len(claimed: u64, max: u64) -> CodecResult<()> {
    if claimed > max {
        return Err(CodecError::SizeLimitExceeded {
            claimed,
            max_allowed: max,
        });
    }
    Ok(())
}
