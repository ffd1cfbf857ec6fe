//! Compact TLV for chip (ICC) data.
//!
//! Not general BER-TLV: a tag is two bytes only when its first byte is `0x9F` or `0x5F`,
//! and a length is always a single unsigned byte. A `0x00` tag byte ends the data.

use crate::value::{Message, Value};
use tracing::warn;

/// Key holding the whole field body as uppercase hex.
pub const ICC_DATA_KEY: &str = "ICC_DATA";
pub const TAG_PREFIX: &str = "TAG";

const TWO_BYTE_TAG_PREFIXES: [u8; 2] = [0x9F, 0x5F];
const TERMINATOR: u8 = 0x00;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    #[error("tag {tag} must be 1 byte, or 2 bytes starting with 9F/5F")]
    InvalidTag { tag: String },
    #[error("tag {tag}: value of {len} bytes does not fit a 1-byte length")]
    ValueTooLong { tag: String, len: usize },
}

fn tag_len(first: u8) -> usize {
    if TWO_BYTE_TAG_PREFIXES.contains(&first) {
        2
    } else {
        1
    }
}

/// Decode `body` into `ICC_DATA` and `TAG{hex}` entries of `out`.
///
/// A malformed remainder stops decoding; entries decoded before it are kept.
pub fn decode_into(field_id: u8, body: &[u8], out: &mut Message) {
    out.insert(ICC_DATA_KEY.to_string(), Value::Str(hex::encode_upper(body)));
    let mut pos = 0;
    while let Some(&first) = body.get(pos) {
        if first == TERMINATOR {
            break;
        }
        let tag_end = pos + tag_len(first);
        let Some(tag) = body.get(pos..tag_end) else {
            warn!(field = field_id, offset = pos, "ICC data truncated inside a tag");
            return;
        };
        let Some(&len) = body.get(tag_end) else {
            warn!(field = field_id, offset = pos, "ICC data truncated before a length byte");
            return;
        };
        let start = tag_end + 1;
        let Some(value) = body.get(start..start + len as usize) else {
            warn!(
                field = field_id,
                offset = pos,
                len,
                available = body.len() - start,
                "ICC value runs past the end of the field"
            );
            return;
        };
        out.insert(
            format!("{}{}", TAG_PREFIX, hex::encode_upper(tag)),
            Value::Str(hex::encode_upper(value)),
        );
        pos = start + len as usize;
    }
}

/// Build a compact-TLV body from `(tag, value)` pairs, in the given order.
pub fn encode(entries: &[(Vec<u8>, Vec<u8>)]) -> Result<Vec<u8>, TlvError> {
    let mut out = Vec::new();
    for (tag, value) in entries {
        let valid = match tag.as_slice() {
            [first] => tag_len(*first) == 1 && *first != TERMINATOR,
            [first, _] => tag_len(*first) == 2,
            _ => false,
        };
        if !valid {
            return Err(TlvError::InvalidTag { tag: hex::encode_upper(tag) });
        }
        let len = u8::try_from(value.len()).map_err(|_| TlvError::ValueTooLong {
            tag: hex::encode_upper(tag),
            len: value.len(),
        })?;
        out.extend_from_slice(tag);
        out.push(len);
        out.extend_from_slice(value);
    }
    Ok(out)
}
