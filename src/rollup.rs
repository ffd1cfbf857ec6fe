//! Tag-rollup sub-fields (PDS) carried in the additional-data elements.
//!
//! A field body is a run of `tag(4 digits) length(3 digits) value(length bytes)` units with
//! no delimiter. Decoding emits `PDS{tag}` keys. Encoding gathers every `PDS*` key of a
//! message and packs the units into chunks of at most [`MAX_CHUNK_LEN`] bytes, never
//! splitting a unit.

use crate::encoding::{parse_digits, TextEncoding};
use crate::value::{Message, Value};
use tracing::warn;

pub const PDS_PREFIX: &str = "PDS";
/// Largest chunk a 3-digit length prefix can carry.
pub const MAX_CHUNK_LEN: usize = 999;

const TAG_DIGITS: usize = 4;
const LEN_DIGITS: usize = 3;
const MAX_TAG: u32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollupError {
    #[error("{key}: tag is not a number in 0..=9999")]
    InvalidKey { key: String },
    #[error("{key}: value of {len} bytes does not fit a 3-digit length")]
    ValueTooLong { key: String, len: usize },
}

/// `PDS{tag}` key for a numeric tag.
pub fn pds_key(tag: u32) -> String {
    format!("{}{:04}", PDS_PREFIX, tag)
}

/// Decode `body` into `PDS{tag}` entries of `out`.
///
/// A malformed remainder stops decoding; entries decoded before it are kept.
pub fn decode_into(field_id: u8, body: &[u8], encoding: TextEncoding, out: &mut Message) {
    let mut pos = 0;
    while pos < body.len() {
        let header_end = pos + TAG_DIGITS + LEN_DIGITS;
        let Some(header) = body.get(pos..header_end) else {
            warn!(field = field_id, offset = pos, "PDS data truncated inside a tag/length header");
            return;
        };
        let (tag, len) = header.split_at(TAG_DIGITS);
        if parse_digits(tag).is_none() {
            warn!(field = field_id, offset = pos, "PDS tag is not numeric");
            return;
        }
        let Some(len) = parse_digits(len) else {
            warn!(field = field_id, offset = pos, "PDS length is not numeric");
            return;
        };
        let Some(value) = body.get(header_end..header_end + len) else {
            warn!(
                field = field_id,
                offset = pos,
                len,
                available = body.len() - header_end,
                "PDS value runs past the end of the field"
            );
            return;
        };
        let key = format!("{}{}", PDS_PREFIX, encoding.decode(tag));
        out.insert(key, Value::Str(encoding.decode(value)));
        pos = header_end + len;
    }
}

/// All `PDS*` entries of a message as `(tag, text)`, sorted by numeric tag.
pub fn collect(message: &Message) -> Result<Vec<(u32, String)>, RollupError> {
    let mut entries = Vec::new();
    for (key, value) in message {
        let Some(suffix) = key.strip_prefix(PDS_PREFIX) else {
            continue;
        };
        let tag = parse_digits(suffix.as_bytes())
            .and_then(|t| u32::try_from(t).ok())
            .filter(|&t| t <= MAX_TAG)
            .ok_or_else(|| RollupError::InvalidKey { key: key.clone() })?;
        entries.push((tag, value.to_string()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Pack entries into chunks; a unit goes to a new chunk when appending it would push the
/// current one past [`MAX_CHUNK_LEN`] bytes.
pub fn encode(entries: &[(u32, String)], encoding: TextEncoding) -> Result<Vec<String>, RollupError> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for (tag, value) in entries {
        let value_len = encoding.encoded_len(value);
        if value_len > MAX_CHUNK_LEN {
            return Err(RollupError::ValueTooLong { key: pds_key(*tag), len: value_len });
        }
        let unit = format!("{:04}{:03}{}", tag, value_len, value);
        let unit_len = TAG_DIGITS + LEN_DIGITS + value_len;
        if !current.is_empty() && current_len + unit_len > MAX_CHUNK_LEN {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(&unit);
        current_len += unit_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}
