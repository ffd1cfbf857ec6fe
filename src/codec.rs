//! Pack/unpack ISO 8583 messages against a [`Schema`].
//!
//! Wire layout: 4-character MTI, a 128-bit bitmap (16 raw bytes or 32 ASCII hex
//! characters), then every present field in ascending id order. Variable fields carry a
//! 2- or 3-digit decimal length prefix. Sub-field processors run on decode and add derived
//! keys next to the `DE{n}` value; on encode, `PDS*` keys are rolled back up into the
//! tag-rollup fields.

use crate::bitmap::{Bitmap, BITMAP_BYTES, HEX_BITMAP_BYTES};
use crate::encoding::{parse_digits, TextEncoding};
use crate::positional;
use crate::rollup::{self, RollupError};
use crate::schema::{
    default_schema, FieldKind, FieldSpec, Processor, Schema, ValueType, MAX_FIELD_ID, MIN_FIELD_ID,
};
use crate::tlv;
use crate::value::{field_key, Message, Value, MTI_KEY};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, trace, warn};

pub const MTI_LEN: usize = 4;

/// How the bitmap is written on the wire. Writer and reader of a stream must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitmapEncoding {
    /// 16 raw bytes.
    #[default]
    Binary,
    /// 32 ASCII hex characters.
    Hex,
}

impl BitmapEncoding {
    pub fn wire_len(&self) -> usize {
        match self {
            BitmapEncoding::Binary => BITMAP_BYTES,
            BitmapEncoding::Hex => HEX_BITMAP_BYTES,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("no field definition for DE{field}")]
    UnknownField { field: u8, context: Vec<u8> },
    #[error("{what} truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        what: String,
        offset: usize,
        needed: usize,
        available: usize,
        context: Vec<u8>,
    },
    #[error("invalid field length DE{field}: {prefix:?}")]
    InvalidLength { field: u8, prefix: String, context: Vec<u8> },
    #[error("invalid hex bitmap {text:?}")]
    InvalidBitmap { text: String, context: Vec<u8> },
    #[error("unable to convert DE{field} {text:?} to {value_type}")]
    Conversion {
        field: u8,
        text: String,
        value_type: ValueType,
        context: Vec<u8>,
    },
    #[error("message data not correct length: parsed to {parsed}, total {total}")]
    LengthMismatch { parsed: usize, total: usize, context: Vec<u8> },
    #[error("MTI {0:?} is not 4 characters")]
    InvalidMti(String),
    #[error("DE{field}: {len} bytes exceeds the {max} its length prefix allows")]
    FieldTooLong { field: u8, len: usize, max: usize },
    #[error("DE{field}: {reason}")]
    InvalidValue { field: u8, reason: String },
    #[error("{chunks} PDS chunks but only {fields} tag-rollup fields configured")]
    RollupOverflow { chunks: usize, fields: usize },
    #[error(transparent)]
    Rollup(#[from] RollupError),
}

impl CodecError {
    /// Raw message bytes a decode error was raised on.
    pub fn context(&self) -> Option<&[u8]> {
        match self {
            CodecError::UnknownField { context, .. }
            | CodecError::Truncated { context, .. }
            | CodecError::InvalidLength { context, .. }
            | CodecError::InvalidBitmap { context, .. }
            | CodecError::Conversion { context, .. }
            | CodecError::LengthMismatch { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Codec {
    pub encoding: TextEncoding,
    pub bitmap: BitmapEncoding,
    schema: Schema,
    patterns: HashMap<u8, Regex>,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(default_schema().clone(), TextEncoding::Latin1, BitmapEncoding::Binary)
    }
}

impl Codec {
    pub fn new(schema: Schema, encoding: TextEncoding, bitmap: BitmapEncoding) -> Self {
        let mut patterns = HashMap::new();
        for spec in schema.fields() {
            if let Processor::PositionalPattern(source) = &spec.processor {
                match positional::compile(source) {
                    Ok(re) => {
                        patterns.insert(spec.id, re);
                    }
                    Err(e) => warn!(field = spec.id, error = %e, "positional pattern disabled"),
                }
            }
        }
        Codec { encoding, bitmap, schema, patterns }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decode one message body.
    pub fn unpack(&self, data: &[u8]) -> Result<Message, CodecError> {
        debug!(len = data.len(), "unpacking message");
        let mut r = FieldReader { data, pos: 0 };
        let mut out = Message::new();

        let mti = r.take(MTI_LEN, MTI_KEY)?;
        out.insert(MTI_KEY.to_string(), Value::Str(self.encoding.decode(mti)));

        let bitmap = self.read_bitmap(&mut r)?;
        for id in MIN_FIELD_ID..=MAX_FIELD_ID {
            if !bitmap.is_set(id as usize) {
                continue;
            }
            let spec = self.schema.get(id).ok_or_else(|| CodecError::UnknownField {
                field: id,
                context: data.to_vec(),
            })?;
            trace!(field = id, offset = r.pos, "unpacking field");
            self.unpack_field(spec, &mut r, &mut out)?;
        }

        if r.pos != data.len() {
            return Err(CodecError::LengthMismatch {
                parsed: r.pos,
                total: data.len(),
                context: data.to_vec(),
            });
        }
        Ok(out)
    }

    /// Encode one message body.
    pub fn pack(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        let rolled = self.roll_up_pds(message)?;

        // Bit 1: secondary bitmap always present.
        let mut bitmap = Bitmap::new();
        bitmap.set(1);
        let mut body = Vec::new();
        for id in MIN_FIELD_ID..=MAX_FIELD_ID {
            let value = match rolled.get(&id) {
                Some(rolled_value) => rolled_value.as_ref(),
                None => message.get(&field_key(id)),
            };
            let Some(value) = value else {
                continue;
            };
            bitmap.set(id as usize);
            match self.schema.get(id) {
                Some(spec) => self.pack_field(spec, value, &mut body)?,
                None => warn!(field = id, "no field definition, bit set without data"),
            }
        }

        let mti = message.get(MTI_KEY).map(Value::to_string).unwrap_or_default();
        let mti_bytes = self.encoding.encode(&mti);
        if mti_bytes.len() != MTI_LEN {
            return Err(CodecError::InvalidMti(mti));
        }

        let mut out = Vec::with_capacity(MTI_LEN + self.bitmap.wire_len() + body.len());
        out.extend_from_slice(&mti_bytes);
        let bitmap_bytes = bitmap.to_bytes(BITMAP_BYTES);
        match self.bitmap {
            BitmapEncoding::Binary => out.extend_from_slice(&bitmap_bytes),
            BitmapEncoding::Hex => out.extend_from_slice(hex::encode(bitmap_bytes).as_bytes()),
        }
        out.extend_from_slice(&body);
        debug!(len = out.len(), "packed message");
        Ok(out)
    }

    fn read_bitmap(&self, r: &mut FieldReader<'_>) -> Result<Bitmap, CodecError> {
        let raw = r.take(self.bitmap.wire_len(), "bitmap")?;
        match self.bitmap {
            BitmapEncoding::Binary => Ok(Bitmap::from_bytes(raw)),
            BitmapEncoding::Hex => hex::decode(raw)
                .map(|bytes| Bitmap::from_bytes(&bytes))
                .map_err(|_| CodecError::InvalidBitmap {
                    text: self.encoding.decode(raw),
                    context: r.data.to_vec(),
                }),
        }
    }

    fn unpack_field(
        &self,
        spec: &FieldSpec,
        r: &mut FieldReader<'_>,
        out: &mut Message,
    ) -> Result<(), CodecError> {
        let key = field_key(spec.id);
        let len = match spec.kind.prefix_len() {
            0 => spec.length,
            digits => {
                let prefix = r.take(digits, &key)?;
                parse_digits(prefix).ok_or_else(|| CodecError::InvalidLength {
                    field: spec.id,
                    prefix: self.encoding.decode(prefix),
                    context: r.data.to_vec(),
                })?
            }
        };
        let body = r.take(len, &key)?;

        if spec.processor == Processor::CompactTlv {
            tlv::decode_into(spec.id, body, out);
            out.insert(key, Value::Bytes(body.to_vec()));
            return Ok(());
        }

        let text = self.encoding.decode(body);
        match &spec.processor {
            Processor::TagRollup => rollup::decode_into(spec.id, body, self.encoding, out),
            Processor::PositionalPattern(_) => {
                if let Some(pattern) = self.patterns.get(&spec.id) {
                    positional::decode_into(spec.id, pattern, &text, out);
                }
            }
            Processor::None | Processor::CompactTlv => {}
        }
        let value = convert(spec, text, r.data)?;
        out.insert(key, value);
        Ok(())
    }

    /// Rolled-up values for the tag-rollup fields, by id. `None` marks a rollup field that
    /// received no chunk and is left out of the message.
    fn roll_up_pds(&self, message: &Message) -> Result<HashMap<u8, Option<Value>>, CodecError> {
        let entries = rollup::collect(message)?;
        if entries.is_empty() {
            return Ok(HashMap::new());
        }
        let chunks = rollup::encode(&entries, self.encoding)?;
        let fields = self.schema.rollup_fields();
        if chunks.len() > fields.len() {
            return Err(CodecError::RollupOverflow { chunks: chunks.len(), fields: fields.len() });
        }
        let mut chunks = chunks.into_iter();
        Ok(fields
            .into_iter()
            .map(|id| (id, chunks.next().map(Value::Str)))
            .collect())
    }

    fn pack_field(&self, spec: &FieldSpec, value: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let mut data = match value {
            Value::Bytes(b) => b.clone(),
            other => self.encoding.encode(&field_text(spec, other)?),
        };
        match spec.kind.max_len() {
            // Left aligned, space padded; longer values are cut to the declared length.
            None => data.resize(spec.length, b' '),
            Some(max) => {
                if data.len() > max {
                    return Err(CodecError::FieldTooLong { field: spec.id, len: data.len(), max });
                }
                let prefix = format!("{:0width$}", data.len(), width = spec.kind.prefix_len());
                out.extend_from_slice(prefix.as_bytes());
            }
        }
        out.extend_from_slice(&data);
        Ok(())
    }
}

struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(CodecError::Truncated {
                what: what.to_string(),
                offset: self.pos,
                needed: n,
                available: self.data.len() - self.pos,
                context: self.data.to_vec(),
            });
        };
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn convert(spec: &FieldSpec, text: String, context: &[u8]) -> Result<Value, CodecError> {
    let conversion_error = |text: String| CodecError::Conversion {
        field: spec.id,
        text,
        value_type: spec.value_type,
        context: context.to_vec(),
    };
    match spec.value_type {
        ValueType::String => Ok(Value::Str(text)),
        ValueType::Integer => match text.parse::<i64>() {
            Ok(n) => Ok(Value::Int(n)),
            Err(_) => Err(conversion_error(text)),
        },
        ValueType::Decimal => match Decimal::from_str(&text) {
            Ok(d) => Ok(Value::Decimal(d)),
            Err(_) => Err(conversion_error(text)),
        },
        ValueType::DateTime => match parse_datetime(&text, spec.date_format()) {
            Some(dt) => Ok(Value::DateTime(dt)),
            None => {
                debug!(field = spec.id, text = %text, "datetime not in field format, kept as text");
                Ok(Value::Str(text))
            }
        },
    }
}

/// Formats without a time part yield midnight.
fn parse_datetime(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn field_text(spec: &FieldSpec, value: &Value) -> Result<String, CodecError> {
    if spec.value_type == ValueType::Integer && spec.kind == FieldKind::Fixed {
        let n = match value {
            Value::Int(n) => *n,
            other => {
                let text = other.to_string();
                text.trim().parse::<i64>().map_err(|_| CodecError::InvalidValue {
                    field: spec.id,
                    reason: format!("{:?} is not an integer", text),
                })?
            }
        };
        return Ok(format!("{:0width$}", n, width = spec.length));
    }
    if spec.value_type == ValueType::Decimal && spec.kind == FieldKind::Fixed {
        let d = match value {
            Value::Decimal(d) => *d,
            Value::Int(n) => Decimal::from(*n),
            other => {
                let text = other.to_string();
                Decimal::from_str(text.trim()).map_err(|_| CodecError::InvalidValue {
                    field: spec.id,
                    reason: format!("{:?} is not a decimal", text),
                })?
            }
        };
        return Ok(zero_pad(&d.to_string(), spec.length));
    }
    Ok(value.to_field_text(spec.date_format()))
}

/// Left-pad numeric text with zeros to `width`, keeping a leading sign in front.
fn zero_pad(text: &str, width: usize) -> String {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let fill = width.saturating_sub(sign.len() + digits.len());
    format!("{}{}{}", sign, "0".repeat(fill), digits)
}
