//! # ipmcodec: ISO 8583 codec and IPM file framing
//!
//! Encodes and decodes ISO 8583 financial messages against a configurable field schema,
//! and reads/writes them as IPM batch files: length-prefixed records, optionally wrapped in
//! fixed 1014-byte physical blocks.
//!
//! ## Layers
//!
//! - **Schema**: field id (2..=128) to layout (fixed, LLVAR, LLLVAR), value type and
//!   sub-field processor. Built in ([`Schema::card_network`]) or parsed from text
//!   ([`parse_schema`]).
//! - **Codec**: bitmap-driven `pack` / `unpack` ([`Codec`]).
//! - **Sub-fields**: PDS tag rollup ([`rollup`]), chip data TLV ([`tlv`]), acceptor
//!   location pattern ([`positional`]).
//! - **Framing**: 4-byte length-prefixed records ([`frame`]) and 1014 blocking ([`block`]).
//! - **Streams**: [`MessageReader`] / [`MessageWriter`] composing the above.
//!
//! ## Example schema
//!
//! ```text
//! 2:  llvar(19) "Primary account number";
//! 4:  fixed(12) int "Amount, transaction";
//! 48: lllvar(999) rollup "Additional data";
//! 55: lllvar(255) tlv "ICC system related data";
//! ```
//!
//! ## Usage
//!
//! See `tests/integration.rs` and `tests/stream.rs` for full examples.

pub mod bitmap;
pub mod block;
pub mod codec;
pub mod dump;
pub mod encoding;
pub mod frame;
pub mod parser;
pub mod positional;
pub mod rollup;
pub mod schema;
pub mod stream;
pub mod tlv;
pub mod value;

pub use bitmap::{bitmap_to_bytes, bytes_to_bitmap, Bitmap};
pub use codec::{BitmapEncoding, Codec, CodecError};
pub use encoding::TextEncoding;
pub use frame::{FrameError, RecordReader, RecordWriter};
pub use parser::parse_schema;
pub use schema::{default_schema, FieldKind, FieldSpec, Processor, Schema, SchemaError, ValueType};
pub use stream::{FileLayout, MessageReader, MessageWriter, StreamError, StreamOptions};
pub use value::{Message, Value};
