//! Decode fuzz target: arbitrary bytes as a message body (binary and hex bitmap) and as a
//! blocked record stream. Must not panic.
//! Build with: cargo fuzz run unpack_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use ipmcodec::{BitmapEncoding, Codec, MessageReader, Schema, StreamOptions, TextEncoding};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let _ = Codec::default().unpack(data);
    let hex = Codec::new(Schema::card_network(), TextEncoding::Latin1, BitmapEncoding::Hex);
    let _ = hex.unpack(data);
    for item in MessageReader::new(data, Codec::default(), StreamOptions::blocked()) {
        let _ = item;
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run unpack_fuzz");
}
