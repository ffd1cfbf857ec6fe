//! Print every message of an IPM file.
//!
//! Usage:
//!   decode_ipm [OPTIONS] FILE
//!
//! Options:
//!   --vbs           File has no 1014 blocking (length-prefixed records only)
//!   --hex-bitmap    Bitmaps are 32 ASCII hex characters
//!   --ascii         Decode text as ASCII instead of Latin-1
//!   --schema=FILE   Field catalog in schema definition syntax (default: built-in)
//!
//! Decode errors are reported on stderr and the next record is tried. Set RUST_LOG for
//! more detail (default: warn).

use anyhow::Context;
use ipmcodec::dump::format_message;
use ipmcodec::stream::open_reader;
use ipmcodec::{parse_schema, BitmapEncoding, Codec, Schema, StreamError, StreamOptions, TextEncoding};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let options = if take_flag(&mut raw_args, "--vbs") {
        StreamOptions::vbs()
    } else {
        StreamOptions::blocked()
    };
    let bitmap = if take_flag(&mut raw_args, "--hex-bitmap") {
        BitmapEncoding::Hex
    } else {
        BitmapEncoding::Binary
    };
    let encoding = if take_flag(&mut raw_args, "--ascii") {
        TextEncoding::Ascii
    } else {
        TextEncoding::Latin1
    };
    let schema_path: Option<PathBuf> = raw_args
        .iter()
        .position(|a| a.starts_with("--schema="))
        .and_then(|pos| {
            let arg = raw_args.remove(pos);
            arg.strip_prefix("--schema=").map(PathBuf::from)
        });

    let mut args = raw_args.into_iter();
    let path: PathBuf = args
        .next()
        .map(PathBuf::from)
        .context("usage: decode_ipm [--vbs] [--hex-bitmap] [--ascii] [--schema=FILE] FILE")?;

    let schema = match &schema_path {
        Some(p) => {
            let src = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            parse_schema(&src).with_context(|| format!("parsing {}", p.display()))?
        }
        None => Schema::card_network(),
    };
    let codec = Codec::new(schema, encoding, bitmap);
    let reader = open_reader(&path, codec, options).with_context(|| format!("opening {}", path.display()))?;

    let mut decoded = 0usize;
    let mut failed = 0usize;
    for item in reader {
        match item {
            Ok(message) => {
                decoded += 1;
                println!("--- message {}", decoded + failed);
                print!("{}", format_message(&message));
            }
            Err(StreamError::Codec { index, source }) => {
                failed += 1;
                eprintln!("record {}: {}", index + 1, source);
            }
            Err(e) => return Err(e).context("reading record stream"),
        }
    }
    eprintln!("{} message(s) decoded, {} failed", decoded, failed);
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
