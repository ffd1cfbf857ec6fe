//! Benchmark: pack/unpack of a typical clearing message, and a full blocked file write+read
//! of 1000 messages through the record and block layers.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ipmcodec::{Codec, Message, MessageReader, MessageWriter, StreamOptions, Value};

fn clearing_message(seq: i64) -> Message {
    [
        ("MTI", Value::from("1240")),
        ("DE2", Value::from("5100000000000001")),
        ("DE3", Value::from("000000")),
        ("DE4", Value::Int(1500 + seq)),
        ("DE24", Value::from("200")),
        ("DE26", Value::Int(5812)),
        ("DE31", Value::from("05413394041000000000011")),
        ("DE43", Value::from("Corner Cafe  \\12 George Street\\Sydney\\2000      NSWAUS")),
        ("DE49", Value::from("978")),
        ("DE55", Value::Bytes(vec![0x9F, 0x02, 0x06, 0, 0, 0, 0, 0x15, 0, 0x82, 0x02, 0x19, 0x80])),
        ("DE71", Value::Int(seq)),
        ("PDS0023", Value::from("CT6")),
        ("PDS0148", Value::from("9782")),
        ("PDS0158", Value::from("MCC111111111111111111111111")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn bench_codec(c: &mut Criterion) {
    let codec = Codec::default();
    let message = clearing_message(1);
    let packed = codec.pack(&message).expect("pack");

    c.bench_function("pack_clearing_message", |b| {
        b.iter(|| black_box(codec.pack(black_box(&message)).expect("pack")))
    });

    c.bench_function("unpack_clearing_message", |b| {
        b.iter(|| black_box(codec.unpack(black_box(&packed)).expect("unpack")))
    });
}

fn bench_stream(c: &mut Criterion) {
    let messages: Vec<Message> = (0..1000).map(clearing_message).collect();

    let mut writer = MessageWriter::new(Vec::new(), Codec::default(), StreamOptions::blocked());
    for m in &messages {
        writer.write_message(m).expect("write");
    }
    let file = writer.finish().expect("finish");
    eprintln!("stream_roundtrip: {} messages, {} bytes blocked", messages.len(), file.len());

    c.bench_function("write_blocked_1000", |b| {
        b.iter(|| {
            let mut writer = MessageWriter::new(
                Vec::with_capacity(file.len()),
                Codec::default(),
                StreamOptions::blocked(),
            );
            for m in &messages {
                writer.write_message(black_box(m)).expect("write");
            }
            black_box(writer.finish().expect("finish"))
        });
    });

    c.bench_function("read_blocked_1000", |b| {
        b.iter(|| {
            let reader = MessageReader::new(black_box(&file[..]), Codec::default(), StreamOptions::blocked());
            let count = reader.filter(|m| m.is_ok()).count();
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_codec, bench_stream);
criterion_main!(benches);
