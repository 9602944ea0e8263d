//! Micro-benchmarks for request parsing and reply serialization.
//!
//! Run with `cargo bench -p coral-protocol`.

use std::hint::black_box;

use bytes::{Bytes, BytesMut};
use coral_protocol::{parse_request, Command, Reply};
use criterion::{criterion_group, criterion_main, Criterion};

/// Builds the raw bytes for `SET <key> <value>` where value is `size` bytes.
fn build_set_bytes(key: &str, value_size: usize) -> Vec<u8> {
    let value = "x".repeat(value_size);
    format!(
        "*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n${}\r\n{}\r\n",
        key.len(),
        key,
        value.len(),
        value
    )
    .into_bytes()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parse");

    let ping = b"*1\r\n$4\r\nPING\r\n";
    group.bench_function("ping", |b| {
        b.iter(|| black_box(parse_request(ping).unwrap().unwrap()));
    });

    let set_64 = build_set_bytes("key:12345", 64);
    group.bench_function("set_64B", |b| {
        b.iter(|| black_box(parse_request(&set_64).unwrap().unwrap()));
    });

    let set_1k = build_set_bytes("key:12345", 1024);
    group.bench_function("set_1KB", |b| {
        b.iter(|| black_box(parse_request(&set_1k).unwrap().unwrap()));
    });

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply_serialize");

    let ok = Reply::ok();
    group.bench_function("simple_ok", |b| {
        let mut buf = BytesMut::with_capacity(64);
        b.iter(|| {
            buf.clear();
            ok.write(&mut buf);
            black_box(&buf);
        });
    });

    let bulk_1k = Reply::Bulk(Bytes::from(vec![b'x'; 1024]));
    group.bench_function("bulk_1KB", |b| {
        let mut buf = BytesMut::with_capacity(2048);
        b.iter(|| {
            buf.clear();
            bulk_1k.write(&mut buf);
            black_box(&buf);
        });
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_resolve");

    let get = vec![Bytes::from_static(b"GET"), Bytes::from_static(b"key:12345")];
    group.bench_function("get", |b| {
        b.iter(|| black_box(Command::resolve(&get).unwrap()));
    });

    let set = vec![
        Bytes::from_static(b"SET"),
        Bytes::from_static(b"key:12345"),
        Bytes::from(vec![b'x'; 64]),
    ];
    group.bench_function("set_64B", |b| {
        b.iter(|| black_box(Command::resolve(&set).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_serialize, bench_resolve);
criterion_main!(benches);
