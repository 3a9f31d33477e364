//! Throughput Benchmark for TallyKV
//!
//! Measures the storage engine and the request decoder under a few
//! representative workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use tallykv::commands::CommandHandler;
use tallykv::protocol::parse_request;
use tallykv::storage::StorageEngine;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, Bytes::from("small_value")).unwrap();
            i += 1;
        });
    });

    group.bench_function("set_1kb", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024));
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, value.clone()).unwrap();
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i % 10_000));
            engine
                .set_with_ttl(key, Bytes::from("value"), Duration::from_secs(3600))
                .unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set(key, value).unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(key.as_bytes()).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark list and set operations
fn bench_collections(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("collections");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rpush_lpop", |b| {
        b.iter(|| {
            engine
                .rpush(Bytes::from("queue"), vec![Bytes::from("job")])
                .unwrap();
            black_box(engine.lpop(b"queue").unwrap());
        });
    });

    group.bench_function("sadd", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let member = Bytes::from(format!("member:{}", i % 1000));
            black_box(engine.sadd(Bytes::from("tags"), vec![member]).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark decode + dispatch of a pipelined request stream
fn bench_dispatch(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
    let mut input = Vec::new();
    for i in 0..100 {
        let key = format!("key:{}", i);
        input.extend_from_slice(
            format!("*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n$5\r\nvalue\r\n", key.len(), key).as_bytes(),
        );
    }

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(100));

    group.bench_function("pipelined_set", |b| {
        b.iter(|| {
            let mut offset = 0;
            while let Ok(Some((args, consumed))) = parse_request(&input[offset..]) {
                black_box(handler.execute(args));
                offset += consumed;
            }
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            engine.set(key.clone(), Bytes::from("value")).unwrap();
                            let _ = engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_collections,
    bench_dispatch,
    bench_concurrent,
);

criterion_main!(benches);
