//! Hot path benchmarks for profiling-driven optimization.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Every input line goes through decode and append; every `buffer_size`
//! records a batch is joined and written, followed by one STATE line.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use singer_s3_target::streaming::{
    decode_line, InMemoryObjectStore, SimulatedClock, StateMessage, StreamBufferManager,
};

fn record_line(fields: usize) -> String {
    let record: String = (0..fields)
        .map(|i| format!("\"field_{}\":\"value_{}\"", i, i))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{{\"type\":\"RECORD\",\"stream\":\"users\",\"record\":{{{}}}}}",
        record
    )
}

/// Benchmark decode_line - runs once per input line
fn bench_decode_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_line");
    group.throughput(Throughput::Elements(1));

    for fields in [1, 10, 100] {
        let line = record_line(fields);
        group.bench_function(format!("fields_{}", fields), |b| {
            b.iter(|| decode_line(black_box(&line)))
        });
    }

    group.finish();
}

/// Benchmark StreamBufferManager::append across a handful of streams
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(1));

    let streams: Vec<String> = (0..8).map(|i| format!("stream_{}", i)).collect();
    let payload = "{\"id\":1,\"name\":\"x\"}".to_string();

    group.bench_function("round_robin_8_streams", |b| {
        let mut manager = StreamBufferManager::new(
            InMemoryObjectStore::with_bucket("bench"),
            SimulatedClock::new(0),
            "bench",
            std::io::sink(),
        );
        let mut i = 0usize;
        b.iter(|| {
            i = i.wrapping_add(1);
            manager.append(black_box(&streams[i % streams.len()]), payload.clone())
        })
    });

    group.finish();
}

/// Benchmark one full flush: join, put, STATE line
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let payload = record_line(10);

    for batch in [10, 1000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(format!("batch_{}", batch), |b| {
            b.iter_batched(
                || {
                    let mut manager = StreamBufferManager::new(
                        InMemoryObjectStore::with_bucket("bench"),
                        SimulatedClock::ticking(0, 1),
                        "bench",
                        std::io::sink(),
                    );
                    for _ in 0..batch {
                        manager.append("users", payload.clone());
                    }
                    manager
                },
                |mut manager| runtime.block_on(manager.check_and_flush(batch)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark STATE line serialization
fn bench_state_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_line");
    group.throughput(Throughput::Elements(1));

    group.bench_function("to_line", |b| {
        b.iter(|| StateMessage::new(black_box("users"), black_box(123_456)).to_line())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_line,
    bench_append,
    bench_flush,
    bench_state_line,
);
criterion_main!(benches);
