//! Benchmarks for the random engines.
//!
//! Compares the seeded lagged-Fibonacci generator against xoshiro256** for raw draws,
//! bounded draws and byte fills, plus the per-thread shared generator.

extern crate dotcorelib;

use criterion::{criterion_group, criterion_main, Criterion};
use dotcorelib::{
    random::{Random, SplitMixEntropy},
    runtime::RuntimeContext,
};
use std::hint::black_box;

fn generators() -> [(&'static str, Random); 2] {
    [
        ("legacy", Random::with_seed(42)),
        ("xoshiro", Random::new(&SplitMixEntropy::new(42)).unwrap()),
    ]
}

/// Benchmark unbounded 31-bit draws.
fn bench_next(c: &mut Criterion) {
    for (name, mut random) in generators() {
        c.bench_function(&format!("random_next_{}", name), |b| {
            b.iter(|| black_box(random.next()));
        });
    }
}

/// Benchmark bounded draws with a non power-of-two range.
fn bench_next_in_range(c: &mut Criterion) {
    for (name, mut random) in generators() {
        c.bench_function(&format!("random_range_{}", name), |b| {
            b.iter(|| black_box(random.next_in_range(black_box(-1_000), black_box(1_001)).unwrap()));
        });
    }
}

/// Benchmark filling a 4 KB buffer.
fn bench_next_bytes(c: &mut Criterion) {
    let mut buffer = vec![0u8; 4096];
    for (name, mut random) in generators() {
        c.bench_function(&format!("random_bytes_4k_{}", name), |b| {
            b.iter(|| random.next_bytes(black_box(&mut buffer)));
        });
    }
}

/// Benchmark draws through the context's shared generator.
fn bench_shared(c: &mut Criterion) {
    let ctx = RuntimeContext::new().unwrap();
    let shared = ctx.shared_random();
    c.bench_function("random_shared_next_below", |b| {
        b.iter(|| black_box(shared.next_below(black_box(100)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_next,
    bench_next_in_range,
    bench_next_bytes,
    bench_shared
);
criterion_main!(benches);
