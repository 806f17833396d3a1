//! Benchmarks for the overlap-safe bulk move.
//!
//! Measures span copies across the unrolled tiers and past the platform threshold:
//! - Disjoint forward copies
//! - Overlapping moves in both directions
//! - Element-typed moves through `Memory` handles

extern crate dotcorelib;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dotcorelib::memory::{move_within, ManagedArray, Memory, ReadOnlySpan, Span};
use std::hint::black_box;

const SIZES: [usize; 7] = [7, 16, 64, 200, 1024, 4096, 65536];

/// Benchmark copying between two distinct buffers.
fn bench_disjoint_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("memmove_disjoint");
    for size in SIZES {
        let source = vec![0xa5u8; size];
        let mut target = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut destination = Span::new(&mut target);
                ReadOnlySpan::new(black_box(&source))
                    .copy_to(&mut destination)
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark moving a range one byte up within the same buffer (backward copy).
fn bench_overlapping_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("memmove_overlap_backward");
    for size in SIZES {
        let mut buffer = vec![0x5au8; size + 1];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| move_within(black_box(&mut buffer), 0, 1, size).unwrap());
        });
    }
    group.finish();
}

/// Benchmark moving a range one byte down within the same buffer (forward copy).
fn bench_overlapping_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("memmove_overlap_forward");
    for size in SIZES {
        let mut buffer = vec![0x5au8; size + 1];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| move_within(black_box(&mut buffer), 1, 0, size).unwrap());
        });
    }
    group.finish();
}

/// Benchmark an overlapping copy of `u64` elements through memory handles.
fn bench_memory_handles(c: &mut Criterion) {
    let array = ManagedArray::from_vec(vec![0u64; 4096]);
    let memory = Memory::from(array);
    let source = memory.slice(0, 4000).unwrap();
    let destination = memory.slice(96, 4000).unwrap();

    c.bench_function("memory_copy_u64_overlap", |b| {
        b.iter(|| black_box(&source).copy_to(black_box(&destination)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_disjoint_copy,
    bench_overlapping_backward,
    bench_overlapping_forward,
    bench_memory_handles
);
criterion_main!(benches);
