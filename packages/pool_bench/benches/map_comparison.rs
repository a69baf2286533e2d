//! Criterion comparison of pooled and general-purpose map population.
#![feature(allocator_api)]
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::alloc::Global;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pool_bench::populate_and_measure;
use small_pool::PoolAllocator;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_comparison");

    for entries in [1_000_u64, 10_000, 100_000] {
        group.bench_function(BenchmarkId::new("pooled", entries), |b| {
            b.iter(|| black_box(populate_and_measure(PoolAllocator::new(), black_box(entries))));
        });

        group.bench_function(BenchmarkId::new("standard", entries), |b| {
            b.iter(|| black_box(populate_and_measure(Global, black_box(entries))));
        });
    }

    group.finish();
}
