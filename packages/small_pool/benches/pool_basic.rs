//! Basic benchmarks for the `small_pool` crate.
#![feature(allocator_api)]
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use small_pool::{FixedPool, PoolAllocator, SIZE_CLASSES};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_basic");

    group.bench_function("allocate_deallocate_one", |b| {
        let mut pool = FixedPool::new(SIZE_CLASSES[1]);

        b.iter(|| {
            let ptr = pool.allocate(black_box(16)).unwrap();

            // SAFETY: The pointer came from this pool and is returned once.
            unsafe { pool.deallocate(black_box(ptr)) };
        });
    });

    group.bench_function("fill_and_drain_page", |b| {
        let mut pool = FixedPool::new(SIZE_CLASSES[3]);
        let capacity = SIZE_CLASSES[3].page_capacity().get();
        let mut pointers = Vec::with_capacity(capacity);

        b.iter(|| {
            for _ in 0..capacity {
                pointers.push(pool.allocate(black_box(512)).unwrap());
            }

            for ptr in pointers.drain(..) {
                // SAFETY: Every pointer came from this pool and is returned once.
                unsafe { pool.deallocate(ptr) };
            }
        });
    });

    group.bench_function("boxed_u64_round_trip", |b| {
        b.iter(|| {
            drop(black_box(Box::new_in(black_box(42_u64), PoolAllocator::new())));
        });
    });

    group.finish();
}
