//! Benchmarking and comparison harness for the `small_pool` allocator.
//!
//! The harness is a thin external caller of the allocator's public surface:
//! it times an ordered-map workload once through [`PoolAllocator`] and once
//! through the general-purpose allocator, verifies both runs agree, and
//! verifies the pools hand every page back. The `pool_bench` binary repeats
//! that comparison and reports pass/fail per round.
//!
//! [`PoolAllocator`]: small_pool::PoolAllocator

#![feature(allocator_api, btreemap_alloc)]

mod measure;
mod trial;
mod workload;

pub use measure::*;
pub use trial::*;
pub use workload::*;
