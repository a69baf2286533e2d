//! End-to-end tests driving the pools through an allocator-aware ordered map.
#![feature(allocator_api, btreemap_alloc)]
#![allow(
    missing_docs,
    reason = "No need for API documentation in test code"
)]

use std::collections::BTreeMap;

use small_pool::{PoolAllocator, pooled_page_count};

/// Populating a large ordered map through the pool adaptor, dropping it and
/// checking that every page came back, with contents cross-checked against a
/// map backed by the general-purpose allocator.
#[test]
fn million_entry_map_reclaims_every_page() {
    const ENTRIES: u64 = 1_000_000;

    let mut pooled = BTreeMap::new_in(PoolAllocator::new());
    for id in 0..ENTRIES {
        pooled.insert(id, id.to_string());
    }

    assert_eq!(pooled.len() as u64, ENTRIES);
    assert!(
        pooled_page_count() > 0,
        "map nodes are small objects and must be served from the pools"
    );

    let mut standard = BTreeMap::new();
    for id in 0..ENTRIES {
        standard.insert(id, id.to_string());
    }

    assert!(
        pooled.iter().eq(standard.iter()),
        "pooled and general-purpose maps must agree on every entry"
    );

    drop(pooled);

    assert_eq!(
        pooled_page_count(),
        0,
        "all pooled memory must be reclaimed once the map is gone"
    );
}

#[test]
fn repeated_build_and_drop_cycles_leave_no_pages_behind() {
    for cycle in 0_u32..4 {
        let mut map = BTreeMap::new_in(PoolAllocator::new());

        for id in 0..10_000_u32 {
            map.insert(id, id.wrapping_mul(cycle));
        }

        let checksum: u64 = map.values().map(|value| u64::from(*value)).sum();
        let expected: u64 = (0..10_000_u32)
            .map(|id| u64::from(id.wrapping_mul(cycle)))
            .sum();
        assert_eq!(checksum, expected);

        drop(map);
        assert_eq!(pooled_page_count(), 0, "cycle {cycle} leaked pages");
    }
}

#[test]
fn removal_heavy_workload_drains_pages_eagerly() {
    let mut map = BTreeMap::new_in(PoolAllocator::new());

    for id in 0..50_000_u64 {
        map.insert(id, id);
    }

    let peak_pages = pooled_page_count();
    assert!(peak_pages > 0);

    for id in 0..50_000_u64 {
        map.remove(&id);
    }

    // The empty map may retain at most a root node's worth of memory.
    assert!(
        pooled_page_count() <= 1,
        "draining the map must drain its pages"
    );

    drop(map);
    assert_eq!(pooled_page_count(), 0);
}
