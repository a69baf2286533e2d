//! Example demonstrating basic `small_pool` usage, as shown in the readme.
#![feature(allocator_api, btreemap_alloc)]

use std::collections::BTreeMap;

use small_pool::PoolAllocator;

fn main() {
    let mut map = BTreeMap::new_in(PoolAllocator::new());

    for id in 0_u64..100_000 {
        map.insert(id, id.to_string());
    }

    println!(
        "{} entries held in {} pooled pages",
        map.len(),
        small_pool::pooled_page_count()
    );

    drop(map);

    println!(
        "after drop the pools hold {} pages",
        small_pool::pooled_page_count()
    );
}
