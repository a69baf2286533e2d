//! Thread-local registry of the per-size-class pools.
//!
//! Pools are created on first use and live until their thread exits. Every
//! container built on [`PoolAllocator`][crate::PoolAllocator] borrows its
//! pool from here for the duration of a single allocate or deallocate call,
//! so a given pool is only ever touched by its own thread: no locks, no
//! first-use races.
//!
//! # Teardown ordering
//!
//! A container backed by the pools must be dropped before its thread exits.
//! The registry is torn down with the thread, releasing all remaining blocks
//! and pages in one batch.

use std::cell::RefCell;

use crate::{FixedPool, SIZE_CLASSES};

thread_local! {
    static POOLS: RefCell<Registry> = const { RefCell::new(Registry::new()) };
}

/// Holds up to one lazily created pool per configured size class.
#[derive(Debug)]
struct Registry {
    pools: [Option<FixedPool>; SIZE_CLASSES.len()],
}

impl Registry {
    const fn new() -> Self {
        Self {
            pools: [const { None }; SIZE_CLASSES.len()],
        }
    }

    fn pool_mut(&mut self, class_index: usize) -> &mut FixedPool {
        let slot = self
            .pools
            .get_mut(class_index)
            .expect("routing only produces indexes into the size class table");

        slot.get_or_insert_with(|| {
            let class = SIZE_CLASSES
                .get(class_index)
                .copied()
                .expect("routing only produces indexes into the size class table");

            FixedPool::new(class)
        })
    }
}

/// Runs `f` with exclusive access to the calling thread's pool for the given
/// size class, creating the pool first if this is its first use.
pub(crate) fn with_pool<R>(class_index: usize, f: impl FnOnce(&mut FixedPool) -> R) -> R {
    POOLS.with(|registry| f(registry.borrow_mut().pool_mut(class_index)))
}

/// The number of pages currently held across all of this thread's pools.
///
/// After every pooled container has been dropped this returns zero: pages are
/// destroyed the moment their last chunk comes back.
///
/// # Example
///
/// ```
/// assert_eq!(small_pool::pooled_page_count(), 0);
/// ```
#[must_use]
pub fn pooled_page_count() -> usize {
    page_counts_per_class().iter().sum()
}

/// Per-class page counts for this thread's pools, in [`SIZE_CLASSES`] order.
///
/// Classes whose pool has not been created yet report zero.
#[must_use]
pub fn page_counts_per_class() -> [usize; SIZE_CLASSES.len()] {
    POOLS.with(|registry| {
        let registry = registry.borrow();

        let mut counts = [0_usize; SIZE_CLASSES.len()];
        for (count, pool) in counts.iter_mut().zip(registry.pools.iter()) {
            *count = pool.as_ref().map_or(0, FixedPool::page_count);
        }

        counts
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_are_created_lazily_and_tracked_per_class() {
        // This thread has its own registry, so the counts start clean.
        assert_eq!(pooled_page_count(), 0);

        let ptr = with_pool(2, |pool| pool.allocate(64)).unwrap();

        assert_eq!(page_counts_per_class(), [0, 0, 1, 0]);

        // SAFETY: The pointer came from this pool and is returned once.
        with_pool(2, |pool| unsafe { pool.deallocate(ptr) });

        assert_eq!(pooled_page_count(), 0);
    }
}
