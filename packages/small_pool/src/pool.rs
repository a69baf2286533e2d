use std::ptr::NonNull;

use crate::{Block, BlockIndex, Error, Page, Result, SizeClass};

/// Fixed-size allocation engine for one size class.
///
/// The pool owns every block and page it creates. Blocks live in a slot arena
/// and are linked to each other by index: all blocks (plus a pageless
/// sentinel) form the membership ring, and the blocks whose pages still have
/// spare capacity additionally form the free list. One `current_free` pointer
/// names the block the next allocation is served from.
///
/// Allocation and deallocation are O(1). A page is created only when no block
/// has spare capacity and destroyed the moment its last chunk is returned;
/// the pool never retains drained pages.
///
/// # Free-block selection policy
///
/// The current free block is always the block that most recently transitioned
/// from full to non-full. This most-recently-freed reuse favors locality over
/// fragmentation minimization and is an observable allocation-order property
/// of the pool, not a tuning detail.
///
/// # Example
///
/// ```
/// use small_pool::{FixedPool, SIZE_CLASSES};
///
/// let mut pool = FixedPool::new(SIZE_CLASSES[0]);
///
/// let ptr = pool.allocate(4).unwrap();
/// assert_eq!(pool.page_count(), 1);
///
/// // SAFETY: The pointer came from this pool and is returned exactly once.
/// unsafe { pool.deallocate(ptr) };
///
/// // The last chunk came back, so the page is gone too.
/// assert_eq!(pool.page_count(), 0);
/// ```
#[derive(Debug)]
pub struct FixedPool {
    /// The configuration every page of this pool is built for.
    class: SizeClass,

    /// Slot arena holding the sentinel (slot 0, always occupied) and every
    /// ordinary block. Vacated slots are recycled through `vacant_slots`.
    slots: Vec<Option<Block>>,

    /// Arena slots ready for reuse, most recently vacated last.
    vacant_slots: Vec<BlockIndex>,

    /// The block allocations are currently served from, if any block has
    /// spare capacity at all.
    current_free: Option<BlockIndex>,

    /// Number of live pages, which equals the number of ordinary blocks.
    page_count: usize,

    /// Number of chunks currently handed out across all pages.
    length: usize,
}

impl FixedPool {
    /// Creates an empty pool for the given size class.
    ///
    /// No memory is reserved until the first allocation.
    #[must_use]
    pub fn new(class: SizeClass) -> Self {
        Self {
            class,
            slots: vec![Some(Block::sentinel())],
            vacant_slots: Vec::new(),
            current_free: None,
            page_count: 0,
            length: 0,
        }
    }

    /// The size class this pool serves.
    #[must_use]
    pub fn class(&self) -> SizeClass {
        self.class
    }

    /// The number of pages the pool currently holds.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated into values that only affect reporting.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The number of chunks currently handed out.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated into values that only affect reporting.
    pub fn len(&self) -> usize {
        self.length
    }

    /// `true` when no chunk is handed out and no page is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Hands out one chunk able to hold `byte_count` bytes.
    ///
    /// If no block currently has spare capacity, a fresh block and page are
    /// created and linked into the ring first.
    ///
    /// # Errors
    ///
    /// [`Error::SizeOutOfRange`] when `byte_count` is zero or exceeds the
    /// class chunk size; [`Error::SystemMemoryExhausted`] when the system
    /// allocator cannot back a new page. The pool performs no local recovery,
    /// every failure surfaces to the caller.
    pub fn allocate(&mut self, byte_count: usize) -> Result<NonNull<u8>> {
        if byte_count == 0 || byte_count > self.class.chunk_size() {
            return Err(Error::SizeOutOfRange {
                requested: byte_count,
                chunk_size: self.class.chunk_size(),
            });
        }

        if self.current_free.is_none() {
            let index = self.create_block()?;
            self.current_free = Some(index);
        }

        let index = self
            .current_free
            .expect("a free block exists; we just created one if needed");

        let ptr = self.page_mut(index).allocate();

        // Cannot overflow: bounded by total chunk capacity across pages.
        self.length = self.length.wrapping_add(1);

        if self.page(index).is_full() {
            // The block no longer has capacity to offer; the current free
            // block becomes its most recently linked neighbor, if any.
            self.current_free = self.unlink_free(index);
        }

        Ok(ptr)
    }

    /// Returns a chunk to the pool.
    ///
    /// The owning block is recovered from the chunk's backpointer. A block
    /// whose page was full becomes the current free block again; a block
    /// whose page drains completely is destroyed together with its page.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this pool's
    /// [`allocate()`](Self::allocate) and not deallocated since.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        // SAFETY: The caller guarantees the pointer is a live allocation of
        // this pool, so its backpointer names an occupied arena slot.
        let index = unsafe { Page::owning_block(ptr) };

        debug_assert_eq!(
            self.page(index).owner(),
            index,
            "chunk backpointer and page owner disagree"
        );
        debug_assert!(
            self.page(index).owns(ptr),
            "pointer does not belong to the page its backpointer names"
        );

        if self.page(index).is_full() {
            // Full to non-full: the block rejoins the free list and becomes
            // the current free block (most-recently-freed reuse).
            self.link_free_at_current(index);
        }

        // SAFETY: Forwarding the caller's guarantee; the backpointer routed
        // us to the page that served this pointer.
        unsafe { self.page_mut(index).deallocate(ptr) };

        // Cannot underflow: the pointer was live, so length was at least 1.
        self.length = self.length.wrapping_sub(1);

        if self.page(index).is_empty() {
            self.current_free = self.unlink_free(index);
            self.remove_from_ring(index);
            self.destroy_block(index);
        }
    }

    fn block(&self, index: BlockIndex) -> &Block {
        self.slots
            .get(index.get())
            .and_then(Option::as_ref)
            .expect("block index names a vacant arena slot")
    }

    fn block_mut(&mut self, index: BlockIndex) -> &mut Block {
        self.slots
            .get_mut(index.get())
            .and_then(Option::as_mut)
            .expect("block index names a vacant arena slot")
    }

    fn page(&self, index: BlockIndex) -> &Page {
        self.block(index)
            .page
            .as_ref()
            .expect("the sentinel never serves allocations")
    }

    fn page_mut(&mut self, index: BlockIndex) -> &mut Page {
        self.block_mut(index)
            .page
            .as_mut()
            .expect("the sentinel never serves allocations")
    }

    /// Creates a block + page pair and splices it into the ring, before the
    /// sentinel. The new block is not yet on the free list.
    fn create_block(&mut self) -> Result<BlockIndex> {
        let index = match self.vacant_slots.last() {
            Some(recycled) => *recycled,
            None => BlockIndex::new(self.slots.len()),
        };

        // Create the page before touching the arena so an allocation failure
        // leaves the pool unchanged.
        let page = Page::new(self.class, index)?;
        let block = Block::new(page, index);

        match self.vacant_slots.pop() {
            Some(recycled) => {
                debug_assert_eq!(recycled, index);

                let slot = self
                    .slots
                    .get_mut(recycled.get())
                    .expect("vacant slot indices always stay in bounds");

                debug_assert!(slot.is_none(), "recycled slot is still occupied");
                *slot = Some(block);
            }
            None => self.slots.push(Some(block)),
        }

        self.append_to_ring(index);

        // Cannot overflow: one page per live block, far below usize::MAX.
        self.page_count = self.page_count.wrapping_add(1);

        Ok(index)
    }

    /// Unlinks a drained block from the arena, dropping it and its page.
    fn destroy_block(&mut self, index: BlockIndex) {
        let block = self
            .slots
            .get_mut(index.get())
            .expect("block index names a slot that exists")
            .take()
            .expect("block index names a vacant arena slot");

        drop(block);
        self.vacant_slots.push(index);

        // Cannot underflow: a block existed, so the count was at least 1.
        self.page_count = self.page_count.wrapping_sub(1);
    }

    fn append_to_ring(&mut self, index: BlockIndex) {
        let tail = self.block(BlockIndex::SENTINEL).ring_prev;

        {
            let block = self.block_mut(index);
            block.ring_prev = tail;
            block.ring_next = BlockIndex::SENTINEL;
        }

        self.block_mut(tail).ring_next = index;
        self.block_mut(BlockIndex::SENTINEL).ring_prev = index;
    }

    fn remove_from_ring(&mut self, index: BlockIndex) {
        let (prev, next) = {
            let block = self.block(index);
            (block.ring_prev, block.ring_next)
        };

        self.block_mut(prev).ring_next = next;
        self.block_mut(next).ring_prev = prev;
    }

    /// Splices `index` into the free list adjacent to the current free block
    /// and makes it the new current free block.
    fn link_free_at_current(&mut self, index: BlockIndex) {
        match self.current_free {
            Some(current) => {
                let before_current = self.block(current).free_prev;

                {
                    let block = self.block_mut(index);
                    block.free_prev = before_current;
                    block.free_next = Some(current);
                }

                if let Some(before) = before_current {
                    self.block_mut(before).free_next = Some(index);
                }

                self.block_mut(current).free_prev = Some(index);
            }
            None => {
                let block = self.block_mut(index);
                block.free_prev = None;
                block.free_next = None;
            }
        }

        self.current_free = Some(index);
    }

    /// Unlinks `index` from the free list and returns the neighbor that takes
    /// over as the current free block: the previous neighbor when there is
    /// one, otherwise the next, otherwise nothing.
    fn unlink_free(&mut self, index: BlockIndex) -> Option<BlockIndex> {
        let (prev, next) = {
            let block = self.block(index);
            (block.free_prev, block.free_next)
        };

        if let Some(prev) = prev {
            self.block_mut(prev).free_next = next;
        }

        if let Some(next) = next {
            self.block_mut(next).free_prev = prev;
        }

        {
            let block = self.block_mut(index);
            block.free_prev = None;
            block.free_next = None;
        }

        prev.or(next)
    }

    /// Cross-checks the ring, the free list, and the per-page counters.
    ///
    /// Test aid; cost is proportional to the number of blocks.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        // Collect the ring membership by walking from the sentinel.
        let mut ring_members = Vec::new();
        let mut cursor = self.block(BlockIndex::SENTINEL).ring_next;

        while cursor != BlockIndex::SENTINEL {
            assert!(
                ring_members.len() <= self.slots.len(),
                "ring walk does not terminate"
            );

            ring_members.push(cursor);
            cursor = self.block(cursor).ring_next;
        }

        assert_eq!(
            ring_members.len(),
            self.page_count,
            "ring membership does not match the page count"
        );

        // Collect the free list by walking outward from the current block.
        let mut free_members = Vec::new();

        if let Some(current) = self.current_free {
            let mut cursor = Some(current);
            while let Some(index) = cursor {
                free_members.push(index);
                cursor = self.block(index).free_prev;
            }

            let mut cursor = self.block(current).free_next;
            while let Some(index) = cursor {
                free_members.push(index);
                cursor = self.block(index).free_next;
            }
        }

        let mut observed_length = 0_usize;

        for index in &ring_members {
            let page = self.page(*index);

            assert!(
                !page.is_empty(),
                "a drained page survived past its last deallocation"
            );

            observed_length += page.used();

            let in_free_list = free_members.contains(index);
            assert_eq!(
                in_free_list,
                !page.is_full(),
                "free-list membership must mirror page fullness exactly"
            );
        }

        for index in &free_members {
            assert!(
                ring_members.contains(index),
                "free list references a block outside the ring"
            );
        }

        assert_eq!(
            observed_length, self.length,
            "tracked length does not match the per-page used counts"
        );
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use new_zealand::nz;

    use crate::SIZE_CLASSES;

    use super::*;

    /// Two-chunk pages keep lifecycle transitions easy to provoke.
    fn tiny_class() -> SizeClass {
        SizeClass::new(8, nz!(2))
    }

    #[test]
    fn rejects_zero_and_oversized_requests() {
        let mut pool = FixedPool::new(tiny_class());

        assert!(matches!(
            pool.allocate(0),
            Err(Error::SizeOutOfRange { requested: 0, .. })
        ));
        assert!(matches!(
            pool.allocate(9),
            Err(Error::SizeOutOfRange { requested: 9, .. })
        ));
        assert_eq!(pool.page_count(), 0, "failed requests must not create pages");
    }

    #[test]
    fn first_allocation_creates_a_page_and_last_deallocation_destroys_it() {
        let mut pool = FixedPool::new(tiny_class());

        let ptr = pool.allocate(8).unwrap();
        assert_eq!(pool.page_count(), 1);
        assert_eq!(pool.len(), 1);
        pool.integrity_check();

        unsafe { pool.deallocate(ptr) };
        assert_eq!(pool.page_count(), 0, "drained pages are never retained");
        assert!(pool.is_empty());
        pool.integrity_check();
    }

    #[test]
    fn filling_a_page_spills_into_a_new_one() {
        let mut pool = FixedPool::new(tiny_class());

        let a = pool.allocate(1).unwrap();
        let b = pool.allocate(1).unwrap();
        assert_eq!(pool.page_count(), 1);

        let c = pool.allocate(1).unwrap();
        assert_eq!(pool.page_count(), 2, "a full page must trigger a new one");
        pool.integrity_check();

        for ptr in [a, b, c] {
            unsafe { pool.deallocate(ptr) };
        }
        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn no_two_live_allocations_alias() {
        let mut pool = FixedPool::new(tiny_class());

        let pointers: Vec<_> = (0..6).map(|_| pool.allocate(8).unwrap()).collect();
        assert_eq!(pool.page_count(), 3);

        for (i, a) in pointers.iter().enumerate() {
            for b in pointers.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }

        for ptr in pointers {
            unsafe { pool.deallocate(ptr) };
        }
        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn most_recently_freed_block_serves_the_next_allocation() {
        let mut pool = FixedPool::new(tiny_class());

        // Fill two pages completely.
        let a1 = pool.allocate(8).unwrap();
        let a2 = pool.allocate(8).unwrap();
        let b1 = pool.allocate(8).unwrap();
        let b2 = pool.allocate(8).unwrap();
        assert_eq!(pool.page_count(), 2);

        // Free one chunk in the first page, then one in the second. Both
        // blocks rejoin the free list; the second page did so more recently.
        unsafe { pool.deallocate(a1) };
        unsafe { pool.deallocate(b1) };
        pool.integrity_check();

        // Most-recently-freed reuse: the next allocation must come from the
        // second page, and the page free list is a stack, so it is exactly
        // the chunk we just returned.
        let next = pool.allocate(8).unwrap();
        assert_eq!(next, b1);

        // And the one after that drains back to the first page.
        let after = pool.allocate(8).unwrap();
        assert_eq!(after, a1);

        for ptr in [a2, b2, next, after] {
            unsafe { pool.deallocate(ptr) };
        }
        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn invariants_hold_across_interleaved_operations() {
        let mut pool = FixedPool::new(tiny_class());
        let mut live = Vec::new();

        // A deterministic interleaving that repeatedly crosses the
        // full/non-full and non-empty/empty boundaries.
        for round in 0_usize..64 {
            if round % 3 == 0 && !live.is_empty() {
                let ptr = live.swap_remove(round % live.len());
                unsafe { pool.deallocate(ptr) };
            } else {
                live.push(pool.allocate(8).unwrap());
            }

            pool.integrity_check();
            assert_eq!(pool.len(), live.len());
        }

        for ptr in live.drain(..) {
            unsafe { pool.deallocate(ptr) };
            pool.integrity_check();
        }

        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn page_capacity_boundary_matches_the_configured_class() {
        let class = SIZE_CLASSES[0];
        let mut pool = FixedPool::new(class);

        let mut pointers = Vec::with_capacity(class.page_capacity().get() + 1);

        for _ in 0..class.page_capacity().get() {
            pointers.push(pool.allocate(4).unwrap());
        }
        assert_eq!(
            pool.page_count(),
            1,
            "exactly one page serves its full configured capacity"
        );

        pointers.push(pool.allocate(4).unwrap());
        assert_eq!(
            pool.page_count(),
            2,
            "one allocation past capacity requires a second page"
        );

        for ptr in pointers {
            unsafe { pool.deallocate(ptr) };
        }
        assert_eq!(pool.page_count(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn dropping_the_pool_releases_outstanding_pages_in_one_batch() {
        let mut pool = FixedPool::new(tiny_class());

        // Deliberately leak live chunks into the drop path.
        for _ in 0..5 {
            drop(pool.allocate(8).unwrap());
        }
        assert_eq!(pool.page_count(), 3);

        drop(pool);
    }
}
