use std::alloc::{Layout, alloc, dealloc};
use std::ptr::{self, NonNull};

use crate::size_class::MAX_POOLED_ALIGN;
use crate::{BlockIndex, Error, SizeClass};

/// Bookkeeping prefix of every chunk. The payload follows at a fixed offset.
///
/// `owner` is the backpointer: written once when the page is constructed and
/// never touched again, it lets a payload pointer be resolved to its owning
/// block in O(1) with no external lookup table. Payload writes cannot reach
/// either field because the payload region starts after the header.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
struct ChunkHeader {
    /// Index of the next free chunk in this page's embedded free list.
    /// Meaningful only while the chunk itself is free; a value at or beyond
    /// the page capacity terminates the list.
    next_free: usize,

    /// The block that owns the page this chunk lives in. Permanent.
    owner: BlockIndex,
}

/// Byte distance from a chunk's header to its payload.
///
/// The header and the payload share the pooled word alignment, so the payload
/// begins immediately after the header in every configuration. Keeping this a
/// single compile-time constant is what lets [`Page::owning_block`] recover
/// the owner from a payload pointer without knowing which pool it came from.
pub(crate) const PAYLOAD_OFFSET: usize = size_of::<ChunkHeader>();

/// Layout calculations for a [`Page`].
#[derive(Clone, Debug, Eq, PartialEq)]
struct PageLayoutInfo {
    /// Combined header + payload layout, padded so that consecutive entries
    /// stay properly aligned. The size is the stride between chunks.
    entry_layout: Layout,

    /// Layout of the whole chunk array backing one page.
    chunk_array_layout: Layout,
}

impl PageLayoutInfo {
    /// Calculates layout information for one page of the given size class.
    #[must_use]
    fn calculate(class: SizeClass) -> Self {
        let header_layout = Layout::new::<ChunkHeader>();

        let payload_layout = Layout::from_size_align(class.chunk_size(), MAX_POOLED_ALIGN)
            .expect("chunk sizes are small compile-time constants");

        let (entry_layout, payload_offset) = header_layout
            .extend(payload_layout)
            .expect("layout extension cannot fail for valid layouts with reasonable sizes");

        // Pad so the entry size is a stride that keeps every chunk aligned.
        let entry_layout = entry_layout.pad_to_align();

        debug_assert_eq!(
            payload_offset, PAYLOAD_OFFSET,
            "header and payload share the pooled alignment, so the payload \
             must start right after the header"
        );

        let total_size = entry_layout
            .size()
            .checked_mul(class.page_capacity().get())
            .expect("page sizes are fixed per deployment and far below virtual memory limits");

        let chunk_array_layout = Layout::from_size_align(total_size, entry_layout.align())
            .expect("array layout cannot fail for a valid padded entry layout");

        Self {
            entry_layout,
            chunk_array_layout,
        }
    }
}

/// Fixed-capacity arena of equal-size chunks with an embedded free-chunk list.
///
/// A page is created only when its pool needs capacity and no existing block
/// has room, and it is destroyed as soon as its used count returns to zero.
/// All chunk state lives inside the page's single heap allocation; the `Page`
/// value itself holds only plain bookkeeping and may be moved freely.
///
/// # Out of band access
///
/// The page never creates or keeps references into the chunk allocation, so
/// payload pointers handed out by [`allocate()`](Self::allocate) stay valid
/// while the page lives, regardless of how the `Page` value itself is moved.
#[derive(Debug)]
pub(crate) struct Page {
    /// The configuration this page was built for.
    class: SizeClass,

    /// Precomputed stride and allocation layout.
    layout_info: PageLayoutInfo,

    /// Base pointer of the chunk array.
    first_chunk_ptr: NonNull<ChunkHeader>,

    /// Head of the embedded free-chunk list. At or beyond capacity when full.
    free_head: usize,

    /// Number of chunks currently handed out, in `0..=capacity`.
    used: usize,

    /// The block that owns this page, recorded once at construction. Every
    /// chunk header carries the same value as its backpointer.
    owner: BlockIndex,
}

impl Page {
    /// Creates a page for `class`, owned by the block at `owner`.
    ///
    /// Every chunk header is initialized here: the free-list link threads the
    /// chunks in index order and the owner backpointer receives its one and
    /// only write.
    pub(crate) fn new(class: SizeClass, owner: BlockIndex) -> crate::Result<Self> {
        let layout_info = PageLayoutInfo::calculate(class);

        // SAFETY: The chunk array layout has non-zero size because chunk
        // sizes and page capacities are both non-zero by construction.
        let allocation = unsafe { alloc(layout_info.chunk_array_layout) };

        let first_chunk_ptr = NonNull::new(allocation)
            .ok_or(Error::SystemMemoryExhausted {
                bytes: layout_info.chunk_array_layout.size(),
            })?
            .cast::<ChunkHeader>();

        let capacity = class.page_capacity().get();

        for index in 0..capacity {
            // Cannot overflow: the offset stays within the allocation we just made.
            let offset = index.wrapping_mul(layout_info.entry_layout.size());

            // SAFETY: `index` is below capacity, so the offset stays inside the
            // allocation, and the padded entry layout keeps every header aligned.
            let header_ptr = unsafe { first_chunk_ptr.byte_add(offset) };

            // SAFETY: The pointer is valid, aligned and exclusively ours; the
            // allocation is still uninitialized so we must not read or drop.
            unsafe {
                ptr::write(
                    header_ptr.as_ptr(),
                    ChunkHeader {
                        // Cannot overflow: capacity is far below usize::MAX.
                        next_free: index.wrapping_add(1),
                        owner,
                    },
                );
            }
        }

        Ok(Self {
            class,
            layout_info,
            first_chunk_ptr,
            free_head: 0,
            used: 0,
            owner,
        })
    }

    /// `true` when every chunk is handed out.
    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.used == self.class.page_capacity().get()
    }

    /// `true` when no chunk is handed out.
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// The number of chunks currently handed out.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Mutating this to a constant trivially breaks callers' loops.
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    /// The block this page belongs to.
    #[must_use]
    pub(crate) fn owner(&self) -> BlockIndex {
        self.owner
    }

    fn header_ptr(&self, index: usize) -> NonNull<ChunkHeader> {
        debug_assert!(
            index < self.class.page_capacity().get(),
            "chunk index {index} out of bounds in page of capacity {}",
            self.class.page_capacity()
        );

        // Cannot overflow: the offset stays within the chunk array.
        let offset = index.wrapping_mul(self.layout_info.entry_layout.size());

        // SAFETY: Guarded by the bounds check above; the offset lands on an
        // entry boundary inside the allocation made in `new()`.
        unsafe { self.first_chunk_ptr.byte_add(offset) }
    }

    fn payload_ptr(&self, index: usize) -> NonNull<u8> {
        // SAFETY: The entry layout reserves PAYLOAD_OFFSET + chunk_size bytes
        // per chunk, so the payload pointer stays inside the entry.
        unsafe { self.header_ptr(index).byte_add(PAYLOAD_OFFSET).cast::<u8>() }
    }

    /// Pops the free-list head and hands out its payload.
    ///
    /// The caller (the owning pool) guarantees the page is not full.
    pub(crate) fn allocate(&mut self) -> NonNull<u8> {
        debug_assert!(
            !self.is_full(),
            "allocate() called on a full page; the pool must route around full pages"
        );

        let index = self.free_head;
        let header_ptr = self.header_ptr(index);

        // SAFETY: Headers were initialized in `new()` and stay initialized for
        // the lifetime of the page; we hold `&mut self` so nothing else reads
        // or writes them concurrently.
        let header = unsafe { ptr::read(header_ptr.as_ptr()) };

        self.free_head = header.next_free;

        // Cannot overflow: bounded by the page capacity.
        self.used = self.used.wrapping_add(1);

        self.payload_ptr(index)
    }

    /// Pushes a previously handed-out chunk back onto the free-list head.
    ///
    /// Only the free-list link is rewritten; the owner backpointer installed
    /// at construction is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be a payload pointer previously returned by this page's
    /// [`allocate()`](Self::allocate) that has not been deallocated since.
    pub(crate) unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        debug_assert!(self.owns(ptr), "pointer does not belong to this page");
        debug_assert!(
            self.used > 0,
            "deallocate() called on a page with no outstanding chunks"
        );

        let index = self.index_of(ptr);
        let header_ptr = self.header_ptr(index);

        // SAFETY: The header is initialized and exclusively ours via `&mut
        // self`; writing the free-list field cannot touch the backpointer.
        unsafe {
            (*header_ptr.as_ptr()).next_free = self.free_head;
        }

        self.free_head = index;

        // Cannot underflow: asserted above that a chunk is outstanding.
        self.used = self.used.wrapping_sub(1);
    }

    /// Resolves a payload pointer to the block that owns its page.
    ///
    /// This reads the backpointer planted next to the payload when the page
    /// was constructed: pure pointer arithmetic, no lookup table. O(1).
    ///
    /// # Safety
    ///
    /// `ptr` must be a payload pointer previously returned by some page's
    /// [`allocate()`](Self::allocate) that has not been deallocated since.
    #[must_use]
    pub(crate) unsafe fn owning_block(ptr: NonNull<u8>) -> BlockIndex {
        // SAFETY: Every payload sits PAYLOAD_OFFSET bytes past its header, so
        // the subtraction lands on the header of the same chunk.
        let header_ptr = unsafe { ptr.byte_sub(PAYLOAD_OFFSET).cast::<ChunkHeader>() };

        // SAFETY: The header is initialized for as long as any payload pointer
        // of its page is live, and the owner field is never written after
        // construction, so a plain read cannot race with free-list updates.
        unsafe { (*header_ptr.as_ptr()).owner }
    }

    /// `true` when `ptr` points into this page's payload region.
    #[must_use]
    pub(crate) fn owns(&self, ptr: NonNull<u8>) -> bool {
        let base = self.first_chunk_ptr.addr().get();
        let addr = ptr.addr().get();

        // Cannot overflow: the array layout size was computed without overflow.
        let end = base.wrapping_add(self.layout_info.chunk_array_layout.size());

        addr >= base.wrapping_add(PAYLOAD_OFFSET) && addr < end
    }

    #[expect(
        clippy::integer_division,
        reason = "the offset is an exact multiple of the entry stride, as debug-asserted"
    )]
    fn index_of(&self, ptr: NonNull<u8>) -> usize {
        let base = self.first_chunk_ptr.addr().get();
        let addr = ptr.addr().get();

        // Cannot underflow for pointers this page handed out.
        let offset = addr.wrapping_sub(base).wrapping_sub(PAYLOAD_OFFSET);

        debug_assert_eq!(
            offset % self.layout_info.entry_layout.size(),
            0,
            "payload pointer is not on a chunk boundary"
        );

        offset / self.layout_info.entry_layout.size()
    }

    /// Walks the embedded free list and cross-checks it against the used count
    /// and the backpointers. Test and debugging aid; O(capacity).
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        let capacity = self.class.page_capacity().get();

        let mut free_seen = 0_usize;
        let mut cursor = self.free_head;

        while cursor < capacity {
            free_seen += 1;
            assert!(
                free_seen <= capacity,
                "free list is longer than the page capacity {capacity}; it must be cyclic"
            );

            // SAFETY: `cursor` is bounds-checked by the loop condition and
            // headers remain initialized for the lifetime of the page.
            cursor = unsafe { ptr::read(self.header_ptr(cursor).as_ptr()).next_free };
        }

        assert_eq!(
            free_seen,
            capacity - self.used,
            "free list length does not match the used count"
        );

        for index in 0..capacity {
            // SAFETY: `index` is in bounds; headers remain initialized.
            let header = unsafe { ptr::read(self.header_ptr(index).as_ptr()) };

            assert_eq!(
                header.owner, self.owner,
                "chunk {index} carries a backpointer to a foreign block"
            );
        }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: The allocation was made in `new()` with this same layout and
        // has not been deallocated since. Chunk payloads are raw memory; any
        // value cleanup happened in the caller before the chunk was returned.
        unsafe {
            dealloc(
                self.first_chunk_ptr.as_ptr().cast(),
                self.layout_info.chunk_array_layout,
            );
        }
    }
}

// SAFETY: The page owns its chunk allocation outright and shares no
// thread-local state; the raw pointers are plain addresses into that
// allocation, all mutation goes through `&mut self`.
unsafe impl Send for Page {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use new_zealand::nz;

    use super::*;

    fn test_class() -> SizeClass {
        SizeClass::new(8, nz!(4))
    }

    fn test_page() -> Page {
        Page::new(test_class(), BlockIndex::new(7)).unwrap()
    }

    #[test]
    fn starts_empty_and_fills_to_capacity() {
        let mut page = test_page();

        assert!(page.is_empty());
        assert!(!page.is_full());

        let pointers: Vec<_> = (0..4).map(|_| page.allocate()).collect();

        assert!(page.is_full());
        assert_eq!(page.used(), 4);
        page.integrity_check();

        // No two live allocations alias and all stay inside the page.
        for (i, a) in pointers.iter().enumerate() {
            assert!(page.owns(*a));
            for b in pointers.iter().skip(i + 1) {
                assert_ne!(a, b, "two live allocations alias");
            }
        }

        for ptr in pointers {
            unsafe { page.deallocate(ptr) };
        }

        assert!(page.is_empty());
        page.integrity_check();
    }

    #[test]
    fn freed_chunk_is_reused_first() {
        let mut page = test_page();

        let first = page.allocate();
        let _second = page.allocate();

        unsafe { page.deallocate(first) };

        // The free list is a stack: the most recently freed chunk comes back.
        assert_eq!(page.allocate(), first);
        page.integrity_check();
    }

    #[test]
    fn chunks_are_handed_out_in_index_order_when_fresh() {
        let mut page = test_page();

        let first = page.allocate();
        let second = page.allocate();

        let stride = second.addr().get() - first.addr().get();
        assert!(stride >= 8 + PAYLOAD_OFFSET, "stride too small for payload plus header");

        let third = page.allocate();
        assert_eq!(third.addr().get() - second.addr().get(), stride);
    }

    #[test]
    fn backpointer_resolves_to_the_owner_for_every_chunk() {
        let mut page = test_page();

        for _ in 0..4 {
            let ptr = page.allocate();
            assert_eq!(unsafe { Page::owning_block(ptr) }, page.owner());
        }
    }

    #[test]
    fn payloads_are_word_aligned() {
        let mut page = test_page();

        for _ in 0..4 {
            let ptr = page.allocate();
            assert_eq!(ptr.addr().get() % MAX_POOLED_ALIGN, 0);
        }
    }

    #[test]
    fn owns_rejects_foreign_pointers() {
        let mut page = test_page();
        let mut other = test_page();

        let ours = page.allocate();
        let theirs = other.allocate();

        assert!(page.owns(ours));
        assert!(!page.owns(theirs));
    }
}
