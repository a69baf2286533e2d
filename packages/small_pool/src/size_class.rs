use std::alloc::Layout;
use std::num::NonZero;

use new_zealand::nz;

/// One pool configuration: the chunk size requests are rounded up to, and the
/// number of chunks a single page of that pool holds.
///
/// The configured classes are compile-time constants; see [`SIZE_CLASSES`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SizeClass {
    chunk_size: usize,
    page_capacity: NonZero<usize>,
}

impl SizeClass {
    /// Creates a size class configuration.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub const fn new(chunk_size: usize, page_capacity: NonZero<usize>) -> Self {
        assert!(chunk_size > 0, "a size class must have a non-zero chunk size");

        Self {
            chunk_size,
            page_capacity,
        }
    }

    /// The number of payload bytes every chunk of this class provides.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The number of chunks a single page of this class holds.
    #[must_use]
    pub fn page_capacity(&self) -> NonZero<usize> {
        self.page_capacity
    }
}

/// The fixed table of size classes, ordered by ascending chunk size.
///
/// A request is served by the first class whose chunk size can hold it; larger
/// requests degrade to the general-purpose allocator. Chunk sizes and page
/// capacities are paired one-to-one and chosen once per deployment.
pub const SIZE_CLASSES: [SizeClass; 4] = [
    SizeClass::new(4, nz!(262_144)),
    SizeClass::new(16, nz!(65_536)),
    SizeClass::new(64, nz!(16_384)),
    SizeClass::new(512, nz!(4_096)),
];

/// Pooled chunks are word-aligned. Requests with stricter alignment cannot be
/// served from a pool and fall back to the general-purpose allocator.
pub(crate) const MAX_POOLED_ALIGN: usize = align_of::<usize>();

/// Selects the size class for a memory layout.
///
/// Returns the index into [`SIZE_CLASSES`] of the first class whose chunk size
/// is at least `layout.size()`, or `None` when the request must go to the
/// general-purpose allocator (zero-sized, too large, or over-aligned).
///
/// This is a pure function of the layout: the identical layout presented at
/// deallocation time selects the identical route, which is what makes routing
/// correct without any per-allocation metadata.
#[must_use]
pub(crate) fn class_index_for(layout: Layout) -> Option<usize> {
    if layout.size() == 0 || layout.align() > MAX_POOLED_ALIGN {
        return None;
    }

    SIZE_CLASSES
        .iter()
        .position(|class| class.chunk_size >= layout.size())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_for_bytes(bytes: usize) -> Option<usize> {
        class_index_for(Layout::from_size_align(bytes, 1).unwrap())
    }

    #[test]
    fn routing_is_deterministic_over_the_documented_sizes() {
        // Chunk sizes the listed byte counts must land in, with `None`
        // meaning the general-purpose fallback.
        let expectations = [
            (1, Some(4)),
            (4, Some(4)),
            (5, Some(16)),
            (16, Some(16)),
            (17, Some(64)),
            (64, Some(64)),
            (65, Some(512)),
            (512, Some(512)),
            (513, None),
        ];

        for (bytes, expected_chunk_size) in expectations {
            let routed = class_for_bytes(bytes).map(|index| SIZE_CLASSES[index].chunk_size());

            assert_eq!(
                routed, expected_chunk_size,
                "{bytes} byte request routed to the wrong class"
            );
        }
    }

    #[test]
    fn zero_sized_layouts_are_not_pooled() {
        assert_eq!(class_for_bytes(0), None);
    }

    #[test]
    fn over_aligned_layouts_are_not_pooled() {
        let layout = Layout::from_size_align(16, MAX_POOLED_ALIGN * 2).unwrap();

        assert_eq!(class_index_for(layout), None);
    }

    #[test]
    fn word_aligned_layouts_are_pooled() {
        let layout = Layout::new::<u64>();

        assert_eq!(class_index_for(layout), Some(1));
    }

    #[test]
    fn classes_are_ordered_by_ascending_chunk_size() {
        for pair in SIZE_CLASSES.windows(2) {
            assert!(pair[0].chunk_size() < pair[1].chunk_size());
        }
    }
}
