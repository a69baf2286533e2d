use crate::Page;

/// Index of a block within its pool's slot arena.
///
/// Blocks are linked to each other by index rather than by pointer, so a block
/// can be relocated when the arena grows without touching any page internals.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub(crate) struct BlockIndex(usize);

impl BlockIndex {
    /// The arena slot that always holds the ring's sentinel.
    pub(crate) const SENTINEL: Self = Self(0);

    #[must_use]
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub(crate) fn get(self) -> usize {
        self.0
    }
}

/// Pure linkage node: owns at most one [`Page`] and participates in two
/// intrusive lists, the pool-membership ring ("all blocks") and the
/// has-free-capacity list.
///
/// The sentinel block owns no page and is a member of the ring only. A block's
/// free-list membership mirrors whether its page is non-full at every point
/// between pool operations; the pool maintains that invariant, the block has
/// no behavior of its own.
#[derive(Debug)]
pub(crate) struct Block {
    /// The page this block owns. `None` only for the ring's sentinel.
    pub(crate) page: Option<Page>,

    pub(crate) ring_prev: BlockIndex,
    pub(crate) ring_next: BlockIndex,

    pub(crate) free_prev: Option<BlockIndex>,
    pub(crate) free_next: Option<BlockIndex>,
}

impl Block {
    /// Creates the ring's sentinel: no page, ring links pointing at itself.
    #[must_use]
    pub(crate) fn sentinel() -> Self {
        Self {
            page: None,
            ring_prev: BlockIndex::SENTINEL,
            ring_next: BlockIndex::SENTINEL,
            free_prev: None,
            free_next: None,
        }
    }

    /// Creates an ordinary block owning `page`. Ring links start self-referential
    /// until the pool splices the block into the ring.
    #[must_use]
    pub(crate) fn new(page: Page, index: BlockIndex) -> Self {
        Self {
            page: Some(page),
            ring_prev: index,
            ring_next: index,
            free_prev: None,
            free_next: None,
        }
    }
}
