//! A size-classed memory pool allocator for small objects.
//!
//! This crate provides [`PoolAllocator`], an [`std::alloc::Allocator`]
//! implementation that serves small allocations from fixed-size chunk pools
//! and routes everything else to the general-purpose allocator. It is built
//! for allocation-heavy ordered containers (maps, sets, trees) whose nodes
//! are small and uniform.
//!
//! # Key features
//!
//! - **O(1) allocate and deallocate**: chunks come from an embedded
//!   free-chunk list, never from a search.
//! - **O(1) pointer-to-owner recovery**: every chunk carries a backpointer to
//!   its owning block, so deallocation needs no lookup table.
//! - **Size-classed routing**: four chunk sizes (4, 16, 64 and 512 bytes);
//!   larger or over-aligned requests fall back to the system allocator.
//! - **Eager page reclamation**: a page is destroyed the moment its last
//!   chunk is returned; an idle pool holds no memory.
//! - **Stateless handles**: every [`PoolAllocator`] compares equal, so
//!   containers can copy and swap allocators freely.
//!
//! # Example
//!
//! ```
//! #![feature(allocator_api, btreemap_alloc)]
//!
//! use std::collections::BTreeMap;
//!
//! use small_pool::PoolAllocator;
//!
//! let mut map = BTreeMap::new_in(PoolAllocator::new());
//!
//! for id in 0_u64..1000 {
//!     map.insert(id, id.to_string());
//! }
//!
//! assert_eq!(map.len(), 1000);
//! drop(map);
//!
//! // Every page the map used has been handed back.
//! assert_eq!(small_pool::pooled_page_count(), 0);
//! ```
//!
//! # Thread model
//!
//! Pools are thread-local: each thread lazily creates its own set on first
//! use, and allocate/deallocate never synchronize. A pooled container must
//! stay on the thread that created it and be dropped before that thread
//! exits.

#![feature(allocator_api)]

mod allocator;
mod block;
mod errors;
mod page;
mod pool;
mod registry;
mod size_class;

pub use allocator::*;
pub(crate) use block::*;
pub use errors::Error;
pub(crate) use errors::Result;
pub(crate) use page::*;
pub use pool::*;
pub use registry::{page_counts_per_class, pooled_page_count};
pub use size_class::{SIZE_CLASSES, SizeClass};
