//! # suballoc-rs - Device Memory Block Suballocator
//!
//! Bookkeeping for carving one large block of GPU memory into aligned
//! suballocations, in the style of a generic block allocator:
//!
//! - **Fit strategies**: best fit, first fit, worst fit and lowest offset
//! - **Buffer/image granularity**: linear and optimal-tiling resources never
//!   share a granularity page
//! - **Lost allocations**: allocations not used for a number of frames can be
//!   evicted to make room for new ones
//! - **Self validation**: every invariant can be rechecked on demand
//!
//! The crate manages offsets only. It never touches the memory itself.
//!
//! ## Quick Start
//!
//! ```rust
//! use suballoc_rs::{Allocation, AllocationContext, BlockMetadata, Result, SuballocationType};
//!
//! # fn main() -> Result<()> {
//! let mut block: BlockMetadata = BlockMetadata::new(1024)?;
//!
//! let ctx = AllocationContext::new(100, 16, SuballocationType::UsedBuffer);
//! if let Some(request) = block.try_create_allocation_request(&ctx)? {
//!     let handle = Allocation::for_request(&request, false, 0);
//!     block.alloc(&request, handle.clone())?;
//!     assert_eq!(block.allocation_count(), 1);
//!
//!     block.free(&handle)?;
//! }
//! assert!(block.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Eviction
//!
//! ```rust
//! use suballoc_rs::{AllocationContext, BlockMetadata, LockedBlock, Result, SuballocationType};
//!
//! # fn main() -> Result<()> {
//! let block: LockedBlock = LockedBlock::new(BlockMetadata::new(1024)?);
//!
//! let full = AllocationContext::new(1024, 1, SuballocationType::UsedBuffer);
//! let old = block.allocate_default(&full, true)?.expect("empty block");
//!
//! // Ten frames later, with two frames in flight, the old allocation can go.
//! let ctx = AllocationContext::new(256, 1, SuballocationType::UsedImageOptimal)
//!     .allow_eviction(10, 2);
//! let fresh = block.allocate_default(&ctx, true)?;
//! assert!(fresh.is_some());
//! assert!(old.is_lost());
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{allocation, allocator, config, error, stats};

pub use crate::core::{
    allocation::{
        is_frame_old_enough, Allocation, AllocationHandle, AllocationState, FRAME_INDEX_LOST,
    },
    allocator::{
        arena::NodeId,
        suballocation::{align_down, align_up, blocks_on_same_page, is_granularity_conflict},
        AllocationContext, AllocationRequest, BlockMetadata, FitStrategy, LockedBlock,
        Suballocation, SuballocationType,
    },
    config::SuballocConfig,
    error::{Result, SuballocError},
    stats::BlockStats,
};
