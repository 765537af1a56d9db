//! Allocation requests
//!
//! Placement is split in two steps so the owning pool can try several blocks
//! before mutating any of them:
//!
//! 1. [`BlockMetadata::try_create_allocation_request`] evaluates an
//!    [`AllocationContext`] against the block without changing it.
//! 2. [`BlockMetadata::alloc`] commits the resulting [`AllocationRequest`].
//!
//! A request is only valid until the next mutation of the block it came from.
//!
//! [`BlockMetadata::try_create_allocation_request`]: crate::allocator::metadata::BlockMetadata::try_create_allocation_request
//! [`BlockMetadata::alloc`]: crate::allocator::metadata::BlockMetadata::alloc

use crate::allocator::arena::NodeId;
use crate::allocator::suballocation::SuballocationType;
use crate::error::{Result, SuballocError};
use serde::{Deserialize, Serialize};

/// Policy for choosing among several admissible free ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FitStrategy {
    /// Smallest free range that fits
    #[default]
    BestFit,
    /// First admissible range found, scanning from the largest
    FirstFit,
    /// Largest free range
    WorstFit,
    /// Lowest admissible offset
    MinOffset,
}

/// Everything the placement search needs to know about one allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationContext {
    pub size: u64,
    pub alignment: u64,
    pub buffer_image_granularity: u64,
    pub resource_type: SuballocationType,
    pub strategy: FitStrategy,
    pub can_make_other_lost: bool,
    pub current_frame: u32,
    pub frame_in_use_count: u32,
}

impl AllocationContext {
    /// Best-fit, non-evicting request with granularity 1
    pub fn new(size: u64, alignment: u64, resource_type: SuballocationType) -> Self {
        AllocationContext {
            size,
            alignment,
            buffer_image_granularity: 1,
            resource_type,
            strategy: FitStrategy::default(),
            can_make_other_lost: false,
            current_frame: 0,
            frame_in_use_count: 0,
        }
    }

    pub fn with_granularity(mut self, buffer_image_granularity: u64) -> Self {
        self.buffer_image_granularity = buffer_image_granularity;
        self
    }

    pub fn with_strategy(mut self, strategy: FitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Allow evicting allocations older than `frame_in_use_count` frames
    pub fn allow_eviction(mut self, current_frame: u32, frame_in_use_count: u32) -> Self {
        self.can_make_other_lost = true;
        self.current_frame = current_frame;
        self.frame_in_use_count = frame_in_use_count;
        self
    }

    /// Frame counters without enabling eviction
    pub fn at_frame(mut self, current_frame: u32, frame_in_use_count: u32) -> Self {
        self.current_frame = current_frame;
        self.frame_in_use_count = frame_in_use_count;
        self
    }

    pub fn check(&self) -> Result<()> {
        if self.size == 0 {
            return Err(SuballocError::InvalidContext("size must be positive".into()));
        }
        if self.alignment == 0 {
            return Err(SuballocError::InvalidContext("alignment must be positive".into()));
        }
        if self.buffer_image_granularity == 0 {
            return Err(SuballocError::InvalidContext(
                "buffer/image granularity must be at least 1".into(),
            ));
        }
        if self.resource_type.is_free() {
            return Err(SuballocError::InvalidContext(
                "resource type cannot be Free".into(),
            ));
        }
        Ok(())
    }
}

/// A placement computed by the search, ready to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) alignment: u64,
    pub(crate) resource_type: SuballocationType,
    /// Suballocation the placement starts in
    pub(crate) item: NodeId,
    /// Free bytes inside the spanned range
    pub(crate) sum_free_size: u64,
    /// Bytes of live allocations that must be evicted
    pub(crate) sum_item_size: u64,
    /// Allocations to make lost, ascending by offset
    pub(crate) victims: Vec<NodeId>,
    /// Block epoch the request was computed against
    pub(crate) epoch: u64,
}

impl AllocationRequest {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn resource_type(&self) -> SuballocationType {
        self.resource_type
    }

    pub fn sum_free_size(&self) -> u64 {
        self.sum_free_size
    }

    pub fn sum_item_size(&self) -> u64 {
        self.sum_item_size
    }

    pub fn items_to_make_lost_count(&self) -> usize {
        self.victims.len()
    }

    pub fn needs_eviction(&self) -> bool {
        !self.victims.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
