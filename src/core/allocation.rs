//! Allocation handles
//!
//! The block metadata never owns the memory behind an allocation; it only
//! holds an `Arc` to a caller-defined handle. The handle carries the frame
//! bookkeeping that decides whether an allocation may be evicted ("made
//! lost") to make room for a newer one.
//!
//! The default [`Allocation`] keeps its last-use frame in an atomic and marks
//! itself lost by swapping in [`FRAME_INDEX_LOST`], so render code may touch
//! it while the owning pool evicts it on another thread:
//!
//! ```text
//! Active --touch--> Active
//! Active --try_make_lost (old enough)--> Lost --free--> (gone)
//! ```

use crate::allocator::request::AllocationRequest;
use crate::allocator::suballocation::SuballocationType;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Last-use frame value of an allocation that has been made lost
pub const FRAME_INDEX_LOST: u32 = u32::MAX;

/// Frame-age test shared by every eviction path
///
/// An allocation last used in `last_use` is old enough to evict in
/// `current_frame` when `last_use + frame_in_use_count < current_frame`.
#[inline]
pub fn is_frame_old_enough(last_use: u32, current_frame: u32, frame_in_use_count: u32) -> bool {
    u64::from(last_use) + u64::from(frame_in_use_count) < u64::from(current_frame)
}

/// What the block metadata needs to know about an allocation
pub trait AllocationHandle: Send + Sync {
    /// Offset of the allocation inside its block
    fn offset(&self) -> u64;

    fn size(&self) -> u64;

    fn alignment(&self) -> u64;

    /// Whether the allocation was created as evictable
    fn can_become_lost(&self) -> bool;

    fn last_use_frame_index(&self) -> u32;

    /// Atomically mark the allocation lost if it is evictable in `current_frame`
    ///
    /// Returns `false` and leaves the handle untouched otherwise.
    fn try_make_lost(&self, current_frame: u32, frame_in_use_count: u32) -> bool;

    /// Non-mutating version of the eviction test
    fn is_evictable(&self, current_frame: u32, frame_in_use_count: u32) -> bool {
        if !self.can_become_lost() {
            return false;
        }
        let last_use = self.last_use_frame_index();
        last_use != FRAME_INDEX_LOST
            && is_frame_old_enough(last_use, current_frame, frame_in_use_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationState {
    Active,
    Lost,
}

/// Default allocation handle
#[derive(Debug)]
pub struct Allocation {
    offset: u64,
    size: u64,
    alignment: u64,
    resource_type: SuballocationType,
    can_become_lost: bool,
    last_use_frame_index: AtomicU32,
}

impl Allocation {
    pub fn new(
        offset: u64,
        size: u64,
        alignment: u64,
        resource_type: SuballocationType,
        can_become_lost: bool,
        current_frame: u32,
    ) -> Self {
        Allocation {
            offset,
            size,
            alignment,
            resource_type,
            can_become_lost,
            last_use_frame_index: AtomicU32::new(current_frame),
        }
    }

    /// Build the handle for a request that is about to be committed
    pub fn for_request(
        request: &AllocationRequest,
        can_become_lost: bool,
        current_frame: u32,
    ) -> Arc<Self> {
        Arc::new(Allocation::new(
            request.offset(),
            request.size(),
            request.alignment(),
            request.resource_type(),
            can_become_lost,
            current_frame,
        ))
    }

    pub fn resource_type(&self) -> SuballocationType {
        self.resource_type
    }

    pub fn state(&self) -> AllocationState {
        if self.last_use_frame_index.load(Ordering::Acquire) == FRAME_INDEX_LOST {
            AllocationState::Lost
        } else {
            AllocationState::Active
        }
    }

    pub fn is_lost(&self) -> bool {
        self.state() == AllocationState::Lost
    }

    /// Record a use in `current_frame`
    ///
    /// Returns `false` if the allocation is already lost and must not be used.
    pub fn touch(&self, current_frame: u32) -> bool {
        let mut last_use = self.last_use_frame_index.load(Ordering::Acquire);
        loop {
            if last_use == FRAME_INDEX_LOST {
                return false;
            }
            if last_use == current_frame {
                return true;
            }
            match self.last_use_frame_index.compare_exchange_weak(
                last_use,
                current_frame,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => last_use = actual,
            }
        }
    }
}

impl AllocationHandle for Allocation {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn alignment(&self) -> u64 {
        self.alignment
    }

    fn can_become_lost(&self) -> bool {
        self.can_become_lost
    }

    fn last_use_frame_index(&self) -> u32 {
        self.last_use_frame_index.load(Ordering::Acquire)
    }

    fn try_make_lost(&self, current_frame: u32, frame_in_use_count: u32) -> bool {
        if !self.can_become_lost {
            return false;
        }

        let mut last_use = self.last_use_frame_index.load(Ordering::Acquire);
        loop {
            if last_use == FRAME_INDEX_LOST {
                return false;
            }
            if !is_frame_old_enough(last_use, current_frame, frame_in_use_count) {
                return false;
            }
            match self.last_use_frame_index.compare_exchange_weak(
                last_use,
                FRAME_INDEX_LOST,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => last_use = actual,
            }
        }
    }
}
