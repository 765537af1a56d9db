//! Thread-safe wrapper around a single block
//!
//! Eviction is a three step protocol (request, make lost, commit) and the
//! request is only valid while nobody else touches the block. `LockedBlock`
//! holds one `parking_lot::Mutex` across all three steps.

use crate::allocation::{Allocation, AllocationHandle};
use crate::allocator::metadata::BlockMetadata;
use crate::allocator::request::{AllocationContext, AllocationRequest};
use crate::error::Result;
use crate::stats::BlockStats;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct LockedBlock<H: AllocationHandle = Allocation> {
    metadata: Mutex<BlockMetadata<H>>,
}

impl<H: AllocationHandle> LockedBlock<H> {
    pub fn new(metadata: BlockMetadata<H>) -> Self {
        LockedBlock {
            metadata: Mutex::new(metadata),
        }
    }

    /// Place, evict if needed, and commit in one critical section
    ///
    /// `make_handle` builds the handle for the final request. When an
    /// eviction aborts because a victim was used again, the search is rerun
    /// up to `allocation_try_count` times. Returns `Ok(None)` when nothing
    /// fits.
    pub fn allocate<F>(&self, ctx: &AllocationContext, mut make_handle: F) -> Result<Option<Arc<H>>>
    where
        F: FnMut(&AllocationRequest) -> Arc<H>,
    {
        let mut metadata = self.metadata.lock();
        let try_count = metadata.config().allocation_try_count;

        for attempt in 1..=try_count {
            let Some(mut request) = metadata.try_create_allocation_request(ctx)? else {
                return Ok(None);
            };

            if request.needs_eviction()
                && !metadata.make_requested_allocations_lost(
                    &mut request,
                    ctx.current_frame,
                    ctx.frame_in_use_count,
                )?
            {
                debug!("Allocation attempt {} of {} lost an eviction race", attempt, try_count);
                continue;
            }

            let handle = make_handle(&request);
            metadata.alloc(&request, Arc::clone(&handle))?;
            return Ok(Some(handle));
        }

        warn!("Giving up on {} byte allocation after {} attempts", ctx.size, try_count);
        Ok(None)
    }

    pub fn free(&self, handle: &Arc<H>) -> Result<()> {
        self.metadata.lock().free(handle)
    }

    pub fn make_allocations_lost(&self, current_frame: u32, frame_in_use_count: u32) -> usize {
        self.metadata
            .lock()
            .make_allocations_lost(current_frame, frame_in_use_count)
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.lock().validate()
    }

    pub fn stats(&self) -> BlockStats {
        self.metadata.lock().stats()
    }

    /// Direct access for multi-step operations the wrapper does not cover
    pub fn lock(&self) -> MutexGuard<'_, BlockMetadata<H>> {
        self.metadata.lock()
    }

    pub fn into_inner(self) -> BlockMetadata<H> {
        self.metadata.into_inner()
    }
}

impl LockedBlock<Allocation> {
    /// [`allocate`](Self::allocate) with the default handle
    pub fn allocate_default(
        &self,
        ctx: &AllocationContext,
        can_become_lost: bool,
    ) -> Result<Option<Arc<Allocation>>> {
        self.allocate(ctx, |request| {
            Allocation::for_request(request, can_become_lost, ctx.current_frame)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::suballocation::SuballocationType;
    use std::thread;

    fn block(size: u64) -> LockedBlock {
        LockedBlock::new(BlockMetadata::new(size).unwrap())
    }

    #[test]
    fn test_allocate_and_free() {
        let block = block(1024);
        let ctx = AllocationContext::new(256, 16, SuballocationType::UsedBuffer);

        let a = block.allocate_default(&ctx, false).unwrap().unwrap();
        let b = block.allocate_default(&ctx, false).unwrap().unwrap();
        assert_ne!(a.offset(), b.offset());
        assert_eq!(block.stats().allocation_count, 2);

        block.free(&a).unwrap();
        block.free(&b).unwrap();
        assert!(block.lock().is_empty());
    }

    #[test]
    fn test_allocate_returns_none_when_full() {
        let block = block(512);
        let ctx = AllocationContext::new(512, 1, SuballocationType::UsedBuffer);
        let _full = block.allocate_default(&ctx, false).unwrap().unwrap();
        assert!(block.allocate_default(&ctx, false).unwrap().is_none());
    }

    #[test]
    fn test_allocate_evicts_under_lock() {
        let block = block(1024);
        let old = block
            .allocate_default(&AllocationContext::new(1024, 1, SuballocationType::UsedBuffer), true)
            .unwrap()
            .unwrap();

        let ctx = AllocationContext::new(512, 1, SuballocationType::UsedImageOptimal)
            .allow_eviction(10, 2);
        let fresh = block.allocate_default(&ctx, true).unwrap().unwrap();

        assert!(old.is_lost());
        assert_eq!(fresh.offset(), 0);
        assert_eq!(fresh.last_use_frame_index(), 10);
        block.validate().unwrap();
    }

    #[test]
    fn test_concurrent_allocations() {
        let block = Arc::new(block(64 * 1024));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let block = Arc::clone(&block);
                thread::spawn(move || {
                    let ctx = AllocationContext::new(256, 64, SuballocationType::UsedBuffer);
                    let mut mine = Vec::new();
                    for _ in 0..32 {
                        mine.push(block.allocate_default(&ctx, false).unwrap().unwrap());
                    }
                    for handle in mine.iter().step_by(2) {
                        block.free(handle).unwrap();
                    }
                    mine.len() / 2
                })
            })
            .collect();

        let kept: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(block.stats().allocation_count, kept);
        block.validate().unwrap();
    }
}
