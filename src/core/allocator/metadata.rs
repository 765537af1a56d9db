//! Placement bookkeeping for one block of device memory
//!
//! `BlockMetadata` partitions `[0, size)` into an offset-ordered run of
//! suballocations. Free runs are always coalesced, and free runs of at least
//! `min_free_suballocation_size_to_register` bytes are mirrored in a
//! size-sorted index for best-fit lookup.
//!
//! The metadata is not synchronized. The owner must hold one lock across a
//! whole request → evict → commit sequence (see `LockedBlock`).

use crate::allocation::{Allocation, AllocationHandle};
use crate::allocator::arena::NodeId;
use crate::allocator::free_index::FreeSizeIndex;
use crate::allocator::list::{Suballocation, SuballocationList};
use crate::allocator::request::{AllocationContext, AllocationRequest, FitStrategy};
use crate::allocator::suballocation::{
    align_up, blocks_on_same_page, is_granularity_conflict,
};
use crate::config::SuballocConfig;
use crate::error::{Result, SuballocError};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Scratch state of one eviction candidate
#[derive(Debug, Default)]
struct Candidate {
    offset: u64,
    sum_free_size: u64,
    sum_item_size: u64,
    victims: Vec<NodeId>,
}

impl Candidate {
    fn reset(&mut self) {
        self.offset = 0;
        self.sum_free_size = 0;
        self.sum_item_size = 0;
        self.victims.clear();
    }

    fn cost(&self, lost_allocation_cost: u64) -> u64 {
        self.sum_item_size
            .saturating_add((self.victims.len() as u64).saturating_mul(lost_allocation_cost))
    }
}

#[derive(Debug)]
pub struct BlockMetadata<H: AllocationHandle = Allocation> {
    size: u64,
    config: SuballocConfig,
    suballocations: SuballocationList<H>,
    free_index: FreeSizeIndex,
    free_count: usize,
    sum_free_size: u64,
    // Bumped by every mutation; requests carry the value they were computed at.
    epoch: u64,
}

impl<H: AllocationHandle> BlockMetadata<H> {
    /// Metadata for a block of `size` bytes with the default configuration
    pub fn new(size: u64) -> Result<Self> {
        Self::with_config(size, SuballocConfig::default())
    }

    pub fn with_config(size: u64, config: SuballocConfig) -> Result<Self> {
        if size == 0 {
            return Err(SuballocError::InvalidBlockSize(size));
        }
        config.check()?;

        let suballocations = SuballocationList::new(size);
        let mut free_index = FreeSizeIndex::new(config.min_free_suballocation_size_to_register);
        if let Some(root) = suballocations.first() {
            free_index.register(&suballocations, root);
        }

        debug!("Created block metadata for {} bytes", size);

        Ok(BlockMetadata {
            size,
            config,
            suballocations,
            free_index,
            free_count: 1,
            sum_free_size: size,
            epoch: 0,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn config(&self) -> &SuballocConfig {
        &self.config
    }

    /// Number of occupied suballocations
    pub fn allocation_count(&self) -> usize {
        self.suballocations.len() - self.free_count
    }

    /// Number of free suballocations
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    pub fn sum_free_size(&self) -> u64 {
        self.sum_free_size
    }

    /// Size of the largest registered free range
    ///
    /// Free ranges below the registration threshold are not considered.
    pub fn unused_range_size_max(&self) -> u64 {
        self.free_index
            .largest()
            .map(|id| self.suballocations[id].size())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.suballocations.len() == 1 && self.free_count == 1
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// All suballocations in ascending offset order
    pub fn suballocations(&self) -> impl Iterator<Item = &Suballocation<H>> + '_ {
        self.suballocations.iter().map(|(_, node)| node)
    }

    /// Free ranges in the size index, ascending by size
    pub fn free_size_index(&self) -> impl Iterator<Item = &Suballocation<H>> + '_ {
        self.free_index
            .as_slice()
            .iter()
            .map(move |&id| &self.suballocations[id])
    }

    /// Handle of the allocation starting at `offset`
    pub fn allocation_at(&self, offset: u64) -> Option<&Arc<H>> {
        self.suballocations()
            .find(|node| node.offset() == offset)
            .and_then(|node| node.handle())
    }

    /// Find a placement for `ctx` without modifying the block
    ///
    /// `Ok(None)` means nothing fits, which is an ordinary outcome. Errors
    /// are reserved for malformed contexts.
    pub fn try_create_allocation_request(
        &self,
        ctx: &AllocationContext,
    ) -> Result<Option<AllocationRequest>> {
        ctx.check()?;

        let margin = self.config.debug_margin;
        let needed = ctx.size.saturating_add(margin.saturating_mul(2));

        if needed > self.size {
            trace!("Request of {} bytes exceeds block of {} bytes", ctx.size, self.size);
            return Ok(None);
        }
        if !ctx.can_make_other_lost && self.sum_free_size < needed {
            return Ok(None);
        }

        let granularity = self
            .config
            .effective_granularity(ctx.buffer_image_granularity);

        if let Some(request) = self.find_free_placement(ctx, granularity, needed) {
            trace!(
                "Placed {} bytes at offset {} without eviction",
                request.size,
                request.offset
            );
            return Ok(Some(request));
        }

        if ctx.can_make_other_lost {
            let request = self.find_evicting_placement(ctx, granularity);
            if let Some(request) = &request {
                trace!(
                    "Placed {} bytes at offset {} evicting {} allocations",
                    request.size,
                    request.offset,
                    request.victims.len()
                );
            }
            return Ok(request);
        }

        Ok(None)
    }

    fn find_free_placement(
        &self,
        ctx: &AllocationContext,
        granularity: u64,
        needed: u64,
    ) -> Option<AllocationRequest> {
        let try_item = |id: NodeId| {
            self.place_in_free(ctx, granularity, id)
                .map(|offset| self.free_request(ctx, id, offset))
        };

        match ctx.strategy {
            FitStrategy::BestFit => {
                let start = self.free_index.lower_bound(&self.suballocations, needed);
                // Entries past the lower bound fit by size but may still fail
                // alignment or granularity, so keep scanning.
                self.free_index.as_slice()[start..]
                    .iter()
                    .find_map(|&id| try_item(id))
            }
            FitStrategy::MinOffset => self
                .suballocations
                .iter()
                .filter(|(_, node)| node.is_free())
                .find_map(|(id, _)| try_item(id)),
            FitStrategy::WorstFit | FitStrategy::FirstFit => self
                .free_index
                .as_slice()
                .iter()
                .rev()
                .find_map(|&id| try_item(id)),
        }
    }

    fn find_evicting_placement(
        &self,
        ctx: &AllocationContext,
        granularity: u64,
    ) -> Option<AllocationRequest> {
        let lost_allocation_cost = self.config.lost_allocation_cost;
        let mut best: Option<(u64, AllocationRequest)> = None;
        let mut candidate = Candidate::default();

        for (id, node) in self.suballocations.iter() {
            let eligible = node.is_free() || node.handle().is_some_and(|h| h.can_become_lost());
            if !eligible || !self.place_with_eviction(ctx, granularity, id, &mut candidate) {
                continue;
            }

            let cost = candidate.cost(lost_allocation_cost);
            if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
                best = Some((cost, self.evicting_request(ctx, id, &candidate)));
            }
            // Nothing beats a placement that evicts nothing.
            if ctx.strategy == FitStrategy::FirstFit || cost == 0 {
                break;
            }
        }

        best.map(|(_, request)| request)
    }

    fn free_request(&self, ctx: &AllocationContext, item: NodeId, offset: u64) -> AllocationRequest {
        AllocationRequest {
            offset,
            size: ctx.size,
            alignment: ctx.alignment,
            resource_type: ctx.resource_type,
            item,
            sum_free_size: self.suballocations[item].size(),
            sum_item_size: 0,
            victims: Vec::new(),
            epoch: self.epoch,
        }
    }

    fn evicting_request(
        &self,
        ctx: &AllocationContext,
        item: NodeId,
        candidate: &Candidate,
    ) -> AllocationRequest {
        AllocationRequest {
            offset: candidate.offset,
            size: ctx.size,
            alignment: ctx.alignment,
            resource_type: ctx.resource_type,
            item,
            sum_free_size: candidate.sum_free_size,
            sum_item_size: candidate.sum_item_size,
            victims: candidate.victims.clone(),
            epoch: self.epoch,
        }
    }

    fn is_evictable(&self, node: &Suballocation<H>, ctx: &AllocationContext) -> bool {
        node.handle()
            .is_some_and(|h| h.is_evictable(ctx.current_frame, ctx.frame_in_use_count))
    }

    /// Push `offset` to the next granularity page if an occupied neighbour
    /// before `item` shares its page and conflicts with the request type
    ///
    /// The bumped offset keeps the requested alignment, which need not be a
    /// power of two.
    fn bump_past_previous_conflicts(
        &self,
        ctx: &AllocationContext,
        item: NodeId,
        offset: u64,
        granularity: u64,
    ) -> u64 {
        if granularity <= 1 {
            return offset;
        }

        let mut cursor = self.suballocations.prev(item);
        while let Some(id) = cursor {
            let prev = &self.suballocations[id];
            if !blocks_on_same_page(prev.offset(), prev.size(), offset, granularity) {
                break;
            }
            if is_granularity_conflict(prev.ty(), ctx.resource_type) {
                return align_up(align_up(offset, granularity), ctx.alignment);
            }
            cursor = self.suballocations.prev(id);
        }
        offset
    }

    /// Offset at which `ctx` fits inside the free suballocation `item`
    fn place_in_free(&self, ctx: &AllocationContext, granularity: u64, item: NodeId) -> Option<u64> {
        let node = &self.suballocations[item];
        debug_assert!(node.is_free());

        if node.size() < ctx.size {
            return None;
        }

        let margin = self.config.debug_margin;
        let offset = align_up(node.offset() + margin, ctx.alignment);
        let offset = self.bump_past_previous_conflicts(ctx, item, offset, granularity);

        let padding_begin = offset - node.offset();
        if padding_begin.saturating_add(ctx.size).saturating_add(margin) > node.size() {
            return None;
        }

        if granularity > 1 {
            let mut cursor = self.suballocations.next(item);
            while let Some(id) = cursor {
                let next = &self.suballocations[id];
                if !blocks_on_same_page(offset, ctx.size, next.offset(), granularity) {
                    break;
                }
                if is_granularity_conflict(ctx.resource_type, next.ty()) {
                    return None;
                }
                cursor = self.suballocations.next(id);
            }
        }

        Some(offset)
    }

    /// Evaluate a placement starting in `item` that may evict evictable
    /// allocations, filling `candidate` on success
    fn place_with_eviction(
        &self,
        ctx: &AllocationContext,
        granularity: u64,
        item: NodeId,
        candidate: &mut Candidate,
    ) -> bool {
        candidate.reset();

        let node = &self.suballocations[item];
        if node.is_free() {
            candidate.sum_free_size = node.size();
        } else if self.is_evictable(node, ctx) {
            candidate.victims.push(item);
            candidate.sum_item_size = node.size();
        } else {
            return false;
        }

        if self.size - node.offset() < ctx.size {
            return false;
        }

        let margin = self.config.debug_margin;
        let offset = align_up(node.offset() + margin, ctx.alignment);
        let offset = self.bump_past_previous_conflicts(ctx, item, offset, granularity);

        // Placement must start inside `item`; a later item is evaluated on its own.
        if offset >= node.end() {
            return false;
        }

        let padding_begin = offset - node.offset();
        let total_size = padding_begin.saturating_add(ctx.size).saturating_add(margin);
        if node.offset().saturating_add(total_size) > self.size {
            return false;
        }

        let mut last = item;
        if total_size > node.size() {
            let mut remaining = total_size - node.size();
            while remaining > 0 {
                let Some(next_id) = self.suballocations.next(last) else {
                    return false;
                };
                last = next_id;

                let next = &self.suballocations[next_id];
                if next.is_free() {
                    candidate.sum_free_size += next.size();
                } else if self.is_evictable(next, ctx) {
                    candidate.victims.push(next_id);
                    candidate.sum_item_size += next.size();
                } else {
                    return false;
                }
                remaining = remaining.saturating_sub(next.size());
            }
        }

        // Conflicting neighbours after the span have to be evicted too.
        if granularity > 1 {
            let mut cursor = self.suballocations.next(last);
            while let Some(id) = cursor {
                let next = &self.suballocations[id];
                if !blocks_on_same_page(offset, ctx.size, next.offset(), granularity) {
                    break;
                }
                if is_granularity_conflict(ctx.resource_type, next.ty()) {
                    if self.is_evictable(next, ctx) {
                        candidate.victims.push(id);
                    } else {
                        return false;
                    }
                }
                cursor = self.suballocations.next(id);
            }
        }

        candidate.offset = offset;
        true
    }

    fn check_epoch(&self, request: &AllocationRequest) -> Result<()> {
        if request.epoch != self.epoch {
            return Err(SuballocError::StaleRequest {
                request: request.epoch,
                block: self.epoch,
            });
        }
        Ok(())
    }

    /// Commit a free-only request, installing `handle` at its offset
    ///
    /// Requests that still list allocations to evict must first go through
    /// [`make_requested_allocations_lost`](Self::make_requested_allocations_lost).
    pub fn alloc(&mut self, request: &AllocationRequest, handle: Arc<H>) -> Result<()> {
        self.check_epoch(request)?;
        if request.needs_eviction() {
            return Err(SuballocError::RequestNotCommittable(request.victims.len()));
        }
        if handle.offset() != request.offset || handle.size() != request.size {
            return Err(SuballocError::HandleMismatch(format!(
                "handle covers [{}, +{}), request covers [{}, +{})",
                handle.offset(),
                handle.size(),
                request.offset,
                request.size
            )));
        }

        let item = request.item;
        let (node_offset, node_size) = match self.suballocations.get(item) {
            Some(node) if node.is_free() => (node.offset(), node.size()),
            _ => {
                return Err(SuballocError::Corrupted(
                    "request target is not a free suballocation".into(),
                ))
            }
        };
        if request.offset < node_offset || request.offset + request.size > node_offset + node_size {
            return Err(SuballocError::Corrupted(format!(
                "request [{}, +{}) outside free range [{}, +{})",
                request.offset, request.size, node_offset, node_size
            )));
        }

        let padding_begin = request.offset - node_offset;
        let padding_end = node_size - padding_begin - request.size;

        self.free_index.unregister(&self.suballocations, item);
        self.suballocations[item].occupy(
            request.offset,
            request.size,
            request.resource_type,
            handle,
        );

        self.free_count -= 1;
        if padding_end > 0 {
            let tail = Suballocation::free(request.offset + request.size, padding_end);
            let id = self.suballocations.insert_after(item, tail);
            self.free_index.register(&self.suballocations, id);
            self.free_count += 1;
        }
        if padding_begin > 0 {
            let head = Suballocation::free(node_offset, padding_begin);
            let id = self.suballocations.insert_before(item, head);
            self.free_index.register(&self.suballocations, id);
            self.free_count += 1;
        }
        self.sum_free_size -= request.size;
        self.epoch += 1;

        trace!(
            "Allocated {} bytes at offset {} ({:?})",
            request.size,
            request.offset,
            request.resource_type
        );
        self.heavy_validate();
        Ok(())
    }

    /// Evict the allocations an eviction request depends on
    ///
    /// Returns `Ok(false)` if one of them could not be made lost (it was used
    /// again since the request was computed). The request must then be
    /// discarded. On success the request is refreshed and can be passed to
    /// [`alloc`](Self::alloc).
    pub fn make_requested_allocations_lost(
        &mut self,
        request: &mut AllocationRequest,
        current_frame: u32,
        frame_in_use_count: u32,
    ) -> Result<bool> {
        self.check_epoch(request)?;
        if request.victims.is_empty() {
            return Ok(true);
        }

        let mut target = self
            .suballocations
            .get(request.item)
            .filter(|node| node.is_free())
            .map(|_| request.item);
        let victims = std::mem::take(&mut request.victims);

        for evicted in 0..victims.len() {
            let victim = victims[evicted];
            let handle = match self.suballocations.get(victim).and_then(|node| node.handle()) {
                Some(handle) => Arc::clone(handle),
                None => {
                    request.victims = victims;
                    return Err(SuballocError::Corrupted(
                        "eviction victim is not an occupied suballocation".into(),
                    ));
                }
            };

            if !handle.try_make_lost(current_frame, frame_in_use_count) {
                warn!(
                    "Eviction aborted at offset {}: allocation is in use again ({} of {} evicted)",
                    handle.offset(),
                    evicted,
                    victims.len()
                );
                if evicted > 0 {
                    self.epoch += 1;
                }
                request.victims = victims;
                return Ok(false);
            }

            let merged = self.free_suballocation(victim);
            if self.suballocations[merged].contains(request.offset) {
                target = Some(merged);
            }
        }

        self.epoch += 1;
        let Some(target) = target else {
            return Err(SuballocError::Corrupted(
                "no free range covers the request after eviction".into(),
            ));
        };

        debug!(
            "Made {} allocations lost ({} bytes) for request at offset {}",
            victims.len(),
            request.sum_item_size,
            request.offset
        );

        request.item = target;
        request.sum_free_size = self.suballocations[target].size();
        request.sum_item_size = 0;
        request.epoch = self.epoch;
        self.heavy_validate();
        Ok(true)
    }

    /// Evict and free every allocation that is old enough, returning how many
    pub fn make_allocations_lost(&mut self, current_frame: u32, frame_in_use_count: u32) -> usize {
        let mut lost = 0;
        let mut cursor = self.suballocations.first();

        while let Some(id) = cursor {
            let evicted = self.suballocations[id].handle().is_some_and(|h| {
                h.can_become_lost() && h.try_make_lost(current_frame, frame_in_use_count)
            });

            let at = if evicted {
                lost += 1;
                self.free_suballocation(id)
            } else {
                id
            };
            cursor = self.suballocations.next(at);
        }

        if lost > 0 {
            self.epoch += 1;
            debug!(
                "Made {} allocations lost in frame {} (frame in use count {})",
                lost, current_frame, frame_in_use_count
            );
            self.heavy_validate();
        }
        lost
    }

    /// Release the suballocation holding `handle`
    pub fn free(&mut self, handle: &Arc<H>) -> Result<()> {
        let found = self
            .suballocations
            .iter()
            .find(|(_, node)| node.handle().is_some_and(|h| Arc::ptr_eq(h, handle)))
            .map(|(id, _)| id);

        let Some(id) = found else {
            error!("Free of allocation at offset {} not owned by this block", handle.offset());
            return Err(SuballocError::AllocationNotFound);
        };

        self.free_suballocation(id);
        self.epoch += 1;
        self.heavy_validate();
        Ok(())
    }

    /// Release the allocation starting at `offset`, returning its handle
    pub fn free_at_offset(&mut self, offset: u64) -> Result<Arc<H>> {
        let found = self
            .suballocations
            .iter()
            .find(|(_, node)| node.offset() == offset && !node.is_free())
            .and_then(|(id, node)| node.handle().map(|h| (id, Arc::clone(h))));

        let Some((id, handle)) = found else {
            error!("Free at offset {} does not match any allocation", offset);
            return Err(SuballocError::NoAllocationAtOffset(offset));
        };

        self.free_suballocation(id);
        self.epoch += 1;
        self.heavy_validate();
        Ok(handle)
    }

    /// Mark `id` free and coalesce it with free neighbours
    ///
    /// Returns the id of the resulting free run.
    fn free_suballocation(&mut self, id: NodeId) -> NodeId {
        let size = {
            let node = &mut self.suballocations[id];
            debug_assert!(!node.is_free());
            node.release();
            node.size()
        };
        self.free_count += 1;
        self.sum_free_size += size;

        trace!("Freed {} bytes at offset {}", size, self.suballocations[id].offset());

        let next = self
            .suballocations
            .next(id)
            .filter(|&next| self.suballocations[next].is_free());
        let prev = self
            .suballocations
            .prev(id)
            .filter(|&prev| self.suballocations[prev].is_free());

        if let Some(next) = next {
            self.free_index.unregister(&self.suballocations, next);
            self.merge_free_with_next(id, next);
        }

        match prev {
            Some(prev) => {
                self.free_index.unregister(&self.suballocations, prev);
                self.merge_free_with_next(prev, id);
                self.free_index.register(&self.suballocations, prev);
                prev
            }
            None => {
                self.free_index.register(&self.suballocations, id);
                id
            }
        }
    }

    /// Fold the free node `next` into the free node `id` directly before it
    fn merge_free_with_next(&mut self, id: NodeId, next: NodeId) {
        debug_assert_eq!(self.suballocations.next(id), Some(next));
        let removed = self.suballocations.remove(next);
        debug_assert!(removed.is_free());
        self.suballocations[id].grow(removed.size());
        self.free_count -= 1;
    }

    /// Recompute every invariant from scratch
    pub fn validate(&self) -> Result<()> {
        let result = self.validate_inner();
        if let Err(e) = &result {
            error!("Block metadata validation failed: {}", e);
        }
        result
    }

    fn validate_inner(&self) -> Result<()> {
        fn corrupted<T>(message: String) -> Result<T> {
            Err(SuballocError::Corrupted(message))
        }

        if self.suballocations.is_empty() {
            return corrupted("suballocation list is empty".into());
        }

        let margin = self.config.debug_margin;
        let mut calculated_offset = 0u64;
        let mut calculated_free_count = 0usize;
        let mut calculated_sum_free = 0u64;
        let mut to_register = 0usize;
        let mut walked = 0usize;
        let mut prev_free = false;
        let mut prev_id: Option<NodeId> = None;

        for (id, node) in self.suballocations.iter() {
            if self.suballocations.prev(id) != prev_id {
                return corrupted(format!("broken back link at offset {}", node.offset()));
            }
            if node.offset() != calculated_offset {
                return corrupted(format!(
                    "suballocation at offset {} expected at {}",
                    node.offset(),
                    calculated_offset
                ));
            }
            if node.size() == 0 {
                return corrupted(format!("empty suballocation at offset {}", node.offset()));
            }

            let free = node.is_free();
            if prev_free && free {
                return corrupted(format!("adjacent free ranges at offset {}", node.offset()));
            }
            if free != node.handle().is_none() {
                return corrupted(format!(
                    "handle presence disagrees with type at offset {}",
                    node.offset()
                ));
            }

            if free {
                calculated_sum_free += node.size();
                calculated_free_count += 1;
                if self.free_index.tracks(node.size()) {
                    to_register += 1;
                }
                if node.size() < margin {
                    return corrupted(format!(
                        "free range at offset {} smaller than debug margin",
                        node.offset()
                    ));
                }
            } else if let Some(handle) = node.handle() {
                if handle.offset() != node.offset() || handle.size() != node.size() {
                    return corrupted(format!(
                        "handle [{}, +{}) disagrees with suballocation [{}, +{})",
                        handle.offset(),
                        handle.size(),
                        node.offset(),
                        node.size()
                    ));
                }
                if margin > 0 && !prev_free {
                    return corrupted(format!(
                        "allocation at offset {} not preceded by a debug margin",
                        node.offset()
                    ));
                }
            }

            calculated_offset += node.size();
            prev_free = free;
            prev_id = Some(id);
            walked += 1;
        }

        if self.suballocations.last() != prev_id {
            return corrupted("list tail does not match last node".into());
        }
        if walked != self.suballocations.len() {
            return corrupted(format!(
                "walked {} nodes, arena holds {}",
                walked,
                self.suballocations.len()
            ));
        }
        if calculated_offset != self.size {
            return corrupted(format!(
                "suballocations cover {} bytes of {}",
                calculated_offset, self.size
            ));
        }
        if calculated_sum_free != self.sum_free_size {
            return corrupted(format!(
                "free bytes {} but counter says {}",
                calculated_sum_free, self.sum_free_size
            ));
        }
        if calculated_free_count != self.free_count {
            return corrupted(format!(
                "{} free ranges but counter says {}",
                calculated_free_count, self.free_count
            ));
        }

        if self.free_index.len() != to_register {
            return corrupted(format!(
                "size index holds {} entries, expected {}",
                self.free_index.len(),
                to_register
            ));
        }
        let mut last_size = 0u64;
        for &id in self.free_index.as_slice() {
            let Some(node) = self.suballocations.get(id) else {
                return corrupted(format!("size index references dead node {:?}", id));
            };
            if !node.is_free() {
                return corrupted(format!(
                    "size index references occupied range at offset {}",
                    node.offset()
                ));
            }
            if node.size() < last_size {
                return corrupted("size index out of order".into());
            }
            if !self.free_index.tracks(node.size()) {
                return corrupted(format!(
                    "size index holds range of {} bytes below threshold {}",
                    node.size(),
                    self.free_index.threshold()
                ));
            }
            last_size = node.size();
        }

        Ok(())
    }

    #[inline]
    fn heavy_validate(&self) {
        #[cfg(feature = "heavy-validation")]
        {
            if let Err(e) = self.validate() {
                panic!("block metadata invariant violated: {}", e);
            }
        }
    }
}
