//! Block statistics and the detailed JSON map

use crate::allocation::AllocationHandle;
use crate::allocator::metadata::BlockMetadata;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Usage summary of one block, or of several after [`merge`](BlockStats::merge)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    pub block_count: usize,
    pub allocation_count: usize,
    pub unused_range_count: usize,
    pub used_bytes: u64,
    pub unused_bytes: u64,
    /// `u64::MAX` when there are no allocations
    pub allocation_size_min: u64,
    pub allocation_size_max: u64,
    /// `u64::MAX` when there are no unused ranges
    pub unused_range_size_min: u64,
    pub unused_range_size_max: u64,
}

impl Default for BlockStats {
    fn default() -> Self {
        BlockStats {
            block_count: 0,
            allocation_count: 0,
            unused_range_count: 0,
            used_bytes: 0,
            unused_bytes: 0,
            allocation_size_min: u64::MAX,
            allocation_size_max: 0,
            unused_range_size_min: u64::MAX,
            unused_range_size_max: 0,
        }
    }
}

impl BlockStats {
    /// Accumulate `other` into `self`
    pub fn merge(&mut self, other: &BlockStats) {
        self.block_count += other.block_count;
        self.allocation_count += other.allocation_count;
        self.unused_range_count += other.unused_range_count;
        self.used_bytes += other.used_bytes;
        self.unused_bytes += other.unused_bytes;
        self.allocation_size_min = self.allocation_size_min.min(other.allocation_size_min);
        self.allocation_size_max = self.allocation_size_max.max(other.allocation_size_max);
        self.unused_range_size_min = self.unused_range_size_min.min(other.unused_range_size_min);
        self.unused_range_size_max = self.unused_range_size_max.max(other.unused_range_size_max);
    }

    /// Fragmentation score (0.0 = contiguous free space, 1.0 = fully fragmented)
    ///
    /// Share of the free bytes that lie outside the largest unused range.
    pub fn fragmentation_score(&self) -> f64 {
        if self.unused_bytes == 0 {
            return 0.0;
        }
        1.0 - (self.unused_range_size_max as f64 / self.unused_bytes as f64)
    }
}

impl<H: AllocationHandle> BlockMetadata<H> {
    /// Walk the block and summarize it
    ///
    /// Unlike [`unused_range_size_max`](Self::unused_range_size_max) this
    /// also counts free ranges below the registration threshold.
    pub fn stats(&self) -> BlockStats {
        let mut stats = BlockStats {
            block_count: 1,
            ..BlockStats::default()
        };

        for node in self.suballocations() {
            let size = node.size();
            if node.is_free() {
                stats.unused_range_count += 1;
                stats.unused_bytes += size;
                stats.unused_range_size_min = stats.unused_range_size_min.min(size);
                stats.unused_range_size_max = stats.unused_range_size_max.max(size);
            } else {
                stats.allocation_count += 1;
                stats.used_bytes += size;
                stats.allocation_size_min = stats.allocation_size_min.min(size);
                stats.allocation_size_max = stats.allocation_size_max.max(size);
            }
        }

        stats
    }

    /// JSON document with the block totals and every suballocation
    pub fn detailed_map(&self) -> Value {
        let suballocations: Vec<Value> = self
            .suballocations()
            .map(|node| {
                json!({
                    "Offset": node.offset(),
                    "Type": node.ty().name(),
                    "Size": node.size(),
                })
            })
            .collect();

        json!({
            "TotalBytes": self.size(),
            "UnusedBytes": self.sum_free_size(),
            "Allocations": self.allocation_count(),
            "UnusedRanges": self.free_count(),
            "Suballocations": suballocations,
        })
    }

    /// [`detailed_map`](Self::detailed_map) rendered as pretty-printed JSON
    pub fn detailed_map_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.detailed_map())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::Allocation;
    use crate::allocator::request::{AllocationContext, FitStrategy};
    use crate::allocator::suballocation::SuballocationType;
    use std::sync::Arc;

    fn populated() -> (BlockMetadata, Vec<Arc<Allocation>>) {
        let mut meta: BlockMetadata = BlockMetadata::new(1024).unwrap();
        let mut handles = Vec::new();
        for size in [100, 8, 200] {
            let ctx = AllocationContext::new(size, 1, SuballocationType::UsedBuffer)
                .with_strategy(FitStrategy::MinOffset);
            let request = meta.try_create_allocation_request(&ctx).unwrap().unwrap();
            let handle = Allocation::for_request(&request, false, 0);
            meta.alloc(&request, Arc::clone(&handle)).unwrap();
            handles.push(handle);
        }
        (meta, handles)
    }

    #[test]
    fn test_empty_block_stats() {
        let meta: BlockMetadata = BlockMetadata::new(4096).unwrap();
        let stats = meta.stats();
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.allocation_count, 0);
        assert_eq!(stats.unused_range_count, 1);
        assert_eq!(stats.unused_bytes, 4096);
        assert_eq!(stats.allocation_size_min, u64::MAX);
        assert_eq!(stats.fragmentation_score(), 0.0);
    }

    #[test]
    fn test_stats_include_small_ranges() {
        let (mut meta, handles) = populated();
        meta.free(&handles[1]).unwrap();

        let stats = meta.stats();
        assert_eq!(stats.allocation_count, 2);
        assert_eq!(stats.used_bytes, 300);
        assert_eq!(stats.unused_range_count, 2);
        assert_eq!(stats.unused_range_size_min, 8);
        assert_eq!(stats.unused_range_size_max, 716);
        assert_eq!(stats.allocation_size_min, 100);
        assert_eq!(stats.allocation_size_max, 200);
        assert!(stats.fragmentation_score() > 0.0);
    }

    #[test]
    fn test_merge_stats() {
        let (meta, _handles) = populated();
        let empty: BlockMetadata = BlockMetadata::new(2048).unwrap();

        let mut total = BlockStats::default();
        total.merge(&meta.stats());
        total.merge(&empty.stats());

        assert_eq!(total.block_count, 2);
        assert_eq!(total.allocation_count, 3);
        assert_eq!(total.used_bytes, 308);
        assert_eq!(total.unused_bytes, 716 + 2048);
        assert_eq!(total.unused_range_size_max, 2048);
        assert_eq!(total.allocation_size_min, 8);
    }

    #[test]
    fn test_detailed_map() {
        let (meta, _handles) = populated();
        let map = meta.detailed_map();

        assert_eq!(map["TotalBytes"], 1024);
        assert_eq!(map["UnusedBytes"], 716);
        assert_eq!(map["Allocations"], 3);
        assert_eq!(map["UnusedRanges"], 1);

        let entries = map["Suballocations"].as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1]["Offset"], 100);
        assert_eq!(entries[1]["Type"], "BUFFER");
        assert_eq!(entries[3]["Type"], "FREE");

        let text = meta.detailed_map_string().unwrap();
        assert!(text.contains("\"Suballocations\""));
    }
}
