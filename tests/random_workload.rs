//! Seeded random workload over several locked blocks
//!
//! Simulates a frame loop: each frame allocates a mix of buffers and images,
//! frees some older allocations, touches some live ones, and lets the oldest
//! be evicted when blocks fill up.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use suballoc_rs::{
    Allocation, AllocationContext, AllocationHandle, BlockMetadata, BlockStats, FitStrategy,
    LockedBlock, SuballocConfig, SuballocationType,
};

const BLOCK_SIZE: u64 = 256 * 1024;
const FRAME_IN_USE: u32 = 2;

fn random_type(rng: &mut StdRng) -> SuballocationType {
    match rng.gen_range(0..4) {
        0 => SuballocationType::UsedBuffer,
        1 => SuballocationType::UsedImageUnknown,
        2 => SuballocationType::UsedImageLinear,
        _ => SuballocationType::UsedImageOptimal,
    }
}

fn random_strategy(rng: &mut StdRng) -> FitStrategy {
    match rng.gen_range(0..4) {
        0 => FitStrategy::BestFit,
        1 => FitStrategy::FirstFit,
        2 => FitStrategy::WorstFit,
        _ => FitStrategy::MinOffset,
    }
}

fn run_workload(seed: u64, config: SuballocConfig) {
    let mut rng = StdRng::seed_from_u64(seed);
    let blocks: Vec<LockedBlock> = (0..3)
        .map(|_| LockedBlock::new(BlockMetadata::with_config(BLOCK_SIZE, config.clone()).unwrap()))
        .collect();
    let mut live: Vec<(usize, Arc<Allocation>)> = Vec::new();
    let mut placed_count = 0usize;

    for frame in 1..200u32 {
        for _ in 0..rng.gen_range(1..8) {
            let size = rng.gen_range(1..16 * 1024);
            let alignment = 1u64 << rng.gen_range(0..9u32);
            let ctx = AllocationContext::new(size, alignment, random_type(&mut rng))
                .with_granularity(1024)
                .with_strategy(random_strategy(&mut rng))
                .allow_eviction(frame, FRAME_IN_USE);
            let can_become_lost = rng.gen_bool(0.7);

            // Try every block before giving up, like a pool would.
            let placed = blocks.iter().enumerate().find_map(|(index, block)| {
                block
                    .allocate_default(&ctx, can_become_lost)
                    .unwrap()
                    .map(|handle| (index, handle))
            });
            if let Some((index, handle)) = placed {
                assert_eq!(handle.offset() % alignment, 0);
                live.push((index, handle));
                placed_count += 1;
            }
        }

        for _ in 0..rng.gen_range(0..4) {
            if live.is_empty() {
                break;
            }
            let (index, handle) = live.swap_remove(rng.gen_range(0..live.len()));
            if !handle.is_lost() {
                blocks[index].free(&handle).unwrap();
            }
        }

        for (_, handle) in &live {
            if rng.gen_bool(0.3) {
                handle.touch(frame);
            }
        }
        live.retain(|(_, handle)| !handle.is_lost());

        if frame % 50 == 0 {
            for block in &blocks {
                block.make_allocations_lost(frame, FRAME_IN_USE);
            }
            live.retain(|(_, handle)| !handle.is_lost());
        }

        for block in &blocks {
            block.validate().unwrap();
        }
    }

    let mut total = BlockStats::default();
    for block in &blocks {
        total.merge(&block.stats());
    }
    assert_eq!(total.block_count, 3);
    assert_eq!(total.allocation_count, live.len());
    assert_eq!(total.used_bytes + total.unused_bytes, 3 * BLOCK_SIZE);
    let live_bytes: u64 = live.iter().map(|(_, handle)| handle.size()).sum();
    assert_eq!(total.used_bytes, live_bytes);
    assert!(placed_count > 0);

    for (index, handle) in live.drain(..) {
        blocks[index].free(&handle).unwrap();
    }
    for block in &blocks {
        assert!(block.lock().is_empty());
    }
}

#[test]
fn test_seeded_workload_default_config() {
    run_workload(0x5eed, SuballocConfig::default());
}

#[test]
fn test_seeded_workload_with_debug_margin() {
    let config = SuballocConfig {
        debug_margin: 32,
        min_free_suballocation_size_to_register: 64,
        ..SuballocConfig::default()
    };
    run_workload(42, config);
}

#[test]
fn test_seeded_workload_several_seeds() {
    for seed in 1..6 {
        run_workload(seed, SuballocConfig::default());
    }
}
