//! Suballocation types and granularity arithmetic
//!
//! Devices report a *buffer/image granularity*: linear resources (buffers,
//! linearly tiled images) and optimally tiled images must not share a page of
//! that size. Every occupied range is tagged with its resource class so the
//! placement search can keep incompatible neighbours on separate pages.

use serde::{Deserialize, Serialize};

/// What occupies a suballocation
///
/// The declaration order matters: `is_granularity_conflict` normalizes the
/// pair so the smaller variant comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SuballocationType {
    Free,
    UsedBuffer,
    UsedImageUnknown,
    UsedImageLinear,
    UsedImageOptimal,
}

impl SuballocationType {
    pub fn is_free(self) -> bool {
        self == SuballocationType::Free
    }

    /// Name used in the detailed JSON map
    pub fn name(self) -> &'static str {
        match self {
            SuballocationType::Free => "FREE",
            SuballocationType::UsedBuffer => "BUFFER",
            SuballocationType::UsedImageUnknown => "IMAGE_UNKNOWN",
            SuballocationType::UsedImageLinear => "IMAGE_LINEAR",
            SuballocationType::UsedImageOptimal => "IMAGE_OPTIMAL",
        }
    }
}

/// Whether two resource classes may not share a granularity page
///
/// - Buffers conflict with optimal and unknown-tiling images.
/// - Unknown-tiling images conflict with every image.
/// - Linear images conflict with optimal images.
/// - `Free` never conflicts.
pub fn is_granularity_conflict(a: SuballocationType, b: SuballocationType) -> bool {
    use SuballocationType::*;

    let (first, second) = if a > b { (b, a) } else { (a, b) };
    match first {
        Free => false,
        UsedBuffer => matches!(second, UsedImageUnknown | UsedImageOptimal),
        UsedImageUnknown => matches!(second, UsedImageUnknown | UsedImageLinear | UsedImageOptimal),
        UsedImageLinear => second == UsedImageOptimal,
        UsedImageOptimal => false,
    }
}

/// Round `value` up to a multiple of `alignment` (`alignment > 0`)
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);
    value.div_ceil(alignment) * alignment
}

/// Round `value` down to a multiple of `alignment` (`alignment > 0`)
#[inline]
pub fn align_down(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);
    value / alignment * alignment
}

/// Checks if the last byte of resource A and the first byte of resource B
/// fall on the same page.
///
/// Assumes `a_size > 0` and `a_offset + a_size <= b_offset`.
#[inline]
pub fn blocks_on_same_page(a_offset: u64, a_size: u64, b_offset: u64, page_size: u64) -> bool {
    debug_assert!(a_size > 0);
    debug_assert!(a_offset + a_size <= b_offset);
    debug_assert!(page_size > 0);

    let a_end_page = align_down(a_offset + a_size - 1, page_size);
    let b_start_page = align_down(b_offset, page_size);
    a_end_page == b_start_page
}
