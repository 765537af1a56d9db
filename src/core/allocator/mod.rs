//! Suballocation of a single memory block
//!
//! A block is tiled by an offset-ordered run of suballocations:
//! - `list` / `arena`: doubly linked list with stable node ids
//! - `free_index`: size-sorted index over the larger free ranges
//! - `request`: placement contexts and computed requests
//! - `metadata`: search, commit, eviction and validation
//! - `locked`: mutex wrapper that keeps the eviction protocol atomic

pub mod arena;
pub mod free_index;
pub mod list;
pub mod locked;
pub mod metadata;
pub mod request;
pub mod suballocation;

pub use list::Suballocation;
pub use locked::LockedBlock;
pub use metadata::BlockMetadata;
pub use request::{AllocationContext, AllocationRequest, FitStrategy};
pub use suballocation::SuballocationType;
