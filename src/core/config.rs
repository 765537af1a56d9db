//! Environment constants for block metadata
//!
//! These are the knobs the owning pool layer hands to every block it creates.
//! They can be built in code or loaded from a TOML file:
//!
//! ```toml
//! min_free_suballocation_size_to_register = 16
//! debug_margin = 0
//! debug_min_buffer_image_granularity = 1
//! lost_allocation_cost = 1048576
//! allocation_try_count = 32
//! ```

use crate::error::{Result, SuballocError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Free ranges smaller than this are not tracked by the free-size index.
pub const DEFAULT_MIN_FREE_SUBALLOCATION_SIZE_TO_REGISTER: u64 = 16;

/// Weight of a single evicted allocation in the eviction cost, in bytes.
pub const DEFAULT_LOST_ALLOCATION_COST: u64 = 1024 * 1024; // 1MB

/// Number of request/commit attempts `LockedBlock` makes before giving up.
pub const DEFAULT_ALLOCATION_TRY_COUNT: u32 = 32;

/// Configuration shared by every block of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SuballocConfig {
    /// Free entries at least this large are registered in the free-size index
    #[validate(range(min = 1))]
    pub min_free_suballocation_size_to_register: u64,

    /// Bytes of padding kept free before and after every allocation
    pub debug_margin: u64,

    /// Floor applied to the device's buffer/image granularity
    #[validate(range(min = 1))]
    pub debug_min_buffer_image_granularity: u64,

    /// Per-item weight used when ranking eviction candidates
    pub lost_allocation_cost: u64,

    /// Bounded retries after an eviction commit is aborted
    #[validate(range(min = 1, max = 1024))]
    pub allocation_try_count: u32,
}

impl Default for SuballocConfig {
    fn default() -> Self {
        SuballocConfig {
            min_free_suballocation_size_to_register:
                DEFAULT_MIN_FREE_SUBALLOCATION_SIZE_TO_REGISTER,
            debug_margin: 0,
            debug_min_buffer_image_granularity: 1,
            lost_allocation_cost: DEFAULT_LOST_ALLOCATION_COST,
            allocation_try_count: DEFAULT_ALLOCATION_TRY_COUNT,
        }
    }
}

impl SuballocConfig {
    /// Parse and validate a TOML document
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SuballocConfig = toml::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Run the field constraints
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| SuballocError::Config(e.to_string()))
    }

    /// Granularity actually used for conflict checks
    pub fn effective_granularity(&self, buffer_image_granularity: u64) -> u64 {
        buffer_image_granularity.max(self.debug_min_buffer_image_granularity)
    }
}
