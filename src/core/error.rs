use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuballocError {
    #[error("Invalid block size: {0}")]
    InvalidBlockSize(u64),

    #[error("Invalid allocation context: {0}")]
    InvalidContext(String),

    #[error("Allocation not found in block")]
    AllocationNotFound,

    #[error("No allocation at offset {0}")]
    NoAllocationAtOffset(u64),

    #[error("Stale allocation request: computed at epoch {request}, block is at epoch {block}")]
    StaleRequest { request: u64, block: u64 },

    #[error("Allocation request still has {0} allocations to make lost")]
    RequestNotCommittable(usize),

    #[error("Allocation handle does not match request: {0}")]
    HandleMismatch(String),

    #[error("Block metadata corrupted: {0}")]
    Corrupted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SuballocError>;
