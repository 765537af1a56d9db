//! Block metadata core

pub mod allocation;
pub mod allocator;
pub mod config;
pub mod error;
pub mod stats;
