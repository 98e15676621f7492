// src/destination/mod.rs
//! Destination-side collaborators: the live watermark lookup and an in-process
//! destination that applies the operation stream.

pub mod memory;
pub mod snowflake;

pub use memory::{drain_into, DrainSummary, MemoryDestination};
pub use snowflake::SnowflakeWatermarkStore;
