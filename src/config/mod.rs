//! Configuration models for thread pools.

pub mod pool;

pub use pool::{default_max_workers, ThreadPoolConfig};
