//! Builders to construct thread pools from code or configuration.

pub mod pool_builder;

pub use pool_builder::ThreadPoolBuilder;
