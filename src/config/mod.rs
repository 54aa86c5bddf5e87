//! Configuration models for the engine and its retry policy.

pub mod engine;

pub use engine::{EngineConfig, RetryConfig};
