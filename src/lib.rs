//! # Gatehouse
//!
//! A bounded resource and cache management engine for concurrent in-process
//! workloads.
//!
//! Gatehouse governs how a limited number of expensive resources (pooled
//! objects, outbound calls, cached values) are shared safely across
//! concurrent callers. It composes four components:
//!
//! - **[`core::BoundedCache`]**: fixed-capacity key/value store with
//!   least-recently-used eviction and per-entry expiry.
//! - **[`core::ResourcePool`]**: a bounded set of reusable,
//!   expensive-to-construct objects with an explicit acquire/release
//!   lifecycle.
//! - **[`core::ConcurrencyLimiter`]**: a counting admission gate that bounds
//!   how many operations run simultaneously, queueing excess callers in FIFO
//!   order.
//! - **[`core::Runner`]**: checks the cache, acquires a concurrency slot and
//!   optionally a pooled resource, executes a fallible operation with
//!   retry/backoff, and populates the cache on success.
//!
//! ## Control flow
//!
//! A caller asks the [`core::Runner`] to produce a value for a key. On a
//! cache hit the value is returned immediately with no permit or resource
//! consumed. On a miss the runner acquires a permit (suspending the caller
//! when the limiter is saturated, or failing fast with `Overloaded` when the
//! wait queue is full), optionally checks a resource out of the pool, invokes
//! the supplied operation, retries transient failures with capped exponential
//! backoff and jitter, stores the result with a time-to-live, and releases
//! everything it acquired.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gatehouse::builders::build_engine;
//! use gatehouse::config::EngineConfig;
//! use gatehouse::core::{NoopFactory, RunOptions};
//!
//! let cfg = EngineConfig::default();
//! let runner = build_engine::<String, String, NoopFactory>(&cfg, None)?;
//! let value = runner
//!     .run("user:42".to_string(), &fetch_user, RunOptions::default())
//!     .await?;
//! ```
//!
//! All components are explicitly constructed and injected; there is no global
//! state. Lifecycle (construction, pool drain) is explicit and testable.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core engine components: cache, pool, limiter, runner, and errors.
pub mod core;
/// Configuration models for the engine and its retry policy.
pub mod config;
/// Builders to construct an engine stack from configuration.
pub mod builders;
/// Shared utilities: cancellation, clock, telemetry.
pub mod util;
