//! Shared utilities: cancellation, clock, telemetry.

pub mod cancel;
pub mod clock;
pub mod telemetry;

pub use cancel::CancelToken;
pub use clock::now_ms;
pub use telemetry::init_tracing;
