//! Distributed task queue: HTTP submission, Redis-backed queues, a worker
//! pool, and a retry scheduler.

pub mod http;
pub mod metrics;
pub mod platform;
pub mod rate_limiting;
pub mod retry;
pub mod worker;

pub use platform::config::PlatformConfig;
pub use platform::context::PlatformContext;
pub use platform::runtime::{Platform, PlatformRuntime};
