//! 弹性模式模块：为每个数据供应商提供隔离舱、限流、熔断、重试与超时保护。
//!
//! # Resilience Module
//!
//! Every provider call runs through a fixed stack of guards so that one
//! unhealthy provider cannot degrade the others.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`bulkhead`] | Concurrency cap, rejects when full |
//! | [`rate_limiter`] | Permits per refresh period, rejects when exhausted |
//! | [`circuit_breaker`] | Sliding-window failure-rate breaker |
//! | [`retry`] | Re-invokes on provider errors only |
//! | [`stage`] | Stage trait, timeout stage and ordered composition |
//! | [`profile`] | Serializable per-provider settings |
//! | [`registry`] | Provider-scoped instances and `decorate` |
//!
//! ## Stage Order
//!
//! Stages are applied bulkhead, rate limiter, circuit breaker, retry, timeout.
//! The timeout is the outermost wrapper and bounds every retry attempt.
//!
//! A call cut off by the timeout records no outcome in the circuit breaker;
//! only its half-open trial slot, if it held one, is handed back. A provider
//! that always hangs therefore never opens its breaker. Every call to it
//! still fails with `TimedOut` after the configured timeout. Give such
//! providers a short `timeout_ms` and a bulkhead so hung calls cannot pile up.
//!
//! ```rust
//! use enrichment_router::resilience::{
//!     operation, ResilienceProfile, ResilienceRegistry, RetryConfig,
//! };
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> enrichment_router::Result<()> {
//! let registry = ResilienceRegistry::with_default(
//!     ResilienceProfile::new()
//!         .with_retry(RetryConfig::new().with_max_attempts(2))
//!         .with_timeout(Duration::from_secs(5)),
//! )?;
//! let call = registry.decorate("acme", operation(|| async { Ok(42) }));
//! assert_eq!(call().await?, 42);
//! # Ok(())
//! # }
//! ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod profile;
pub mod rate_limiter;
pub mod registry;
pub mod retry;
pub mod stage;

pub use bulkhead::{Bulkhead, BulkheadConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use profile::ResilienceProfile;
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use registry::{ResilienceRegistry, ResilienceSnapshot};
pub use retry::{RetryConfig, RetryPolicy};
pub use stage::{compose, operation, Operation, Stage, StageKind, Timeout};

/// Durations as integer milliseconds in config files.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
