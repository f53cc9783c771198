//! 标准失败码：为每一类调用失败定义稳定的代码与名称，便于指标与观测。
//!
//! Standard failure codes.
//!
//! Every failure surfaced by a decorated provider call maps to exactly one code,
//! so that metrics and logs can tell an admission rejection apart from a provider
//! that answered with an error.
//!
//! ## Code Categories
//!
//! | Prefix | Category   | Description                                   |
//! |--------|------------|-----------------------------------------------|
//! | E1xxx  | admission  | Rejected by a resilience gate before/around the call |
//! | E2xxx  | provider   | The provider itself failed                    |
//! | E3xxx  | routing    | No provider could be selected                 |
//! | E9xxx  | unknown    | Catch-all / unclassified                      |
//!
//! ## Example
//!
//! ```rust
//! use enrichment_router::error_code::FailureCode;
//!
//! let code = FailureCode::from_name("circuit_open");
//! assert_eq!(code.code(), "E1003");
//! assert!(code.is_rejection());
//! assert_eq!(code.category(), "admission");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard failure code attached to failed enrichment hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// E1001: Bulkhead has no free concurrent-call permit
    BulkheadFull,
    /// E1002: Rate limiter has no permit left in the current period
    RateLimited,
    /// E1003: Circuit breaker is open (or half-open with no trial slot)
    CircuitOpen,
    /// E1004: Every retry attempt failed
    RetriesExhausted,
    /// E1005: The decorated pipeline did not finish in time
    TimedOut,
    /// E2001: The provider call returned an error
    ProviderError,
    /// E3001: No provider matches the requested type/tenant
    NotFound,
    /// E9999: Could not be classified
    Unknown,
}

impl FailureCode {
    /// Returns the canonical code string (e.g., `"E1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BulkheadFull => "E1001",
            Self::RateLimited => "E1002",
            Self::CircuitOpen => "E1003",
            Self::RetriesExhausted => "E1004",
            Self::TimedOut => "E1005",
            Self::ProviderError => "E2001",
            Self::NotFound => "E3001",
            Self::Unknown => "E9999",
        }
    }

    /// Returns the standard name (e.g., `"bulkhead_full"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BulkheadFull => "bulkhead_full",
            Self::RateLimited => "rate_limited",
            Self::CircuitOpen => "circuit_open",
            Self::RetriesExhausted => "retries_exhausted",
            Self::TimedOut => "timed_out",
            Self::ProviderError => "provider_error",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the failure was produced by a resilience gate rather than the provider.
    #[inline]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::BulkheadFull
                | Self::RateLimited
                | Self::CircuitOpen
                | Self::RetriesExhausted
                | Self::TimedOut
        )
    }

    /// Returns the category: `"admission"`, `"provider"`, `"routing"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::BulkheadFull
            | Self::RateLimited
            | Self::CircuitOpen
            | Self::RetriesExhausted
            | Self::TimedOut => "admission",
            Self::ProviderError => "provider",
            Self::NotFound => "routing",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a standard name back to its code. Unknown names map to `FailureCode::Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bulkhead_full" => Self::BulkheadFull,
            "rate_limited" => Self::RateLimited,
            "circuit_open" => Self::CircuitOpen,
            "retries_exhausted" => Self::RetriesExhausted,
            "timed_out" | "timeout" => Self::TimedOut,
            "provider_error" => Self::ProviderError,
            "not_found" => Self::NotFound,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
