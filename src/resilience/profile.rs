use super::bulkhead::BulkheadConfig;
use super::circuit_breaker::CircuitBreakerConfig;
use super::rate_limiter::RateLimiterConfig;
use super::retry::RetryConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Resilience settings for one provider. An absent section disables that stage;
/// the timeout always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiter: Option<RateLimiterConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulkhead: Option<BulkheadConfig>,
    #[serde(
        rename = "timeout_ms",
        default = "default_timeout",
        with = "crate::resilience::millis"
    )]
    pub timeout: Duration,
}

impl Default for ResilienceProfile {
    fn default() -> Self {
        Self {
            circuit_breaker: None,
            retry: None,
            rate_limiter: None,
            bulkhead: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ResilienceProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuit_breaker(mut self, cfg: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(cfg);
        self
    }

    pub fn with_retry(mut self, cfg: RetryConfig) -> Self {
        self.retry = Some(cfg);
        self
    }

    pub fn with_rate_limiter(mut self, cfg: RateLimiterConfig) -> Self {
        self.rate_limiter = Some(cfg);
        self
    }

    pub fn with_bulkhead(mut self, cfg: BulkheadConfig) -> Self {
        self.bulkhead = Some(cfg);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject settings that would make a stage unusable. `scope` names the
    /// profile in error messages.
    pub fn validate(&self, scope: &str) -> Result<()> {
        let invalid = |field: &str, details: String| {
            Error::configuration_with_context(
                format!("invalid resilience setting for '{scope}'"),
                ErrorContext::new()
                    .with_field_path(format!("{scope}.{field}"))
                    .with_details(details)
                    .with_source("resilience_profile"),
            )
        };

        if self.timeout.is_zero() {
            return Err(invalid("timeout_ms", "must be greater than 0".into()));
        }
        if let Some(cb) = &self.circuit_breaker {
            if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
                return Err(invalid(
                    "circuit_breaker.failure_rate_threshold",
                    format!("expected (0, 100], got {}", cb.failure_rate_threshold),
                ));
            }
            if cb.sliding_window_size == 0 {
                return Err(invalid(
                    "circuit_breaker.sliding_window_size",
                    "must be greater than 0".into(),
                ));
            }
            if cb.permitted_calls_in_half_open == 0 {
                return Err(invalid(
                    "circuit_breaker.permitted_calls_in_half_open",
                    "must be greater than 0".into(),
                ));
            }
        }
        if let Some(retry) = &self.retry {
            if retry.max_attempts == 0 {
                return Err(invalid("retry.max_attempts", "must be at least 1".into()));
            }
        }
        if let Some(rl) = &self.rate_limiter {
            if rl.limit_for_period == 0 {
                return Err(invalid(
                    "rate_limiter.limit_for_period",
                    "must be greater than 0".into(),
                ));
            }
            if rl.limit_refresh_period.is_zero() {
                return Err(invalid(
                    "rate_limiter.limit_refresh_period_ms",
                    "must be greater than 0".into(),
                ));
            }
        }
        if let Some(bh) = &self.bulkhead {
            if bh.max_concurrent_calls == 0 {
                return Err(invalid(
                    "bulkhead.max_concurrent_calls",
                    "must be greater than 0".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_profile() {
        let yaml = r#"
circuit_breaker:
  failure_rate_threshold: 25
  sliding_window_size: 20
retry:
  max_attempts: 4
  wait_duration_ms: 100
timeout_ms: 2500
"#;
        let profile: ResilienceProfile = serde_yaml::from_str(yaml).unwrap();
        let cb = profile.circuit_breaker.as_ref().unwrap();
        assert_eq!(cb.failure_rate_threshold, 25.0);
        assert_eq!(cb.sliding_window_size, 20);
        assert_eq!(cb.wait_duration_in_open_state, Duration::from_secs(60));
        assert_eq!(profile.retry.as_ref().unwrap().wait_duration, Duration::from_millis(100));
        assert!(profile.rate_limiter.is_none());
        assert_eq!(profile.timeout, Duration::from_millis(2500));
        assert!(profile.validate("acme").is_ok());
    }

    #[test]
    fn test_timeout_defaults_to_thirty_seconds() {
        let profile: ResilienceProfile = serde_yaml::from_str("{}").unwrap();
        assert_eq!(profile.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let profile = ResilienceProfile::new()
            .with_circuit_breaker(CircuitBreakerConfig::new().with_sliding_window_size(0));
        let err = profile.validate("acme").unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(
            ctx.field_path.as_deref(),
            Some("acme.circuit_breaker.sliding_window_size")
        );
    }
}
