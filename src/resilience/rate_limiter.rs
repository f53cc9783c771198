use crate::error::RejectionKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterSnapshot {
    pub limit_for_period: u32,
    pub refresh_period_ms: u64,
    pub available_permits: u32,
    /// Time until the current period ends (ms).
    pub next_refresh_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Permits granted per refresh period.
    pub limit_for_period: u32,
    #[serde(rename = "limit_refresh_period_ms", with = "crate::resilience::millis")]
    pub limit_refresh_period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 50,
            limit_refresh_period: Duration::from_secs(1),
        }
    }
}

impl RateLimiterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit_for_period(mut self, limit: u32) -> Self {
        self.limit_for_period = limit;
        self
    }

    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }
}

#[derive(Debug)]
struct State {
    permits: u32,
    period_start: Instant,
}

/// Fixed-window rate limiter.
///
/// - `limit_for_period` permits are handed out per refresh period
/// - A caller that finds no permit is rejected immediately, it never waits
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let state = Mutex::new(State {
            permits: cfg.limit_for_period,
            period_start: Instant::now(),
        });
        Self { cfg, state }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn refresh_locked(cfg: &RateLimiterConfig, st: &mut State) {
        let now = Instant::now();
        let period = cfg.limit_refresh_period;
        if period.is_zero() {
            st.permits = cfg.limit_for_period;
            st.period_start = now;
            return;
        }
        let elapsed = now.duration_since(st.period_start);
        if elapsed >= period {
            let periods = (elapsed.as_nanos() / period.as_nanos()) as u32;
            st.period_start += period * periods;
            st.permits = cfg.limit_for_period;
        }
    }

    /// Try to take one permit without waiting.
    pub async fn try_acquire(&self) -> bool {
        let mut st = self.state.lock().await;
        Self::refresh_locked(&self.cfg, &mut st);
        if st.permits > 0 {
            st.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Take one permit or fail with `RateLimited` for `provider`.
    pub async fn acquire(&self, provider: &str) -> Result<()> {
        if self.try_acquire().await {
            Ok(())
        } else {
            tracing::debug!(provider, "rate limit reached");
            Err(Error::rejected(provider, RejectionKind::RateLimited))
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.state.lock().await;
        Self::refresh_locked(&self.cfg, &mut st);
        let next_refresh = self
            .cfg
            .limit_refresh_period
            .saturating_sub(st.period_start.elapsed());
        RateLimiterSnapshot {
            limit_for_period: self.cfg.limit_for_period,
            refresh_period_ms: self.cfg.limit_refresh_period.as_millis() as u64,
            available_permits: st.permits,
            next_refresh_ms: next_refresh.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_builder() {
        let config = RateLimiterConfig::new()
            .with_limit_for_period(100)
            .with_refresh_period(Duration::from_millis(500));
        assert_eq!(config.limit_for_period, 100);
        assert_eq!(config.limit_refresh_period, Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_when_period_exhausted() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::new()
                .with_limit_for_period(3)
                .with_refresh_period(Duration::from_secs(60)),
        );

        tokio_test::block_on(async {
            for _ in 0..3 {
                tokio_test::assert_ok!(limiter.acquire("acme").await);
            }
            let err = tokio_test::assert_err!(limiter.acquire("acme").await);
            assert_eq!(err.rejection(), Some(RejectionKind::RateLimited));
        });
    }

    #[tokio::test]
    async fn test_permits_refresh_after_period() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::new()
                .with_limit_for_period(1)
                .with_refresh_period(Duration::from_millis(20)),
        );
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn test_rate_limiter_snapshot() {
        let limiter = RateLimiter::new(
            RateLimiterConfig::new()
                .with_limit_for_period(10)
                .with_refresh_period(Duration::from_secs(1)),
        );
        limiter.try_acquire().await;

        let snapshot = limiter.snapshot().await;
        assert_eq!(snapshot.limit_for_period, 10);
        assert_eq!(snapshot.available_permits, 9);
        assert!(snapshot.next_refresh_ms <= 1000);
    }
}
