//! Retry policy
//!
//! Re-invokes the wrapped call when it fails with a provider error. Gate
//! rejections and timeouts pass straight through.

use crate::error::RejectionKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    #[serde(rename = "wait_duration_ms", with = "crate::resilience::millis")]
    pub wait_duration: Duration,
    /// Double the wait after every failed attempt.
    pub exponential_backoff: bool,
    #[serde(rename = "max_wait_duration_ms", with = "crate::resilience::millis")]
    pub max_wait_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_duration: Duration::from_millis(500),
            exponential_backoff: false,
            max_wait_duration: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_wait_duration(mut self, wait: Duration) -> Self {
        self.wait_duration = wait;
        self
    }

    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }
}

pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Wait before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.wait_duration;
        }
        let base = self.config.wait_duration.as_millis() as u64;
        let cap = self.config.max_wait_duration.as_millis() as u64;
        let shift = attempt.saturating_sub(1).min(32);
        Duration::from_millis(base.saturating_mul(1u64 << shift).min(cap))
    }

    /// Decide whether a failed attempt is retried, and after how long.
    pub fn should_retry(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if attempt >= self.config.max_attempts || !error.is_retryable() {
            return None;
        }
        Some(self.backoff(attempt))
    }

    /// Final error once attempts run out. A single-attempt policy surfaces the
    /// original error; otherwise the caller sees `RetriesExhausted`.
    pub fn exhausted(&self, provider: &str, attempt: u32, last: Error) -> Error {
        if attempt < 2 || !last.is_retryable() {
            return last;
        }
        tracing::warn!(provider, attempts = attempt, error = %last, "retries exhausted");
        Error::Rejected {
            provider: provider.to_string(),
            kind: RejectionKind::RetriesExhausted,
            last_error: Some(last.to_string()),
        }
    }

    /// Drive `call` until it succeeds or the policy gives up.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) => match self.should_retry(attempt, &err) {
                    Some(wait) => {
                        tracing::debug!(provider, attempt, wait_ms = wait.as_millis() as u64, error = %err, "retrying provider call");
                        if !wait.is_zero() {
                            tokio::time::sleep(wait).await;
                        }
                        attempt += 1;
                    }
                    None => return Err(self.exhausted(provider, attempt, err)),
                },
            }
        }
    }
}
