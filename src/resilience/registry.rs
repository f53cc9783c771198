use super::bulkhead::{Bulkhead, BulkheadSnapshot};
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot};
use super::profile::ResilienceProfile;
use super::rate_limiter::{RateLimiter, RateLimiterSnapshot};
use super::retry::RetryPolicy;
use super::stage::{compose, Operation, Stage, Timeout};
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Live stage instances built from one profile.
struct ProviderInstances {
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<Arc<RetryPolicy>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    bulkhead: Option<Arc<Bulkhead>>,
    timeout: Duration,
}

impl ProviderInstances {
    fn from_profile(profile: &ResilienceProfile) -> Self {
        Self {
            circuit_breaker: profile
                .circuit_breaker
                .clone()
                .map(|c| Arc::new(CircuitBreaker::new(c))),
            retry: profile.retry.clone().map(|c| Arc::new(RetryPolicy::new(c))),
            rate_limiter: profile
                .rate_limiter
                .clone()
                .map(|c| Arc::new(RateLimiter::new(c))),
            bulkhead: profile.bulkhead.clone().map(|c| Arc::new(Bulkhead::new(c))),
            timeout: profile.timeout,
        }
    }

    fn stages<T: Send + 'static>(&self, timeout: Duration) -> Vec<Arc<dyn Stage<T>>> {
        let mut stages: Vec<Arc<dyn Stage<T>>> = Vec::with_capacity(5);
        if let Some(b) = &self.bulkhead {
            stages.push(b.clone());
        }
        if let Some(r) = &self.rate_limiter {
            stages.push(r.clone());
        }
        if let Some(c) = &self.circuit_breaker {
            stages.push(c.clone());
        }
        if let Some(r) = &self.retry {
            stages.push(r.clone());
        }
        stages.push(Arc::new(Timeout(timeout)));
        stages
    }
}

/// Point-in-time view of one provider's resilience state.
#[derive(Debug, Clone, Serialize)]
pub struct ResilienceSnapshot {
    pub provider: String,
    /// false when the provider runs on the shared default instances.
    pub dedicated: bool,
    pub timeout_ms: u64,
    pub circuit_breaker: Option<CircuitBreakerSnapshot>,
    pub rate_limiter: Option<RateLimiterSnapshot>,
    pub bulkhead: Option<BulkheadSnapshot>,
    pub retry_max_attempts: Option<u32>,
}

/// Provider-scoped resilience instances.
///
/// Instances are built once and shared by every call to the same provider.
/// Providers without a profile of their own share a single default set, so
/// their breaker, limiter and bulkhead state is pooled.
pub struct ResilienceRegistry {
    providers: HashMap<String, ProviderInstances>,
    default: ProviderInstances,
}

impl ResilienceRegistry {
    pub fn new(
        profiles: HashMap<String, ResilienceProfile>,
        default: ResilienceProfile,
    ) -> Result<Self> {
        default.validate("default")?;
        let mut providers = HashMap::with_capacity(profiles.len());
        for (name, profile) in profiles {
            profile.validate(&name)?;
            info!(
                provider = %name,
                circuit_breaker = profile.circuit_breaker.is_some(),
                retry = profile.retry.is_some(),
                rate_limiter = profile.rate_limiter.is_some(),
                bulkhead = profile.bulkhead.is_some(),
                timeout_ms = profile.timeout.as_millis() as u64,
                "registered resilience profile"
            );
            providers.insert(name, ProviderInstances::from_profile(&profile));
        }
        info!(
            providers = providers.len(),
            "initialized resilience registry"
        );
        Ok(Self {
            providers,
            default: ProviderInstances::from_profile(&default),
        })
    }

    /// Registry where every provider uses `default`.
    pub fn with_default(default: ResilienceProfile) -> Result<Self> {
        Self::new(HashMap::new(), default)
    }

    pub fn has_provider_config(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    fn instances(&self, provider: &str) -> &ProviderInstances {
        match self.providers.get(provider) {
            Some(instances) => instances,
            None => {
                debug!(provider, "no dedicated resilience profile, using default");
                &self.default
            }
        }
    }

    /// Wrap `op` with the provider's stages.
    pub fn decorate<T: Send + 'static>(&self, provider: &str, op: Operation<T>) -> Operation<T> {
        self.decorate_with_timeout(provider, op, None)
    }

    /// Same as [`decorate`](Self::decorate); `timeout_override` replaces the
    /// profile timeout for this operation only.
    pub fn decorate_with_timeout<T: Send + 'static>(
        &self,
        provider: &str,
        op: Operation<T>,
        timeout_override: Option<Duration>,
    ) -> Operation<T> {
        let instances = self.instances(provider);
        let timeout = timeout_override.unwrap_or(instances.timeout);
        compose(provider, op, instances.stages(timeout))
    }

    pub async fn snapshot(&self, provider: &str) -> ResilienceSnapshot {
        let dedicated = self.has_provider_config(provider);
        let instances = self.providers.get(provider).unwrap_or(&self.default);
        let rate_limiter = match &instances.rate_limiter {
            Some(rl) => Some(rl.snapshot().await),
            None => None,
        };
        ResilienceSnapshot {
            provider: provider.to_string(),
            dedicated,
            timeout_ms: instances.timeout.as_millis() as u64,
            circuit_breaker: instances.circuit_breaker.as_ref().map(|cb| cb.snapshot()),
            rate_limiter,
            bulkhead: instances.bulkhead.as_ref().map(|b| b.snapshot()),
            retry_max_attempts: instances.retry.as_ref().map(|r| r.config().max_attempts),
        }
    }
}

impl Default for ResilienceRegistry {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default: ProviderInstances::from_profile(&ResilienceProfile::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionKind;
    use crate::resilience::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use crate::resilience::rate_limiter::RateLimiterConfig;
    use crate::resilience::stage::operation;
    use crate::Error;

    #[tokio::test]
    async fn test_unconfigured_provider_uses_default() {
        let registry = ResilienceRegistry::with_default(
            ResilienceProfile::new().with_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        assert!(!registry.has_provider_config("acme"));

        let slow = operation(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("too late")
        });
        let err = registry.decorate("acme", slow)().await.unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionKind::TimedOut));
        assert!(!registry.snapshot("acme").await.dedicated);
    }

    #[tokio::test]
    async fn test_timeout_override_replaces_profile_timeout() {
        let registry = ResilienceRegistry::with_default(
            ResilienceProfile::new().with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        let slow = operation(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        });
        let err = registry
            .decorate_with_timeout("acme", slow, Some(Duration::from_millis(10)))()
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionKind::TimedOut));
    }

    #[tokio::test]
    async fn test_providers_do_not_share_dedicated_state() {
        let limited = ResilienceProfile::new().with_rate_limiter(
            RateLimiterConfig::new()
                .with_limit_for_period(1)
                .with_refresh_period(Duration::from_secs(60)),
        );
        let mut profiles = HashMap::new();
        profiles.insert("a".to_string(), limited.clone());
        profiles.insert("b".to_string(), limited);
        let registry = ResilienceRegistry::new(profiles, ResilienceProfile::default()).unwrap();

        let ok = || operation(|| async { Ok(()) });
        assert!(registry.decorate("a", ok())().await.is_ok());
        let err = registry.decorate("a", ok())().await.unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionKind::RateLimited));
        assert!(registry.decorate("b", ok())().await.is_ok());
    }

    #[tokio::test]
    async fn test_breaker_opens_across_decorations() {
        let mut profiles = HashMap::new();
        profiles.insert(
            "flaky".to_string(),
            ResilienceProfile::new().with_circuit_breaker(
                CircuitBreakerConfig::new()
                    .with_sliding_window_size(2)
                    .with_failure_rate_threshold(50.0),
            ),
        );
        let registry = ResilienceRegistry::new(profiles, ResilienceProfile::default()).unwrap();
        let failing = || operation(|| async { Err::<(), _>(Error::provider("flaky", "boom")) });

        for _ in 0..2 {
            let err = registry.decorate("flaky", failing())().await.unwrap_err();
            assert!(err.rejection().is_none());
        }
        let err = registry.decorate("flaky", failing())().await.unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionKind::CircuitOpen));

        let snapshot = registry.snapshot("flaky").await;
        assert!(snapshot.dedicated);
        assert_eq!(snapshot.circuit_breaker.unwrap().state, CircuitState::Open);
    }

    #[test]
    fn test_invalid_profile_is_a_startup_error() {
        let mut profiles = HashMap::new();
        profiles.insert(
            "acme".to_string(),
            ResilienceProfile::new().with_timeout(Duration::ZERO),
        );
        assert!(ResilienceRegistry::new(profiles, ResilienceProfile::default()).is_err());
    }
}
