//! Composable resilience stages.
//!
//! An [`Operation`] is a re-invocable async call. Each [`Stage`] wraps an
//! operation and returns a new one; [`compose`] applies stages in
//! [`StageKind`] order, so the stage applied last is the outermost wrapper.
//! Retry therefore re-enters the circuit breaker, the rate limiter and the
//! bulkhead on every attempt, and the timeout bounds all attempts together.

use super::bulkhead::Bulkhead;
use super::circuit_breaker::CircuitBreaker;
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use crate::error::RejectionKind;
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;

/// A call that can be invoked any number of times.
pub type Operation<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Wrap an async closure as an [`Operation`].
pub fn operation<T, F, Fut>(f: F) -> Operation<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Application order. Earlier kinds wrap the call first and end up innermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Bulkhead,
    RateLimiter,
    CircuitBreaker,
    Retry,
    Timeout,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Bulkhead => "bulkhead",
            StageKind::RateLimiter => "rate_limiter",
            StageKind::CircuitBreaker => "circuit_breaker",
            StageKind::Retry => "retry",
            StageKind::Timeout => "timeout",
        }
    }
}

pub trait Stage<T>: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Wrap `inner`. `provider` labels any rejection the stage raises.
    fn apply(self: Arc<Self>, provider: Arc<str>, inner: Operation<T>) -> Operation<T>;
}

/// Apply `stages` to `op` in [`StageKind`] order regardless of input order.
pub fn compose<T>(provider: &str, op: Operation<T>, mut stages: Vec<Arc<dyn Stage<T>>>) -> Operation<T> {
    stages.sort_by_key(|s| s.kind());
    let provider: Arc<str> = Arc::from(provider);
    stages
        .into_iter()
        .fold(op, |inner, stage| stage.apply(provider.clone(), inner))
}

impl<T: Send + 'static> Stage<T> for Bulkhead {
    fn kind(&self) -> StageKind {
        StageKind::Bulkhead
    }

    fn apply(self: Arc<Self>, provider: Arc<str>, inner: Operation<T>) -> Operation<T> {
        Arc::new(move || {
            let bulkhead = self.clone();
            let provider = provider.clone();
            let inner = inner.clone();
            async move {
                let _permit = bulkhead.try_enter(&provider)?;
                inner().await
            }
            .boxed()
        })
    }
}

impl<T: Send + 'static> Stage<T> for RateLimiter {
    fn kind(&self) -> StageKind {
        StageKind::RateLimiter
    }

    fn apply(self: Arc<Self>, provider: Arc<str>, inner: Operation<T>) -> Operation<T> {
        Arc::new(move || {
            let limiter = self.clone();
            let provider = provider.clone();
            let inner = inner.clone();
            async move {
                limiter.acquire(&provider).await?;
                inner().await
            }
            .boxed()
        })
    }
}

impl<T: Send + 'static> Stage<T> for CircuitBreaker {
    fn kind(&self) -> StageKind {
        StageKind::CircuitBreaker
    }

    fn apply(self: Arc<Self>, provider: Arc<str>, inner: Operation<T>) -> Operation<T> {
        Arc::new(move || {
            let breaker = self.clone();
            let provider = provider.clone();
            let inner = inner.clone();
            async move {
                let permit = breaker.acquire(&provider)?;
                let result = inner().await;
                match &result {
                    Ok(_) => permit.record_success(),
                    Err(err) if err.rejection().is_some() => permit.record_ignored(),
                    Err(_) => permit.record_failure(),
                }
                result
            }
            .boxed()
        })
    }
}

impl<T: Send + 'static> Stage<T> for RetryPolicy {
    fn kind(&self) -> StageKind {
        StageKind::Retry
    }

    fn apply(self: Arc<Self>, provider: Arc<str>, inner: Operation<T>) -> Operation<T> {
        Arc::new(move || {
            let policy = self.clone();
            let provider = provider.clone();
            let inner = inner.clone();
            async move { policy.run(&provider, || inner()).await }.boxed()
        })
    }
}

/// Upper bound on the wall-clock time of everything it wraps.
#[derive(Debug, Clone, Copy)]
pub struct Timeout(pub Duration);

impl<T: Send + 'static> Stage<T> for Timeout {
    fn kind(&self) -> StageKind {
        StageKind::Timeout
    }

    fn apply(self: Arc<Self>, provider: Arc<str>, inner: Operation<T>) -> Operation<T> {
        let limit = self.0;
        Arc::new(move || {
            let provider = provider.clone();
            let fut = inner();
            async move {
                match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            provider = %provider,
                            timeout_ms = limit.as_millis() as u64,
                            "provider call timed out"
                        );
                        Err(Error::rejected(provider.as_ref(), RejectionKind::TimedOut))
                    }
                }
            }
            .boxed()
        })
    }
}
