use enrichment_router::error::RejectionKind;
use enrichment_router::resilience::{
    operation, BulkheadConfig, RateLimiterConfig, ResilienceProfile, ResilienceRegistry,
    RetryConfig,
};
use enrichment_router::{Error, FailureCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn registry(profiles: Vec<(&str, ResilienceProfile)>) -> ResilienceRegistry {
    ResilienceRegistry::new(
        profiles
            .into_iter()
            .map(|(n, p)| (n.to_string(), p))
            .collect::<HashMap<_, _>>(),
        ResilienceProfile::default(),
    )
    .expect("valid profiles")
}

fn flaky(calls: Arc<AtomicUsize>, fail_first: usize) -> enrichment_router::resilience::Operation<u32> {
    operation(move || {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < fail_first {
                Err(Error::provider("flaky", format!("attempt {n} failed")))
            } else {
                Ok(n as u32)
            }
        }
    })
}

fn slow(calls: Arc<AtomicUsize>, delay: Duration) -> enrichment_router::resilience::Operation<u32> {
    operation(move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(7)
        }
    })
}

#[tokio::test]
async fn test_retry_recovers_from_transient_errors() {
    let reg = registry(vec![(
        "flaky",
        ResilienceProfile::new().with_retry(
            RetryConfig::new()
                .with_max_attempts(3)
                .with_wait_duration(Duration::from_millis(1)),
        ),
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let op = reg.decorate("flaky", flaky(calls.clone(), 2));
    assert_eq!(op().await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_exhaustion_is_a_rejection() {
    let reg = registry(vec![(
        "flaky",
        ResilienceProfile::new().with_retry(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_wait_duration(Duration::from_millis(1)),
        ),
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let err = reg.decorate("flaky", flaky(calls.clone(), 10))().await.unwrap_err();
    assert_eq!(err.rejection(), Some(RejectionKind::RetriesExhausted));
    assert_eq!(err.failure_code(), FailureCode::RetriesExhausted);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_rejection_is_not_retried() {
    let reg = registry(vec![(
        "limited",
        ResilienceProfile::new()
            .with_rate_limiter(
                RateLimiterConfig::new()
                    .with_limit_for_period(1)
                    .with_refresh_period(Duration::from_secs(60)),
            )
            .with_retry(
                RetryConfig::new()
                    .with_max_attempts(3)
                    .with_wait_duration(Duration::from_millis(1)),
            ),
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let op = reg.decorate("limited", flaky(calls.clone(), 0));
    assert!(op().await.is_ok());

    let err = op().await.unwrap_err();
    assert_eq!(err.rejection(), Some(RejectionKind::RateLimited));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bulkhead_isolates_one_provider() {
    let reg = registry(vec![(
        "narrow",
        ResilienceProfile::new().with_bulkhead(BulkheadConfig::new(1)),
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let narrow = reg.decorate("narrow", slow(calls.clone(), Duration::from_millis(100)));
    let wide = reg.decorate("other", slow(calls.clone(), Duration::from_millis(100)));

    let (a, b, c, d) = tokio::join!(narrow(), narrow(), wide(), wide());
    let narrow_results = [a, b];
    let rejected = narrow_results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.rejection() == Some(RejectionKind::BulkheadFull)))
        .count();
    assert_eq!(rejected, 1);
    assert!(c.is_ok() && d.is_ok(), "default profile has no bulkhead");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_timeout_bounds_every_retry() {
    let reg = registry(vec![(
        "sluggish",
        ResilienceProfile::new()
            .with_retry(
                RetryConfig::new()
                    .with_max_attempts(5)
                    .with_wait_duration(Duration::from_millis(40)),
            )
            .with_timeout(Duration::from_millis(100)),
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let started = std::time::Instant::now();
    let err = reg.decorate("sluggish", flaky(calls.clone(), 100))().await.unwrap_err();
    assert_eq!(err.rejection(), Some(RejectionKind::TimedOut));
    assert!(calls.load(Ordering::SeqCst) < 5);
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_request_timeout_overrides_profile() {
    let reg = registry(vec![(
        "patient",
        ResilienceProfile::new().with_timeout(Duration::from_secs(5)),
    )]);
    let calls = Arc::new(AtomicUsize::new(0));
    let op = slow(calls.clone(), Duration::from_millis(200));

    let err = reg
        .decorate_with_timeout("patient", op.clone(), Some(Duration::from_millis(20)))()
        .await
        .unwrap_err();
    assert_eq!(err.failure_code(), FailureCode::TimedOut);

    let ok = reg.decorate_with_timeout("patient", op, None)().await;
    assert_eq!(ok.unwrap(), 7);
}

#[tokio::test]
async fn test_snapshot_reports_dedicated_and_default() {
    let reg = registry(vec![(
        "narrow",
        ResilienceProfile::new()
            .with_bulkhead(BulkheadConfig::new(2))
            .with_timeout(Duration::from_millis(1500)),
    )]);
    assert!(reg.has_provider_config("narrow"));
    assert!(!reg.has_provider_config("other"));

    let snap = reg.snapshot("narrow").await;
    assert!(snap.dedicated);
    assert_eq!(snap.timeout_ms, 1500);
    assert!(snap.bulkhead.is_some());
    assert!(snap.circuit_breaker.is_none());

    let snap = reg.snapshot("other").await;
    assert!(!snap.dedicated);
    assert_eq!(snap.timeout_ms, 30_000);
}
