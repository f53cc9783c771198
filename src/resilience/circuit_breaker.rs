use crate::error::RejectionKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_rate_threshold: f64,
    pub sliding_window_size: u32,
    /// Outcomes currently held in the window.
    pub buffered_calls: u32,
    pub failed_calls: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Percentage (0, 100] of failed calls in a full window that opens the breaker.
    pub failure_rate_threshold: f64,
    pub sliding_window_size: u32,
    #[serde(rename = "wait_duration_in_open_state_ms", with = "crate::resilience::millis")]
    pub wait_duration_in_open_state: Duration,
    pub permitted_calls_in_half_open: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            wait_duration_in_open_state: Duration::from_secs(60),
            permitted_calls_in_half_open: 3,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_rate_threshold(mut self, threshold: f64) -> Self {
        self.failure_rate_threshold = threshold;
        self
    }

    pub fn with_sliding_window_size(mut self, size: u32) -> Self {
        self.sliding_window_size = size;
        self
    }

    pub fn with_wait_duration(mut self, wait: Duration) -> Self {
        self.wait_duration_in_open_state = wait;
        self
    }

    pub fn with_permitted_calls_in_half_open(mut self, calls: u32) -> Self {
        self.permitted_calls_in_half_open = calls;
        self
    }
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    /// true = failure
    window: VecDeque<bool>,
    open_until: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
    /// Bumped on every transition into half-open.
    half_open_epoch: u64,
}

/// Count-based sliding-window circuit breaker.
///
/// - Closed: outcomes fill a window of `sliding_window_size` calls; once full,
///   a failure rate at or above the threshold opens the breaker
/// - Open: every call is rejected until the wait duration elapses
/// - Half-open: up to `permitted_calls_in_half_open` trial calls; any failure reopens,
///   that many successes close
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: std::sync::Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        let window = VecDeque::with_capacity(cfg.sliding_window_size as usize);
        Self {
            cfg,
            state: std::sync::Mutex::new(State {
                state: CircuitState::Closed,
                window,
                open_until: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
                half_open_epoch: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    /// Admit or reject a call. `provider` only labels the rejection.
    ///
    /// The caller must report the outcome through `on_success`, `on_failure`
    /// or `on_ignored`; [`CircuitBreaker::acquire`] does that on drop.
    pub fn allow(&self, provider: &str) -> Result<()> {
        self.admit(provider).map(|_| ())
    }

    /// Admit a call and hold the admission until an outcome is recorded.
    pub fn acquire(&self, provider: &str) -> Result<CallPermit<'_>> {
        let half_open_epoch = self.admit(provider)?;
        Ok(CallPermit {
            breaker: self,
            half_open_epoch,
            settled: false,
        })
    }

    /// Returns the half-open epoch when the call took a trial slot.
    fn admit(&self, provider: &str) -> Result<Option<u64>> {
        let mut st = self.state.lock().map_err(|_| {
            Error::configuration_with_context(
                "CircuitBreaker poisoned",
                crate::ErrorContext::new().with_source("circuit_breaker"),
            )
        })?;
        match st.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                let expired = st.open_until.map_or(true, |until| Instant::now() >= until);
                if !expired {
                    return Err(Error::rejected(provider, RejectionKind::CircuitOpen));
                }
                st.state = CircuitState::HalfOpen;
                st.open_until = None;
                st.half_open_in_flight = 1;
                st.half_open_successes = 0;
                st.half_open_epoch += 1;
                Ok(Some(st.half_open_epoch))
            }
            CircuitState::HalfOpen => {
                if st.half_open_in_flight >= self.cfg.permitted_calls_in_half_open.max(1) {
                    return Err(Error::rejected(provider, RejectionKind::CircuitOpen));
                }
                st.half_open_in_flight += 1;
                Ok(Some(st.half_open_epoch))
            }
        }
    }

    pub fn on_success(&self) {
        if let Ok(mut st) = self.state.lock() {
            match st.state {
                CircuitState::Closed => self.record_locked(&mut st, false),
                CircuitState::HalfOpen => {
                    st.half_open_successes += 1;
                    if st.half_open_successes >= self.cfg.permitted_calls_in_half_open.max(1) {
                        Self::close_locked(&mut st);
                    }
                }
                CircuitState::Open => {}
            }
        }
    }

    pub fn on_failure(&self) {
        if let Ok(mut st) = self.state.lock() {
            match st.state {
                CircuitState::Closed => self.record_locked(&mut st, true),
                CircuitState::HalfOpen => self.open_locked(&mut st),
                CircuitState::Open => {}
            }
        }
    }

    /// The call was admitted but refused further down (bulkhead, rate limiter).
    /// It counts as neither outcome; a half-open trial slot is handed back.
    pub fn on_ignored(&self) {
        if let Ok(mut st) = self.state.lock() {
            if st.state == CircuitState::HalfOpen {
                st.half_open_in_flight = st.half_open_in_flight.saturating_sub(1);
            }
        }
    }

    /// Hand back a trial slot taken in `epoch`, if that half-open period is
    /// still current.
    fn release(&self, epoch: u64) {
        if let Ok(mut st) = self.state.lock() {
            if st.state == CircuitState::HalfOpen && st.half_open_epoch == epoch {
                st.half_open_in_flight = st.half_open_in_flight.saturating_sub(1);
            }
        }
    }

    fn record_locked(&self, st: &mut State, failed: bool) {
        let size = self.cfg.sliding_window_size.max(1) as usize;
        if st.window.len() == size {
            st.window.pop_front();
        }
        st.window.push_back(failed);
        if st.window.len() < size {
            return;
        }
        let failures = st.window.iter().filter(|f| **f).count();
        let rate = failures as f64 * 100.0 / size as f64;
        if rate >= self.cfg.failure_rate_threshold {
            tracing::warn!(
                failure_rate = rate,
                threshold = self.cfg.failure_rate_threshold,
                "circuit breaker opened"
            );
            self.open_locked(st);
        }
    }

    fn open_locked(&self, st: &mut State) {
        st.state = CircuitState::Open;
        st.open_until = Some(Instant::now() + self.cfg.wait_duration_in_open_state);
        st.window.clear();
        st.half_open_in_flight = 0;
        st.half_open_successes = 0;
    }

    fn close_locked(st: &mut State) {
        st.state = CircuitState::Closed;
        st.open_until = None;
        st.window.clear();
        st.half_open_in_flight = 0;
        st.half_open_successes = 0;
    }

    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let (state, buffered_calls, failed_calls, open_remaining_ms) = match self.state.lock() {
            Ok(st) => (
                st.state,
                st.window.len() as u32,
                st.window.iter().filter(|f| **f).count() as u32,
                st.open_until
                    .filter(|until| *until > now)
                    .map(|until| (until - now).as_millis() as u64),
            ),
            Err(_) => (CircuitState::Closed, 0, 0, None),
        };
        CircuitBreakerSnapshot {
            state,
            failure_rate_threshold: self.cfg.failure_rate_threshold,
            sliding_window_size: self.cfg.sliding_window_size,
            buffered_calls,
            failed_calls,
            open_remaining_ms,
        }
    }
}

/// An admitted call. Dropping it without recording an outcome (the call
/// was cancelled or timed out) releases its half-open slot.
#[must_use = "dropping the permit records nothing"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    half_open_epoch: Option<u64>,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }

    /// Refused further down; counts as neither outcome.
    pub fn record_ignored(self) {}
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(epoch) = self.half_open_epoch {
            self.breaker.release(epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn breaker(window: u32, wait: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_failure_rate_threshold(50.0)
                .with_sliding_window_size(window)
                .with_wait_duration(wait)
                .with_permitted_calls_in_half_open(1),
        )
    }

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_rate_threshold, 50.0);
        assert_eq!(config.sliding_window_size, 10);
        assert_eq!(config.wait_duration_in_open_state, Duration::from_secs(60));
    }

    #[test]
    fn test_stays_closed_until_window_is_full() {
        let cb = breaker(4, Duration::from_secs(30));
        cb.on_failure();
        cb.on_failure();
        cb.on_failure();
        assert!(cb.allow("acme").is_ok());
        assert_eq!(cb.snapshot().failed_calls, 3);
    }

    #[test]
    fn test_opens_at_failure_rate() {
        let cb = breaker(4, Duration::from_secs(30));
        cb.on_success();
        cb.on_success();
        cb.on_failure();
        cb.on_failure();

        let err = cb.allow("acme").unwrap_err();
        assert_eq!(err.rejection(), Some(RejectionKind::CircuitOpen));
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.open_remaining_ms.is_some());
    }

    #[test]
    fn test_below_threshold_stays_closed() {
        let cb = breaker(4, Duration::from_secs(30));
        cb.on_success();
        cb.on_success();
        cb.on_success();
        cb.on_failure();
        assert!(cb.allow("acme").is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_trial_closes_on_success() {
        let cb = breaker(2, Duration::from_millis(30));
        cb.on_failure();
        cb.on_failure();
        assert!(cb.allow("acme").is_err());

        thread::sleep(Duration::from_millis(40));
        assert!(cb.allow("acme").is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // only one trial call allowed
        assert!(cb.allow("acme").is_err());

        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow("acme").is_ok());
    }

    #[test]
    fn test_half_open_trial_reopens_on_failure() {
        let cb = breaker(2, Duration::from_millis(30));
        cb.on_failure();
        cb.on_failure();
        thread::sleep(Duration::from_millis(40));
        assert!(cb.allow("acme").is_ok());
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_dropped_permit_frees_half_open_slot() {
        let cb = breaker(2, Duration::from_millis(30));
        cb.on_failure();
        cb.on_failure();
        thread::sleep(Duration::from_millis(40));

        let trial = cb.acquire("acme").unwrap();
        assert!(cb.acquire("acme").is_err());
        drop(trial);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.acquire("acme").unwrap().record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_permit_does_not_release_newer_trial() {
        let cb = breaker(2, Duration::from_millis(20));
        cb.on_failure();
        cb.on_failure();
        thread::sleep(Duration::from_millis(30));

        let stale = cb.acquire("acme").unwrap();
        // Reopened by another path, then half-open again.
        cb.on_failure();
        thread::sleep(Duration::from_millis(30));
        let current = cb.acquire("acme").unwrap();

        drop(stale);
        assert!(cb.acquire("acme").is_err());
        current.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_closed_permit_drop_records_nothing() {
        let cb = breaker(4, Duration::from_secs(30));
        drop(cb.acquire("acme").unwrap());
        assert_eq!(cb.snapshot().buffered_calls, 0);
    }

    #[test]
    fn test_circuit_breaker_thread_safe() {
        use std::sync::Arc;

        let cb = Arc::new(breaker(100, Duration::from_secs(30)));
        let mut handles = vec![];
        for _ in 0..10 {
            let cb_clone = Arc::clone(&cb);
            handles.push(thread::spawn(move || {
                for _ in 0..5 {
                    cb_clone.on_success();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cb.snapshot().buffered_calls, 50);
    }
}
