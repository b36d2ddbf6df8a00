// =============================================================================
// CircuitBreaker — per-provider failure tracking
// =============================================================================
//
// CLOSED -> OPEN on failure_threshold consecutive failures. OPEN rejects
// every call until open_timeout elapses, then allows exactly one probe in
// HALF_OPEN. A HALF_OPEN success resets to CLOSED; a HALF_OPEN failure
// reopens with a refreshed timestamp.
// =============================================================================

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::BreakerState;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// Set when `allow_request` has just handed out the single HALF_OPEN
    /// probe, so a second concurrent caller doesn't also slip through.
    probe_in_flight: bool,
}

/// Per-provider circuit breaker. Owned exclusively by [`crate::fallback_fetcher::FallbackFetcher`].
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => !inner.probe_in_flight,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.open_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.last_failure_at = Some(Instant::now());
            }
            BreakerState::Closed | BreakerState::Open => {
                inner.consecutive_failures += 1;
                inner.last_failure_at = Some(Instant::now());
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                }
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            open_timeout: timeout,
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker(3, Duration::from_secs(60));
        assert_eq!(cb.state(), BreakerState::Closed);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn half_open_probe_then_recovers() {
        let cb = breaker(1, Duration::from_millis(20));
        cb.record_failure();
        assert!(!cb.allow_request());
        sleep(Duration::from_millis(30));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        // A second concurrent caller does not get a probe too.
        assert!(!cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), BreakerState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(10));
        cb.record_failure();
        sleep(Duration::from_millis(15));
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), BreakerState::Open);
        assert!(!cb.allow_request());
    }
}
