//! Circuit breaker guarding the HTTP runtime
//!
//! After `threshold` consecutive failures the breaker opens and rejects calls
//! until `cooldown` has elapsed; the next call is then let through as a probe.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls allowed
    Closed,
    /// Calls rejected until the cooldown elapses
    Open,
    /// Cooldown elapsed; one probe allowed
    HalfOpen,
}

#[derive(Debug, Default)]
struct Tracker {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

/// Consecutive-failure circuit breaker
///
/// ```
/// use crew_agent::{CircuitBreaker, CircuitState};
///
/// let breaker = CircuitBreaker::new(2, 60);
/// breaker.record_failure();
/// breaker.record_failure();
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(!breaker.can_execute());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    tracker: Mutex<Tracker>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            tracker: Mutex::new(Tracker::default()),
            threshold: threshold.max(1),
            cooldown: Duration::from_secs(cooldown_secs),
        }
    }

    pub fn state(&self) -> CircuitState {
        let tracker = self.lock();
        if tracker.consecutive_failures < self.threshold {
            return CircuitState::Closed;
        }
        match tracker.last_failure {
            Some(at) if at.elapsed() < self.cooldown => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    pub fn can_execute(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn record_success(&self) {
        *self.lock() = Tracker::default();
    }

    pub fn record_failure(&self) {
        let mut tracker = self.lock();
        tracker.consecutive_failures = tracker.consecutive_failures.saturating_add(1);
        tracker.last_failure = Some(Instant::now());
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Time left before a probe is allowed; zero unless open
    pub fn time_until_retry(&self) -> Duration {
        if self.state() != CircuitState::Open {
            return Duration::ZERO;
        }
        self.lock()
            .last_failure
            .map(|at| self.cooldown.saturating_sub(at.elapsed()))
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracker> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, 60)
    }
}
