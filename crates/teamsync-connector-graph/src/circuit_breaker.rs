//! Circuit breaker guarding Graph calls during sustained throttling.
//!
//! Closed until `failure_threshold` throttled responses land inside
//! `failure_window`, then Open for `open_duration`, then HalfOpen for one
//! trial request.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    /// Requests allowed.
    Closed,
    /// Requests rejected immediately.
    Open,
    /// One trial request allowed.
    HalfOpen,
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "Closed",
            Self::Open => "Open",
            Self::HalfOpen => "HalfOpen",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed {
        failures: u32,
        window_start: Option<Instant>,
    },
    Open {
        since: Instant,
    },
    HalfOpen,
}

impl Phase {
    const fn closed() -> Self {
        Self::Closed {
            failures: 0,
            window_start: None,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    phase: Phase,
    failure_threshold: u32,
    failure_window: Duration,
    open_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, failure_window: Duration, open_duration: Duration) -> Self {
        Self {
            phase: Phase::closed(),
            failure_threshold,
            failure_window,
            open_duration,
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        match self.phase {
            Phase::Closed { .. } => CircuitBreakerState::Closed,
            Phase::Open { .. } => CircuitBreakerState::Open,
            Phase::HalfOpen => CircuitBreakerState::HalfOpen,
        }
    }

    /// Throttled responses counted in the current window.
    pub fn failure_count(&self) -> u32 {
        match self.phase {
            Phase::Closed { failures, .. } => failures,
            Phase::Open { .. } | Phase::HalfOpen => self.failure_threshold,
        }
    }

    /// Whether a request may be sent. An expired Open becomes HalfOpen.
    pub fn should_allow_request(&mut self) -> bool {
        let Phase::Open { since } = self.phase else {
            return true;
        };

        let elapsed = since.elapsed();
        if elapsed < self.open_duration {
            debug!(remaining = ?(self.open_duration - elapsed), "Circuit open, rejecting");
            return false;
        }

        self.enter(Phase::HalfOpen);
        true
    }

    pub fn record_failure(&mut self) {
        match self.phase {
            Phase::Closed {
                failures,
                window_start,
            } => {
                let now = Instant::now();
                let (failures, window_start) = match window_start {
                    Some(start) if now.duration_since(start) <= self.failure_window => {
                        (failures + 1, start)
                    }
                    _ => (1, now),
                };

                if failures >= self.failure_threshold {
                    warn!(failures, "Circuit breaker opened");
                    self.enter(Phase::Open { since: now });
                } else {
                    self.phase = Phase::Closed {
                        failures,
                        window_start: Some(window_start),
                    };
                }
            }
            Phase::HalfOpen => {
                warn!("Circuit breaker trial request failed, reopening");
                self.enter(Phase::Open {
                    since: Instant::now(),
                });
            }
            Phase::Open { .. } => {}
        }
    }

    pub fn record_success(&mut self) {
        match self.phase {
            Phase::Closed { .. } => self.phase = Phase::closed(),
            Phase::HalfOpen => {
                info!("Circuit breaker closed after successful trial request");
                self.enter(Phase::closed());
            }
            Phase::Open { .. } => {}
        }
    }

    fn enter(&mut self, phase: Phase) {
        let from = self.state();
        self.phase = phase;
        debug!(from = %from, to = %self.state(), "Circuit breaker transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, window_ms: u64, open_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            threshold,
            Duration::from_millis(window_ms),
            Duration::from_millis(open_ms),
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let mut cb = breaker(3, 60_000, 1_000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
        assert_eq!(cb.failure_count(), 2);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitBreakerState::Open);
        assert!(!cb.should_allow_request());
    }

    #[test]
    fn test_half_open_success_closes() {
        let mut cb = breaker(1, 60_000, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));

        assert!(cb.should_allow_request());
        assert_eq!(cb.state(), CircuitBreakerState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut cb = breaker(1, 60_000, 1);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.should_allow_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitBreakerState::Open);
    }

    #[test]
    fn test_window_expiry_restarts_count() {
        let mut cb = breaker(3, 10, 30_000);
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        cb.record_failure();
        assert_eq!(cb.failure_count(), 1);
        assert_eq!(cb.state(), CircuitBreakerState::Closed);
    }

    #[test]
    fn test_success_resets_count() {
        let mut cb = breaker(5, 60_000, 30_000);
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(CircuitBreakerState::HalfOpen.to_string(), "HalfOpen");
    }
}
