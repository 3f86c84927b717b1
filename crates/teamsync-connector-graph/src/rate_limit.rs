//! Throttling for Microsoft Graph requests.
//!
//! Honors `Retry-After`, falls back to exponential backoff with jitter, and
//! trips a circuit breaker when throttling persists. One limiter is shared by
//! every request of a [`GraphClient`](crate::GraphClient).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerState};
use crate::metrics::RateLimitMetrics;
use crate::GraphError;

/// Configuration for rate limit handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Backoff for the first retry in milliseconds (default: 1000ms).
    pub base_delay_ms: u64,
    /// Upper bound on any single wait, including `Retry-After` (default: 5 minutes).
    pub max_delay_ms: u64,
    /// Extra random delay as a fraction of the wait (default: 0.25).
    pub jitter_factor: f64,
    /// Retries of a 429 before giving up (default: 10).
    pub max_retries: u32,
    /// Retries of a 502/503/504 before giving up (default: 5).
    pub max_transient_retries: u32,
    /// 429s inside the window that open the circuit (default: 10).
    pub circuit_failure_threshold: u32,
    pub circuit_failure_window_secs: u64,
    /// How long an open circuit rejects requests (default: 30s).
    pub circuit_open_duration_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 300_000,
            jitter_factor: 0.25,
            max_retries: 10,
            max_transient_retries: 5,
            circuit_failure_threshold: 10,
            circuit_failure_window_secs: 300,
            circuit_open_duration_secs: 30,
        }
    }
}

impl RateLimitConfig {
    /// Millisecond delays and low retry counts for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 100,
            jitter_factor: 0.25,
            max_retries: 3,
            max_transient_retries: 2,
            circuit_failure_threshold: 3,
            circuit_failure_window_secs: 60,
            circuit_open_duration_secs: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("rate_limit.base_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("rate_limit.max_delay_ms must be >= base_delay_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("rate_limit.jitter_factor must be within [0.0, 1.0]".to_string());
        }
        if self.circuit_failure_threshold == 0 {
            return Err("rate_limit.circuit_failure_threshold must be > 0".to_string());
        }
        Ok(())
    }

    /// Exponential delay for retry number `attempt` (0-based), capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// `delay` plus up to `jitter_factor` of itself.
    #[must_use]
    pub fn with_jitter(&self, delay: Duration) -> Duration {
        let range_ms = (delay.as_millis() as f64 * self.jitter_factor) as u64;
        if range_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=range_ms))
    }

    /// Wait for a 429: the server's `Retry-After` when present, else backoff.
    fn throttle_delay(&self, retry_after_secs: Option<u64>, attempt: u32) -> Duration {
        let Some(secs) = retry_after_secs else {
            return self.backoff(attempt);
        };
        let requested = Duration::from_secs(secs);
        let cap = Duration::from_millis(self.max_delay_ms);
        if requested > cap {
            warn!(retry_after = secs, cap = ?cap, "Retry-After exceeds max delay, capping");
            return cap;
        }
        requested
    }
}

/// Parses a `Retry-After` value given in seconds. HTTP-date values yield
/// `None` and the caller falls back to backoff.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

#[derive(Debug)]
struct LimiterState {
    breaker: CircuitBreaker,
    /// 429s since the last success.
    consecutive_throttles: u32,
    metrics: RateLimitMetrics,
}

/// Shared throttling state for one Graph client.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self, String> {
        config.validate()?;

        let breaker = CircuitBreaker::new(
            config.circuit_failure_threshold,
            Duration::from_secs(config.circuit_failure_window_secs),
            Duration::from_secs(config.circuit_open_duration_secs),
        );

        Ok(Self {
            config,
            state: Mutex::new(LimiterState {
                breaker,
                consecutive_throttles: 0,
                metrics: RateLimitMetrics::default(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Fails fast with `CircuitOpen` while the breaker is open.
    pub async fn admit(&self) -> Result<(), GraphError> {
        let mut state = self.state.lock().await;
        if state.breaker.should_allow_request() {
            return Ok(());
        }
        state.metrics.increment_circuit_rejects();
        Err(GraphError::CircuitOpen)
    }

    /// Records a 429 and sleeps before the caller's next attempt.
    ///
    /// `attempt` counts the 429s already seen for this request. Fails with
    /// `CircuitOpen` when this response opens the breaker, or with
    /// `MaxRetriesExceeded` once `max_retries` is reached.
    pub async fn on_throttled(
        &self,
        retry_after: Option<&str>,
        attempt: u32,
    ) -> Result<(), GraphError> {
        let retry_after_secs = retry_after.and_then(parse_retry_after);
        {
            let mut state = self.state.lock().await;
            state.consecutive_throttles += 1;
            state.metrics.increment_rate_limited();

            state.breaker.record_failure();
            if state.breaker.state() == CircuitBreakerState::Open {
                state.metrics.increment_circuit_opens();
                return Err(GraphError::CircuitOpen);
            }
        }

        if attempt >= self.config.max_retries {
            return Err(GraphError::MaxRetriesExceeded { attempts: attempt });
        }

        let delay = self
            .config
            .with_jitter(self.config.throttle_delay(retry_after_secs, attempt));
        info!(delay = ?delay, attempt, "Throttled by Graph, waiting");
        tokio::time::sleep(delay).await;

        self.state
            .lock()
            .await
            .metrics
            .record_retry(delay.as_millis() as u64);
        Ok(())
    }

    /// Sleeps before retrying a 502/503/504 response.
    pub async fn wait_for_transient(&self, attempt: u32) {
        let delay = self.config.with_jitter(self.config.backoff(attempt));
        debug!(delay = ?delay, attempt, "Transient error, backing off");
        self.state.lock().await.metrics.increment_transient_retries();
        tokio::time::sleep(delay).await;
    }

    /// Records a successful response.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_throttles = 0;
        state.breaker.record_success();
        state.metrics.increment_total_requests();
    }

    /// Whether the most recent response was a 429.
    pub async fn is_throttled(&self) -> bool {
        self.state.lock().await.consecutive_throttles > 0
    }

    pub async fn circuit_state(&self) -> CircuitBreakerState {
        self.state.lock().await.breaker.state()
    }

    /// Snapshot of the counters.
    pub async fn metrics(&self) -> RateLimitMetrics {
        self.state.lock().await.metrics.clone()
    }
}
