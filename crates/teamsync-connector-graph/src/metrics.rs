//! Request and throttling counters.

use serde::Serialize;

/// Counters kept by the rate limiter for one client handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitMetrics {
    /// Requests that completed with a success status.
    pub total_requests: u64,
    /// 429 responses received.
    pub rate_limited_count: u64,
    /// Retries after a 429.
    pub retry_count: u64,
    /// Retries after a 502/503/504.
    pub transient_retries: u64,
    /// Times the circuit breaker opened.
    pub circuit_opens: u64,
    /// Requests rejected while the circuit was open.
    pub circuit_rejects: u64,
    total_retry_delay_ms: u64,
}

impl RateLimitMetrics {
    pub fn increment_total_requests(&mut self) {
        self.total_requests += 1;
    }

    pub fn increment_rate_limited(&mut self) {
        self.rate_limited_count += 1;
    }

    pub fn increment_transient_retries(&mut self) {
        self.transient_retries += 1;
    }

    pub fn increment_circuit_opens(&mut self) {
        self.circuit_opens += 1;
    }

    pub fn increment_circuit_rejects(&mut self) {
        self.circuit_rejects += 1;
    }

    /// Records a completed 429 retry and the delay waited before it.
    pub fn record_retry(&mut self, delay_ms: u64) {
        self.retry_count += 1;
        self.total_retry_delay_ms += delay_ms;
    }

    /// Average wait before a 429 retry, in milliseconds.
    #[must_use]
    pub fn average_retry_delay_ms(&self) -> f64 {
        if self.retry_count == 0 {
            0.0
        } else {
            self.total_retry_delay_ms as f64 / self.retry_count as f64
        }
    }

    /// Throttled responses per successful request.
    #[must_use]
    pub fn rate_limit_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.rate_limited_count as f64 / self.total_requests as f64
        }
    }
}
