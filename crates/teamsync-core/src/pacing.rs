//! Pacing and retry policy.
//!
//! The engine issues calls sequentially and relies on these delays as its only
//! rate control against the remote service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delays and attempt bounds applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingPolicy {
    /// Maximum channel create attempts (default: 3).
    #[serde(default = "default_max_create_attempts")]
    pub max_create_attempts: u32,
    /// Wait after a create collision before refreshing the listing (default: 5000ms).
    #[serde(default = "default_collision_cooldown_ms")]
    pub collision_cooldown_ms: u64,
    /// Wait after every mutation (default: 200ms).
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Wait after every batch (default: 2000ms).
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Wait after channel creation before membership stages (default: 10000ms).
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,
}

fn default_max_create_attempts() -> u32 {
    3
}

fn default_collision_cooldown_ms() -> u64 {
    5_000
}

fn default_item_delay_ms() -> u64 {
    200
}

fn default_batch_delay_ms() -> u64 {
    2_000
}

fn default_propagation_delay_ms() -> u64 {
    10_000
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            max_create_attempts: default_max_create_attempts(),
            collision_cooldown_ms: default_collision_cooldown_ms(),
            item_delay_ms: default_item_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            propagation_delay_ms: default_propagation_delay_ms(),
        }
    }
}

impl PacingPolicy {
    /// A policy with no delays, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            max_create_attempts: default_max_create_attempts(),
            collision_cooldown_ms: 0,
            item_delay_ms: 0,
            batch_delay_ms: 0,
            propagation_delay_ms: 0,
        }
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_create_attempts == 0 {
            return Err("max_create_attempts must be > 0".to_string());
        }
        Ok(())
    }

    pub fn collision_cooldown(&self) -> Duration {
        Duration::from_millis(self.collision_cooldown_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }
}

/// Sleeps for `delay`, skipping the timer entirely for zero.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
