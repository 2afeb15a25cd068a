//! Tunable behaviour of the append and checkpoint paths.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry for appends that lose the compare-and-swap race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.  Must be at least 1.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 5,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles each time,
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// When the checkpoint service seals a new segment on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointPolicy {
    /// Seal once this many entries have accumulated past the last checkpoint.
    pub interval_entries: u64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            interval_entries: 100,
        }
    }
}
