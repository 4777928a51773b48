// --- File: crates/slotsync_realtime/src/backoff.rs ---
//! Exponential reconnect backoff with a bounded number of attempts.

use slotsync_config::RealtimeConfig;
use std::time::Duration;

/// Multiplier applied to the delay after every scheduled attempt.
pub const BACKOFF_MULTIPLIER: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl From<&RealtimeConfig> for BackoffPolicy {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            base: Duration::from_millis(config.reconnect_base_ms),
            max: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

/// Attempt counter and the delay the next scheduled attempt will wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    policy: BackoffPolicy,
    attempts: u32,
    delay: Duration,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            delay: policy.base,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.policy);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Advance to the next attempt, doubling the delay for the one after.
    ///
    /// Returns the delay to wait *before* this attempt, `None` once exhausted.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let current = self.delay;
        self.attempts += 1;
        self.delay = current
            .saturating_mul(BACKOFF_MULTIPLIER)
            .min(self.policy.max);
        Some(current)
    }
}
