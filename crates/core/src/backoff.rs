//! Bounded reconnection backoff
//!
//! Exponential growth capped at a maximum delay, with optional jitter
//! and a hard attempt budget. Exhausting the budget is an explicit
//! terminal signal: the caller parks and waits for a manual reconnect
//! instead of retrying forever.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Backoff schedule for relay reconnection attempts
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
    jitter: bool,
}

impl BackoffPolicy {
    /// Build a policy from validated configuration
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            max_attempts: config.max_attempts,
            jitter: config.jitter,
        }
    }

    /// Get delay for a specific attempt number (0-indexed)
    ///
    /// Returns `None` once the attempt budget is spent; the caller must
    /// stop retrying and surface the exhaustion.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let raw_ms = (self.base_delay.as_millis() as f64) * self.multiplier.powi(attempt as i32);
        let capped = Duration::from_millis(raw_ms as u64).min(self.max_delay);

        if !self.jitter {
            return Some(capped);
        }

        // Half-jitter: uniform in [capped/2, capped], so consecutive
        // clients don't reconnect in lockstep while the delay stays
        // within its configured bound.
        let capped_ms = capped.as_millis() as u64;
        let floor = capped_ms / 2;
        let jittered = rand::thread_rng().gen_range(floor..=capped_ms.max(floor));
        Some(Duration::from_millis(jittered))
    }

    /// Maximum number of attempts before exhaustion
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(&BackoffConfig::default())
    }
}
