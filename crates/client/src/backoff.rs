//! Exponential-backoff schedule for WebSocket reconnection.
//!
//! After an unclean closure the channel retries with increasing delays:
//! the wait before attempt `n` is `base_interval * 2^(n-1)`, and no
//! more than [`ReconnectPolicy::max_attempts`] attempts are made before
//! the channel gives up until the next explicit `connect`.

use std::time::Duration;

/// Tunable parameters for the reconnection schedule.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt.
    pub base_interval: Duration,
    /// Attempts made per unclean closure before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay scheduled before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_interval.saturating_mul(factor)
    }
}
