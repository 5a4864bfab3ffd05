//! Exponential backoff for reconnection

use std::time::Duration;

use kf_core::config::BackoffConfig;

/// Exponential backoff keyed by attempt number
///
/// Attempt `n` (1-based) waits `initial * 2^(n-1)`, capped at `max`. The
/// attempt number is the record's retry count, so the schedule keeps growing
/// across repeated failures until a spawn succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay for the first attempt
    initial: Duration,
    /// Maximum delay
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max)
    }

    /// Create a new backoff with custom parameters
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before reconnect attempt `attempt` (attempt 0 is treated as 1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        std::cmp::min(self.initial.saturating_mul(factor), self.max)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let backoff = ExponentialBackoff::default();
        let delays: Vec<u64> = (1..=8)
            .map(|attempt| backoff.delay_for(attempt).as_millis() as u64)
            .collect();

        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn test_backoff_zero_attempt() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_huge_attempt_stays_capped() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.delay_for(40), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_custom() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(250));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(1));
    }
}
