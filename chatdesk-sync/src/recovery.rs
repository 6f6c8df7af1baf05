//! Reconnect policy for the push stream.
//!
//! When the live stream drops, the session retries with exponential backoff
//! and, once the stream is back, backfills missed messages through the
//! paginator's dedup path.

use std::time::Duration;

use crate::config::SyncConfig;

/// Exponential backoff state for one subscription.
#[derive(Debug, Clone)]
pub struct StreamBackoff {
    attempt: u32,
    max_attempts: u32,
    delay: Duration,
    initial_delay: Duration,
    max_delay: Duration,
}

impl StreamBackoff {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_reconnect_attempts,
            delay: config.reconnect_initial_delay,
            initial_delay: config.reconnect_initial_delay,
            max_delay: config.reconnect_max_delay,
        }
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Called after a successful (re)connect: the next drop starts over.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.delay = self.initial_delay;
    }

    /// Delay before the next attempt, doubling up to the ceiling. `None`
    /// once the attempts are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay;
        self.attempt += 1;
        self.delay = std::cmp::min(self.delay * 2, self.max_delay);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig {
            max_reconnect_attempts: 4,
            reconnect_initial_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(10),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_delays_double_to_ceiling() {
        let mut backoff = StreamBackoff::from_config(&config());
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(8)));
        // capped, not 16
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(10)));
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_reset_restores_attempts() {
        let mut backoff = StreamBackoff::from_config(&config());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
    }
}
