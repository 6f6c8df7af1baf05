//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Half-width of the optimistic match window, in seconds.
const DEFAULT_MATCH_WINDOW_SECS: i64 = 5;

/// Reconnect attempts before the push stream is declared lost for good.
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// First reconnect delay; doubles per attempt.
const DEFAULT_RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Upper bound for the reconnect delay.
const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Tuning knobs for a [`SyncSession`](crate::session::SyncSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// A confirmed outbound message without a temp-id echo adopts a pending
    /// entry with equal content when their creation times differ by at most
    /// this many seconds.
    pub match_window_secs: i64,

    /// Reconnect attempts before giving up on the push stream.
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt.
    pub reconnect_initial_delay: Duration,

    /// Ceiling for the exponential reconnect delay.
    pub reconnect_max_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            match_window_secs: DEFAULT_MATCH_WINDOW_SECS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_initial_delay: DEFAULT_RECONNECT_INITIAL_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
        }
    }
}

impl SyncConfig {
    /// Match window as a time delta usable against message timestamps.
    pub fn match_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.match_window_secs)
    }
}
