use std::time::{Duration, Instant};

use thiserror::Error;

/// Default per-attempt retransmission timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of retransmissions of one packet
pub const DEFAULT_RETRIES: u32 = 5;
/// Shortest retransmission timeout accepted from users
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);
/// Longest retransmission timeout accepted from users
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// User-supplied timeout outside [`MIN_TIMEOUT`]..=[`MAX_TIMEOUT`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timeout must be between {min:?} and {max:?}, got {0:?}", min = MIN_TIMEOUT, max = MAX_TIMEOUT)]
pub struct InvalidTimeout(pub Duration);

/// Local retransmission settings of a transfer (never negotiated with the peer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// How long to wait for a reply before retransmitting
    pub timeout: Duration,
    /// How many times one packet is retransmitted before giving up
    pub retries: u32,
    /// How long a receiving session may go without any packet before it is dropped
    pub idle_timeout: Duration,
}

impl Options {
    /// Settings with `idle_timeout` covering every attempt, saturating at
    /// [`Duration::MAX`]
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            idle_timeout: timeout.saturating_mul(retries.saturating_add(1)),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Accept `timeout` if it lies within [`MIN_TIMEOUT`]..=[`MAX_TIMEOUT`]
    pub fn check_timeout(timeout: Duration) -> Result<Duration, InvalidTimeout> {
        if (MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout) {
            Ok(timeout)
        } else {
            Err(InvalidTimeout(timeout))
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_RETRIES)
    }
}

/// Instant `timeout` from now; waits too long to represent are capped at [`MAX_TIMEOUT`]
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(MAX_TIMEOUT))
        .unwrap_or(now)
}
