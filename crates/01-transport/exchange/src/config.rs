use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time a submitter waits for the consumer to commit.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Default idle back-off for polling consumers.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Tunables shared by the session and the consumers that poll it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Upper bound on a single submission, in milliseconds.
    pub timeout_ms: u64,
    /// How long a polling consumer idles after an empty fetch, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ExchangeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
