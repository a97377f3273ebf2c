//! Synchronization tuning.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;

/// Default deadline for correlated calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a [`SessionSync`](crate::SessionSync).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Reconnection backoff.
    pub reconnect: ReconnectPolicy,
    /// Deadline for join and move calls.
    pub call_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { reconnect: ReconnectPolicy::default(), call_timeout: DEFAULT_CALL_TIMEOUT }
    }
}

impl SyncConfig {
    /// Replace the reconnection policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Replace the call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}
