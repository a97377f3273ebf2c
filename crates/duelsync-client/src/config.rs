//! Driver configuration.

use std::time::Duration;

use duelsync_core::SyncConfig;

/// Default realtime endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3001/ws";

/// Default lobby endpoint.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3001";

/// Configuration of a [`SessionClient`](crate::SessionClient) and its
/// production transports.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Realtime endpoint URL.
    pub server_url: String,
    /// Lobby base URL.
    pub api_url: String,
    /// Upper bound for one transport open.
    pub connect_timeout: Duration,
    /// Core synchronization tuning.
    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
            connect_timeout: Duration::from_secs(5),
            sync: SyncConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for the given realtime endpoint, defaults elsewhere.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self { server_url: server_url.into(), ..Self::default() }
    }

    /// Replace the lobby base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Replace the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Replace the core synchronization tuning.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}
