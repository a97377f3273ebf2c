//! Async driver for duelsync.
//!
//! Executes the Sans-IO core against real I/O:
//!
//! - [`SessionClient`]: drives a `SessionSync` over any [`Transport`].
//! - [`SystemEnv`]: system clock and tokio timers.
//! - `WebSocketTransport` and `LobbyClient` (feature `transport`): the
//!   production realtime link and the HTTP lobby RPC.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
pub mod config;
pub mod error;
mod system_env;
pub mod transport;

#[cfg(feature = "transport")]
pub mod lobby;
#[cfg(feature = "transport")]
pub mod websocket;

pub use client::{SessionClient, Step, Wakeup};
pub use config::ClientConfig;
pub use error::ClientError;
#[cfg(feature = "transport")]
pub use lobby::{LobbyClient, LobbyError};
pub use system_env::SystemEnv;
pub use transport::{Transport, TransportEvent};
#[cfg(feature = "transport")]
pub use websocket::{WebSocketError, WebSocketTransport};
