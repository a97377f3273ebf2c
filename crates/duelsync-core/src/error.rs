//! Error types for the synchronization core.
//!
//! Strongly-typed errors per layer: [`CallError`] for correlated calls,
//! [`ConnectionError`] for explicit connects, and [`HandlerError`] for event
//! subscribers. All of them are recoverable by the caller; link-level
//! exhaustion is reported as a status event instead of an error.

use std::time::Duration;

use thiserror::Error;

/// Failure of a correlated call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The link is not connected; nothing was sent.
    #[error("not connected")]
    NotConnected,

    /// The outbound message is missing a required field; nothing was sent.
    #[error("invalid parameters: {reason}")]
    InvalidParams {
        /// What is missing or malformed
        reason: String,
    },

    /// No matching reply arrived before the deadline.
    #[error("{label} timed out after {after:?}")]
    Timeout {
        /// Call kind
        label: &'static str,
        /// Configured timeout
        after: Duration,
    },

    /// The authority answered with a matching error event.
    #[error("rejected by remote: {message}")]
    RemoteRejected {
        /// Error text from the authority
        message: String,
    },

    /// The link went down while the call was in flight.
    #[error("connection lost while call was pending")]
    ConnectionLost,
}

impl CallError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Link problems and timeouts are transient. Invalid parameters and remote
    /// rejections are not: the same request will fail the same way.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Timeout { .. } | Self::ConnectionLost)
    }

    /// Returns true if the failure came from the link rather than the game.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionLost | Self::Timeout { .. })
    }

    /// Returns true if the failure is about the request or the game state.
    pub fn is_game_error(&self) -> bool {
        matches!(self, Self::InvalidParams { .. } | Self::RemoteRejected { .. })
    }
}

/// Failure of an explicit connect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The first attempt to open the transport failed.
    #[error("failed to connect: {reason}")]
    ConnectFailed {
        /// Transport error text
        reason: String,
    },
}

/// Error returned by an event handler.
///
/// The dispatcher logs it and continues with the remaining handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Create a handler error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_owned())
    }
}
