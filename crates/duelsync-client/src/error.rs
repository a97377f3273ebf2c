//! Driver-level errors.

use duelsync_core::{CallError, ConnectionError};
use thiserror::Error;

/// Errors surfaced by [`SessionClient`](crate::SessionClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Explicit connect failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A correlated call failed.
    #[error(transparent)]
    Call(#[from] CallError),
}

impl ClientError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Call(e) => e.is_transient(),
        }
    }

    /// The call error, if this is one.
    pub fn as_call(&self) -> Option<&CallError> {
        match self {
            Self::Call(e) => Some(e),
            Self::Connection(_) => None,
        }
    }
}
