//! CLI errors.

use duelsync_client::{ClientError, LobbyError};
use thiserror::Error;

/// Anything that ends the CLI early.
#[derive(Debug, Error)]
pub enum CliError {
    /// Create or join call failed.
    #[error("lobby: {0}")]
    Lobby(#[from] LobbyError),

    /// Connecting or joining the realtime room failed.
    #[error("session: {0}")]
    Client(#[from] ClientError),

    /// Reading stdin failed.
    #[error("stdin: {0}")]
    Io(#[from] std::io::Error),
}
