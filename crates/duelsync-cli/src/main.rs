//! duelsync terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Create a game and wait for an opponent
//! duelsync create --name alice
//!
//! # Join it from another terminal with the logged session id and token
//! duelsync join --session <id> --token <token> --name bob
//! ```
//!
//! Each line on stdin is submitted as a move. `/leave` leaves the game.

mod error;
mod play;

use std::time::Duration;

use clap::{Parser, Subcommand};
use duelsync_client::{
    ClientConfig, LobbyClient,
    config::{DEFAULT_API_URL, DEFAULT_SERVER_URL},
};
use duelsync_core::{ReconnectPolicy, SyncConfig};
use duelsync_proto::{Role, SessionId};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;

/// duelsync terminal client
#[derive(Parser, Debug)]
#[command(name = "duelsync")]
#[command(about = "Create or join a two-player game and play it from the terminal")]
#[command(version)]
struct Args {
    /// Realtime endpoint
    #[arg(long, env = "DUELSYNC_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Lobby base URL
    #[arg(long, env = "DUELSYNC_API", default_value = DEFAULT_API_URL)]
    api: String,

    /// Transport connect timeout in milliseconds
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    /// Call timeout in milliseconds
    #[arg(long, default_value = "10000")]
    call_timeout_ms: u64,

    /// Reconnection attempts before giving up
    #[arg(long, default_value = "5")]
    max_reconnects: u32,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new game
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,
    },
    /// Join an existing game
    Join {
        /// Session id shared by the creator
        #[arg(short, long)]
        session: String,

        /// Join token shared by the creator
        #[arg(short, long)]
        token: String,

        /// Display name
        #[arg(short, long)]
        name: String,
    },
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let reconnect =
            ReconnectPolicy { max_attempts: self.max_reconnects, ..ReconnectPolicy::default() };
        let sync = SyncConfig::default()
            .with_reconnect(reconnect)
            .with_call_timeout(Duration::from_millis(self.call_timeout_ms));

        ClientConfig::new(self.server.clone())
            .with_api_url(self.api.clone())
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_sync(sync)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.client_config();
    let lobby = LobbyClient::new(config.api_url.clone());

    let (ticket, role, name) = match args.command {
        Command::Create { name } => {
            let ticket = lobby.create_session(&name).await?;
            if let Some(token) = &ticket.join_token {
                tracing::info!(
                    session = %ticket.session_id,
                    join_token = %token,
                    "game created, share the session id and token with your opponent"
                );
            }
            (ticket, Role::Initiator, name)
        },
        Command::Join { session, token, name } => {
            let ticket = lobby.join_session(SessionId::new(session), &token, &name).await?;
            (ticket, Role::Joiner, name)
        },
    };

    play::run(&config, &ticket, role, name.trim()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_flow_into_client_config() {
        let args = Args::try_parse_from([
            "duelsync",
            "--server",
            "ws://example.test/ws",
            "--call-timeout-ms",
            "2500",
            "--max-reconnects",
            "2",
            "join",
            "--session",
            "g1",
            "--token",
            "t0k",
            "--name",
            "bob",
        ])
        .unwrap();

        let config = args.client_config();

        assert_eq!(config.server_url, "ws://example.test/ws");
        assert_eq!(config.sync.call_timeout, Duration::from_millis(2500));
        assert_eq!(config.sync.reconnect.max_attempts, 2);
        assert!(matches!(args.command, Command::Join { ref session, .. } if session == "g1"));
    }

    #[test]
    fn create_requires_a_name() {
        assert!(Args::try_parse_from(["duelsync", "create"]).is_err());
    }
}
