//! Interactive session loop.
//!
//! Races stdin against the client: each line is a move, while inbound events
//! and timers keep the session mirror current. Session and link changes are
//! logged as they are published.

use duelsync_client::{
    ClientConfig, ClientError, SessionClient, SystemEnv, Transport, WebSocketTransport,
};
use duelsync_core::{CallError, ConnectionChange, Environment, EventKind, Session};
use duelsync_proto::{Role, SessionTicket};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::error::CliError;

/// Connect, join the seeded session and play until it ends or stdin closes.
pub async fn run(
    config: &ClientConfig,
    ticket: &SessionTicket,
    role: Role,
    name: &str,
) -> Result<(), CliError> {
    let transport = WebSocketTransport::new(config.server_url.clone(), config.connect_timeout);
    let mut client = SessionClient::new(transport, SystemEnv::new(), config.sync);
    client.seed(ticket, role, name);
    watch(&client);

    client.connect().await?;
    let joined = client.join_current().await?;
    info!(
        session = %joined.session_id,
        seat = %joined.seat_assignment,
        opponent = joined.opponent_name.as_deref().unwrap_or("-"),
        "joined room"
    );

    let result = interact(&mut client).await;
    client.leave_session().await;
    client.shutdown().await;
    result
}

async fn interact<T, E>(client: &mut SessionClient<T, E>) -> Result<(), CliError>
where
    T: Transport,
    E: Environment,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if client.session().status.is_terminal() {
            info!("session over");
            return Ok(());
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    return Ok(());
                };
                match line.trim() {
                    "" => {},
                    "/leave" => return Ok(()),
                    played => submit(client, played).await?,
                }
            },
            wakeup = client.wait() => {
                let Some(wakeup) = wakeup else {
                    warn!("link is down for good");
                    return Ok(());
                };
                client.handle(wakeup).await?;
            },
        }
    }
}

async fn submit<T, E>(client: &mut SessionClient<T, E>, played: &str) -> Result<(), CliError>
where
    T: Transport,
    E: Environment,
{
    if !client.session().is_local_turn() {
        warn!(played_move = played, "not your turn");
        return Ok(());
    }

    match client.submit_move(played).await {
        Ok(update) => {
            info!(played_move = played, board = %update.board_encoding, "move accepted");
            Ok(())
        },
        Err(ClientError::Call(CallError::RemoteRejected { message })) => {
            warn!(played_move = played, %message, "move rejected");
            Ok(())
        },
        Err(e) if e.is_transient() => {
            warn!(played_move = played, error = %e, "move not confirmed, try again");
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

fn watch<T, E>(client: &SessionClient<T, E>)
where
    T: Transport,
    E: Environment,
{
    client.subscribe(EventKind::SessionChanged, |event| {
        if let Some(session) = event.as_session() {
            log_session(session);
        }
        Ok(())
    });

    client.subscribe(EventKind::ConnectionChanged, |event| {
        match event.as_connection() {
            Some(ConnectionChange::Connected { reconnected: true }) => info!("link restored"),
            Some(ConnectionChange::Dropped { reason }) => warn!(%reason, "link dropped"),
            Some(ConnectionChange::Reconnecting { attempt }) => info!(attempt, "reconnecting"),
            Some(ConnectionChange::ReconnectFailed) => error!("gave up reconnecting"),
            _ => {},
        }
        Ok(())
    });

    for kind in [EventKind::ParticipantDisconnected, EventKind::ParticipantReconnected] {
        client.subscribe(kind, move |_| {
            info!(%kind, "opponent presence changed");
            Ok(())
        });
    }
}

fn log_session(session: &Session) {
    info!(
        status = %session.status,
        your_turn = session.is_local_turn(),
        last_move = session.last_move.as_deref().unwrap_or("-"),
        moves = session.move_log.len(),
        in_check = session.in_check,
        "session"
    );
    if let Some(reason) = &session.end_reason {
        info!(winner = ?session.winner, %reason, "game over");
    }
    if let Some(message) = &session.last_error {
        warn!(%message, "authority reported an error");
    }
}
