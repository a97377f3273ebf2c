//! HTTP client for the lobby RPC.
//!
//! Creating and joining a game are one-shot calls made before the realtime
//! link exists. Their [`SessionTicket`] seeds the session store.

use duelsync_proto::{
    CreateSessionRequest, JoinSessionRequest, ProtoError, SessionId, SessionTicket,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Lobby call failures.
#[derive(Debug, Error)]
pub enum LobbyError {
    /// Request rejected locally before sending.
    #[error(transparent)]
    Invalid(#[from] ProtoError),

    /// Network or decoding failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The lobby answered with a non-success status.
    #[error("lobby rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

/// Lobby RPC client.
#[derive(Debug, Clone)]
pub struct LobbyClient {
    http: reqwest::Client,
    base_url: String,
}

impl LobbyClient {
    /// Client for the lobby at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    /// Create a new session as its initiator.
    ///
    /// # Errors
    ///
    /// [`LobbyError::Invalid`] for a blank name, otherwise HTTP failures.
    pub async fn create_session(
        &self,
        participant_name: &str,
    ) -> Result<SessionTicket, LobbyError> {
        let body = CreateSessionRequest::new(participant_name)?;
        let ticket = self.post("/api/game/new", &body).await?;
        info!(session = %ticket.session_id, seat = %ticket.seat, "session created");
        Ok(ticket)
    }

    /// Join an existing session with a shared token.
    ///
    /// # Errors
    ///
    /// [`LobbyError::Invalid`] for blank fields, otherwise HTTP failures.
    pub async fn join_session(
        &self,
        session_id: SessionId,
        join_token: &str,
        participant_name: &str,
    ) -> Result<SessionTicket, LobbyError> {
        let body = JoinSessionRequest::new(session_id, join_token, participant_name)?;
        let ticket = self.post("/api/game/join", &body).await?;
        info!(session = %ticket.session_id, seat = %ticket.seat, "session joined");
        Ok(ticket)
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<SessionTicket, LobbyError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        debug!(%url, "lobby request");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LobbyError::Rejected { status: status.as_u16(), message });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_name_fails_before_any_request() {
        let lobby = LobbyClient::new("http://127.0.0.1:9");

        let err = lobby.create_session("   ").await.unwrap_err();

        assert!(matches!(err, LobbyError::Invalid(ProtoError::MissingField { .. })));
    }
}
