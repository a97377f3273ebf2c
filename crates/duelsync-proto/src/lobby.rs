//! Payloads of the one-shot lobby RPC.
//!
//! Creating and joining a game happen over plain request/response calls before
//! the realtime link is opened. Both calls return a [`SessionTicket`] that
//! seeds the local session mirror.

use serde::{Deserialize, Serialize};

use crate::{ParticipantId, ProtoError, Seat, SessionId, SessionStatus};

/// Body of the create-session call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Creator's display name.
    #[serde(rename = "playerName")]
    pub participant_name: String,
}

impl CreateSessionRequest {
    /// Build a request, trimming the name and rejecting blank names.
    pub fn new(participant_name: &str) -> Result<Self, ProtoError> {
        Ok(Self { participant_name: display_name("create_session", participant_name)? })
    }
}

/// Body of the join-session call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    /// Session to join.
    pub session_id: SessionId,
    /// Token the creator shared out of band.
    pub join_token: String,
    /// Joiner's display name.
    #[serde(rename = "playerName")]
    pub participant_name: String,
}

impl JoinSessionRequest {
    /// Build a request, validating every field.
    pub fn new(
        session_id: SessionId,
        join_token: &str,
        participant_name: &str,
    ) -> Result<Self, ProtoError> {
        if session_id.is_blank() {
            return Err(ProtoError::missing("join_session", "sessionId"));
        }
        if join_token.trim().is_empty() {
            return Err(ProtoError::missing("join_session", "joinToken"));
        }
        Ok(Self {
            session_id,
            join_token: join_token.trim().to_owned(),
            participant_name: display_name("join_session", participant_name)?,
        })
    }
}

/// Result of a create or join call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTicket {
    /// Session id.
    #[serde(alias = "gameId")]
    pub session_id: SessionId,
    /// Initial board encoding.
    #[serde(alias = "fen")]
    pub board_encoding: String,
    /// Seat assigned to the caller.
    #[serde(alias = "creatorColor", alias = "opponentColor")]
    pub seat: Seat,
    /// Caller's participant id.
    #[serde(alias = "playerId")]
    pub participant_id: ParticipantId,
    /// Token the creator hands to the opponent. Absent for joiners.
    #[serde(default, alias = "opponentJoinId")]
    pub join_token: Option<String>,
    /// Session status at the time of the call.
    pub status: SessionStatus,
}

fn display_name(message: &'static str, name: &str) -> Result<String, ProtoError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProtoError::missing(message, "playerName"));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_name() {
        let request = CreateSessionRequest::new("  alice ").unwrap();
        assert_eq!(request.participant_name, "alice");
        assert!(CreateSessionRequest::new(" \t").is_err());
    }

    #[test]
    fn join_requires_token() {
        let err = JoinSessionRequest::new("s1".into(), "", "bob").unwrap_err();
        assert_eq!(err, ProtoError::MissingField { message: "join_session", field: "joinToken" });
    }

    #[test]
    fn ticket_decodes_original_create_response() {
        let text = r#"{"gameId":"g1","fen":"start","creatorColor":"white","playerId":"p1",
            "opponentJoinId":"tok","status":"waiting"}"#;
        let ticket: SessionTicket = serde_json::from_str(text).unwrap();

        assert_eq!(ticket.seat, Seat::First);
        assert_eq!(ticket.join_token.as_deref(), Some("tok"));
        assert_eq!(ticket.status, SessionStatus::Waiting);
    }

    #[test]
    fn ticket_decodes_original_join_response() {
        let text = r#"{"gameId":"g1","fen":"start","opponentColor":"black","playerId":"p2",
            "status":"active"}"#;
        let ticket: SessionTicket = serde_json::from_str(text).unwrap();

        assert_eq!(ticket.seat, Seat::Second);
        assert_eq!(ticket.join_token, None);
    }
}
