//! Intents the client sends to the remote authority.

use serde::{Deserialize, Serialize};

use crate::{ParticipantId, ProtoError, RequestId, SessionId};

/// Outbound intents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundMessage {
    /// Take this client's seat in a session room.
    #[serde(rename = "join_game")]
    JoinSession(JoinSession),

    /// Submit a move.
    #[serde(rename = "make_move")]
    SubmitMove(SubmitMove),

    /// Leave a session room. Fire-and-forget.
    #[serde(rename = "leave_game")]
    LeaveSession(LeaveSession),
}

impl OutboundMessage {
    /// Check that every required field is present and non-blank.
    pub fn validate(&self) -> Result<(), ProtoError> {
        match self {
            Self::JoinSession(join) => {
                if join.session_id.is_blank() {
                    return Err(ProtoError::missing("join_game", "sessionId"));
                }
                if join.participant_id.is_blank() {
                    return Err(ProtoError::missing("join_game", "participantId"));
                }
                Ok(())
            },
            Self::SubmitMove(submit) => {
                if submit.session_id.is_blank() {
                    return Err(ProtoError::missing("make_move", "sessionId"));
                }
                if submit.participant_id.is_blank() {
                    return Err(ProtoError::missing("make_move", "participantId"));
                }
                if submit.played_move.trim().is_empty() {
                    return Err(ProtoError::missing("make_move", "move"));
                }
                Ok(())
            },
            Self::LeaveSession(leave) => {
                if leave.session_id.is_blank() {
                    return Err(ProtoError::missing("leave_game", "sessionId"));
                }
                Ok(())
            },
        }
    }

    /// Encode as a JSON envelope.
    pub fn encode(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encode(e.to_string()))
    }

    /// Decode one JSON envelope.
    pub fn decode(text: &str) -> Result<Self, ProtoError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinSession(_) => "join_game",
            Self::SubmitMove(_) => "make_move",
            Self::LeaveSession(_) => "leave_game",
        }
    }

    /// Session the intent targets.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::JoinSession(m) => &m.session_id,
            Self::SubmitMove(m) => &m.session_id,
            Self::LeaveSession(m) => &m.session_id,
        }
    }
}

/// Payload of `join_game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSession {
    /// Session to join.
    pub session_id: SessionId,
    /// Participant id issued by the lobby.
    pub participant_id: ParticipantId,
}

/// Payload of `make_move`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMove {
    /// Session to move in.
    pub session_id: SessionId,
    /// Submitting participant.
    pub participant_id: ParticipantId,
    /// Move in the authority's notation.
    #[serde(rename = "move")]
    pub played_move: String,
    /// Correlation id the authority may echo on the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

/// Payload of `leave_game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSession {
    /// Session to leave.
    pub session_id: SessionId,
}
