//! Events published by the remote authority.

use serde::{Deserialize, Serialize};

use crate::{ParticipantId, ProtoError, RequestId, Role, Seat, SessionId, SessionStatus};

/// Inbound semantic events.
///
/// Each variant maps to one wire event name in the `event` field of the
/// envelope; the payload sits in `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// This client's seat in a session room is confirmed.
    RoomJoined(RoomJoined),

    /// The other participant took their seat.
    PlayerJoined(PlayerJoined),

    /// Session status changed.
    #[serde(rename = "game_status_changed")]
    StatusChanged(StatusChanged),

    /// A move was applied; carries the full post-move board.
    BoardUpdated(BoardUpdated),

    /// A submitted move was rejected.
    MoveError(MoveError),

    /// Session-level failure not tied to a move.
    #[serde(rename = "error")]
    GameError(GameError),

    /// The other participant's link dropped.
    #[serde(rename = "player_disconnected")]
    ParticipantDisconnected(PresenceNotice),

    /// The other participant's link came back.
    #[serde(rename = "player_reconnected")]
    ParticipantReconnected(PresenceNotice),
}

impl InboundEvent {
    /// Decode one JSON envelope.
    pub fn decode(text: &str) -> Result<Self, ProtoError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a JSON envelope.
    pub fn encode(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encode(e.to_string()))
    }

    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomJoined(_) => "room_joined",
            Self::PlayerJoined(_) => "player_joined",
            Self::StatusChanged(_) => "game_status_changed",
            Self::BoardUpdated(_) => "board_updated",
            Self::MoveError(_) => "move_error",
            Self::GameError(_) => "error",
            Self::ParticipantDisconnected(_) => "player_disconnected",
            Self::ParticipantReconnected(_) => "player_reconnected",
        }
    }

    /// Session the event is scoped to, if it names one.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::RoomJoined(e) => Some(&e.session_id),
            Self::BoardUpdated(e) => Some(&e.session_id),
            Self::MoveError(e) => Some(&e.session_id),
            Self::PlayerJoined(_)
            | Self::StatusChanged(_)
            | Self::GameError(_)
            | Self::ParticipantDisconnected(_)
            | Self::ParticipantReconnected(_) => None,
        }
    }
}

/// Payload of `room_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    /// Session that was joined.
    #[serde(alias = "gameId")]
    pub session_id: SessionId,
    /// This client's participant id.
    #[serde(alias = "playerId")]
    pub participant_id: ParticipantId,
    /// How this client entered the session.
    #[serde(alias = "playerRole")]
    pub role: Role,
    /// This client's seat.
    #[serde(alias = "playerColor")]
    pub seat_assignment: Seat,
    /// This client's display name.
    #[serde(alias = "playerName")]
    pub participant_name: String,
    /// Opponent display name, if already seated.
    #[serde(default)]
    pub opponent_name: Option<String>,
    /// Full game state, sent when joining a session already in progress.
    #[serde(default, alias = "gameData")]
    pub session_snapshot: Option<SessionSnapshot>,
}

/// Full session state included in `room_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current status.
    pub status: SessionStatus,
    /// Canonical board encoding.
    #[serde(alias = "fen")]
    pub board_encoding: String,
    /// Side entitled to act.
    #[serde(alias = "activePlayer")]
    pub turn_owner: Seat,
    /// Every move played so far, in order.
    #[serde(default, alias = "moveHistory")]
    pub move_log: Vec<String>,
    /// Name seated first.
    #[serde(default, alias = "creatorName")]
    pub first_name: Option<String>,
    /// Name seated second.
    #[serde(default, alias = "opponentName")]
    pub second_name: Option<String>,
}

/// Payload of `player_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoined {
    /// Seat the new participant took.
    #[serde(alias = "playerColor")]
    pub seat_assignment: Seat,
    /// Their display name.
    #[serde(alias = "playerName")]
    pub participant_name: String,
    /// Session status after the join.
    #[serde(alias = "gameStatus")]
    pub session_status: SessionStatus,
}

/// Payload of `game_status_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    /// New status.
    pub status: SessionStatus,
}

/// Payload of `board_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardUpdated {
    /// Session the move was applied to.
    #[serde(alias = "gameId")]
    pub session_id: SessionId,
    /// Board after the move.
    #[serde(alias = "fen")]
    pub board_encoding: String,
    /// Side to act next.
    #[serde(alias = "activePlayer")]
    pub turn_owner: Seat,
    /// Move that produced this board.
    #[serde(default, rename = "move")]
    pub played_move: Option<String>,
    /// Side to act is in check.
    #[serde(default, alias = "isCheck")]
    pub in_check: bool,
    /// Game ended with this move.
    #[serde(default, alias = "isGameOver")]
    pub game_over: bool,
    /// Winning seat; `None` while running or on a draw.
    #[serde(default)]
    pub winner: Option<Seat>,
    /// Session status after the move.
    #[serde(alias = "gameStatus")]
    pub session_status: SessionStatus,
    /// Why the game ended.
    #[serde(default)]
    pub end_reason: Option<String>,
    /// Echo of the submitting call's correlation id, when the authority
    /// supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

/// Payload of `move_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveError {
    /// Session the move was submitted to.
    #[serde(alias = "gameId")]
    pub session_id: SessionId,
    /// Rejection reason.
    #[serde(default)]
    pub message: String,
    /// Echo of the submitting call's correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

/// Payload of the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameError {
    /// Failure description.
    #[serde(default)]
    pub message: String,
}

/// Payload of presence notices (`player_disconnected`, `player_reconnected`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    /// Participant whose link changed.
    #[serde(default, alias = "playerId")]
    pub participant_id: Option<ParticipantId>,
    /// Their display name.
    #[serde(default, alias = "playerName")]
    pub participant_name: Option<String>,
    /// Their seat.
    #[serde(default, alias = "playerColor")]
    pub seat: Option<Seat>,
}
