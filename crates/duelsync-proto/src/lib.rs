//! Protocol
//!
//! Wire types for the duelsync session protocol: inbound events published by
//! the remote authority, outbound intents sent by the client, and the payloads
//! of the one-shot lobby RPC used to create or join a game.
//!
//! # Wire Format
//!
//! Every realtime message is a JSON envelope:
//!
//! ```text
//! { "event": "board_updated", "data": { "sessionId": "...", ... } }
//! ```
//!
//! Field names are camelCase. Names used by the original dice chess backend
//! (`gameId`, `playerId`, `fen`, `white`/`black`, ...) are accepted as aliases
//! when decoding, so the client interoperates with either naming.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod ids;
pub mod inbound;
pub mod lobby;
pub mod outbound;

pub use error::ProtoError;
pub use ids::{ParticipantId, RequestId, Role, Seat, SessionId, SessionStatus};
pub use inbound::{
    BoardUpdated, GameError, InboundEvent, MoveError, PlayerJoined, PresenceNotice, RoomJoined,
    SessionSnapshot, StatusChanged,
};
pub use lobby::{CreateSessionRequest, JoinSessionRequest, SessionTicket};
pub use outbound::{JoinSession, LeaveSession, OutboundMessage, SubmitMove};
