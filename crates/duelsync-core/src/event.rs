//! Events carried by the session dispatcher.

use std::{fmt, rc::Rc};

use duelsync_proto::InboundEvent;

use crate::{dispatcher::Topic, session::Session};

/// Routing key of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Link status changed.
    ConnectionChanged,
    /// `room_joined` from the authority.
    RoomJoined,
    /// `player_joined` from the authority.
    PlayerJoined,
    /// `game_status_changed` from the authority.
    StatusChanged,
    /// `board_updated` from the authority.
    BoardUpdated,
    /// `move_error` from the authority.
    MoveError,
    /// `error` from the authority.
    GameError,
    /// `player_disconnected` from the authority.
    ParticipantDisconnected,
    /// `player_reconnected` from the authority.
    ParticipantReconnected,
    /// The local session mirror changed.
    SessionChanged,
}

impl EventKind {
    /// Every kind produced by the remote authority.
    pub const INBOUND: [EventKind; 8] = [
        Self::RoomJoined,
        Self::PlayerJoined,
        Self::StatusChanged,
        Self::BoardUpdated,
        Self::MoveError,
        Self::GameError,
        Self::ParticipantDisconnected,
        Self::ParticipantReconnected,
    ];

    /// Stable event name used in logs and by subscribers that key on strings.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ConnectionChanged => "connection.changed",
            Self::RoomJoined => "room-joined",
            Self::PlayerJoined => "player-joined",
            Self::StatusChanged => "status-changed",
            Self::BoardUpdated => "board-updated",
            Self::MoveError => "move-error",
            Self::GameError => "game-error",
            Self::ParticipantDisconnected => "participant-disconnected",
            Self::ParticipantReconnected => "participant-reconnected",
            Self::SessionChanged => "session.changed",
        }
    }

    /// Kind for an inbound event.
    pub fn of_inbound(event: &InboundEvent) -> Self {
        match event {
            InboundEvent::RoomJoined(_) => Self::RoomJoined,
            InboundEvent::PlayerJoined(_) => Self::PlayerJoined,
            InboundEvent::StatusChanged(_) => Self::StatusChanged,
            InboundEvent::BoardUpdated(_) => Self::BoardUpdated,
            InboundEvent::MoveError(_) => Self::MoveError,
            InboundEvent::GameError(_) => Self::GameError,
            InboundEvent::ParticipantDisconnected(_) => Self::ParticipantDisconnected,
            InboundEvent::ParticipantReconnected(_) => Self::ParticipantReconnected,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Link status notification.
///
/// Published under [`EventKind::ConnectionChanged`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionChange {
    /// Transport opened.
    Connected {
        /// True if this open ended a reconnection cycle.
        reconnected: bool,
    },
    /// An established link was lost.
    Dropped {
        /// Transport-reported reason.
        reason: String,
    },
    /// A reconnection attempt is starting.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Reconnection gave up after exhausting its attempts.
    ReconnectFailed,
    /// Explicit disconnect by the application.
    Disconnected,
}

impl ConnectionChange {
    /// True only for [`ConnectionChange::Connected`].
    pub fn connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// True when this change leaves no usable link: pending calls cannot be
    /// answered anymore.
    pub fn ends_link(&self) -> bool {
        matches!(self, Self::Dropped { .. } | Self::ReconnectFailed | Self::Disconnected)
    }

    /// Drop reason, if this is a drop.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Dropped { reason } => Some(reason),
            _ => None,
        }
    }

    /// Attempt number, if this is a reconnection attempt.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            Self::Reconnecting { attempt } => Some(*attempt),
            _ => None,
        }
    }
}

/// Everything the dispatcher routes.
#[derive(Debug, Clone)]
pub enum Event {
    /// Link status changed.
    Connection(ConnectionChange),
    /// Semantic event from the remote authority.
    Remote(InboundEvent),
    /// New immutable session snapshot.
    Session(Rc<Session>),
}

impl Event {
    /// Inbound payload, if this came from the authority.
    pub fn as_inbound(&self) -> Option<&InboundEvent> {
        match self {
            Self::Remote(event) => Some(event),
            _ => None,
        }
    }

    /// Connection change, if this is one.
    pub fn as_connection(&self) -> Option<&ConnectionChange> {
        match self {
            Self::Connection(change) => Some(change),
            _ => None,
        }
    }

    /// Session snapshot, if this is one.
    pub fn as_session(&self) -> Option<&Rc<Session>> {
        match self {
            Self::Session(session) => Some(session),
            _ => None,
        }
    }
}

impl Topic for Event {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::Connection(_) => EventKind::ConnectionChanged,
            Self::Remote(event) => EventKind::of_inbound(event),
            Self::Session(_) => EventKind::SessionChanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use duelsync_proto::{GameError, SessionStatus, StatusChanged};

    use super::*;

    #[test]
    fn inbound_kinds_cover_remote_events() {
        let event = Event::Remote(InboundEvent::GameError(GameError::default()));
        assert_eq!(event.kind(), EventKind::GameError);
        assert!(EventKind::INBOUND.contains(&event.kind()));

        let event = Event::Remote(InboundEvent::StatusChanged(StatusChanged {
            status: SessionStatus::Active,
        }));
        assert_eq!(event.kind().name(), "status-changed");
    }

    #[test]
    fn only_loss_events_end_the_link() {
        assert!(ConnectionChange::Dropped { reason: "eof".into() }.ends_link());
        assert!(ConnectionChange::ReconnectFailed.ends_link());
        assert!(ConnectionChange::Disconnected.ends_link());
        assert!(!ConnectionChange::Reconnecting { attempt: 1 }.ends_link());
        assert!(!ConnectionChange::Connected { reconnected: true }.ends_link());
    }
}
