//! Identifiers and small enumerations shared by every message type.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is empty or whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Opaque identifier of one game session, assigned by the remote authority.
    SessionId
);

opaque_id!(
    /// Opaque identifier of this client's seat in a session.
    ParticipantId
);

/// Per-call correlation id attached to outbound requests.
///
/// The authority may echo it on the matching reply. Ids are unique per client
/// instance and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// One of the two fixed sides of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    /// The side that moves first.
    #[serde(alias = "white")]
    First,
    /// The side that moves second.
    #[serde(alias = "black")]
    Second,
}

impl Seat {
    /// The opposite seat.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Second => f.write_str("second"),
        }
    }
}

/// How this participant entered the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Created the session.
    #[serde(alias = "creator")]
    Initiator,
    /// Joined a session created by someone else.
    #[serde(alias = "opponent")]
    Joiner,
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session.
    #[default]
    Idle,
    /// Session exists, opponent not yet seated.
    Waiting,
    /// Both seats filled, turns proceed.
    Active,
    /// Game over (win, draw, resignation). Terminal.
    Completed,
    /// Unrecoverable failure. Terminal.
    #[serde(alias = "error")]
    Errored,
}

impl SessionStatus {
    /// True for states no transition may leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_accepts_color_aliases() {
        let seat: Seat = serde_json::from_str("\"white\"").unwrap();
        assert_eq!(seat, Seat::First);
        let seat: Seat = serde_json::from_str("\"black\"").unwrap();
        assert_eq!(seat, Seat::Second);
        assert_eq!(serde_json::to_string(&Seat::Second).unwrap(), "\"second\"");
    }

    #[test]
    fn role_accepts_original_names() {
        let role: Role = serde_json::from_str("\"creator\"").unwrap();
        assert_eq!(role, Role::Initiator);
        let role: Role = serde_json::from_str("\"opponent\"").unwrap();
        assert_eq!(role, Role::Joiner);
    }

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Errored.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Waiting.is_terminal());
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(SessionId::new("  ").is_blank());
        assert!(!ParticipantId::from("p-1").is_blank());
    }
}
