//! Local mirror of the authoritative session.
//!
//! [`Session`] is a plain value. It changes only through [`reduce`], which
//! folds one inbound event into a new value, and is shared with readers as an
//! immutable `Rc<Session>` snapshot by [`SessionStore`].
//!
//! # Invariants
//!
//! - Session identity, role and seat never change once set.
//! - A participant name, once assigned to a seat, never changes.
//! - `Active` is only entered with both seats filled.
//! - `Active -> Completed` only happens on a board update flagged game over.
//! - `Completed` and `Errored` are terminal until the store is reset.
//! - The move log never shrinks and never holds the same move twice.

mod reducer;
mod store;

use duelsync_proto::{ParticipantId, Role, Seat, SessionId, SessionStatus, SessionTicket};

pub use reducer::reduce;
pub use store::SessionStore;

/// Names seated at each side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participants {
    /// Name in the first seat.
    pub first: Option<String>,
    /// Name in the second seat.
    pub second: Option<String>,
}

impl Participants {
    /// Name seated at `seat`.
    pub fn get(&self, seat: Seat) -> Option<&str> {
        match seat {
            Seat::First => self.first.as_deref(),
            Seat::Second => self.second.as_deref(),
        }
    }

    /// True once both seats have a name.
    pub fn is_full(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }

    /// Seat `name` at `seat` if that seat is still empty.
    ///
    /// Returns false when the seat already holds a different name.
    pub(crate) fn assign(&mut self, seat: Seat, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return true;
        }
        let slot = match seat {
            Seat::First => &mut self.first,
            Seat::Second => &mut self.second,
        };
        if let Some(existing) = slot.as_deref() {
            return existing == name;
        }
        *slot = Some(name.to_owned());
        true
    }
}

/// Client-side view of one game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session id, once known.
    pub session_id: Option<SessionId>,
    /// This client's participant id.
    pub local_participant_id: Option<ParticipantId>,
    /// How this client entered the session.
    pub role: Option<Role>,
    /// This client's seat.
    pub seat: Option<Seat>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// True once the session has been active.
    pub started: bool,
    /// Latest board encoding.
    pub board: Option<String>,
    /// Seat entitled to act.
    pub turn_owner: Seat,
    /// Moves played so far, in order.
    pub move_log: Vec<String>,
    /// Most recent move.
    pub last_move: Option<String>,
    /// Side to act is in check.
    pub in_check: bool,
    /// The authority declared the game over.
    pub game_over: bool,
    /// Winning seat, if decided.
    pub winner: Option<Seat>,
    /// Why the game ended.
    pub end_reason: Option<String>,
    /// Seated names.
    pub participants: Participants,
    /// Token to hand to the opponent (initiator only).
    pub join_token: Option<String>,
    /// Latest error reported by the authority.
    pub last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            session_id: None,
            local_participant_id: None,
            role: None,
            seat: None,
            status: SessionStatus::Idle,
            started: false,
            board: None,
            turn_owner: Seat::First,
            move_log: Vec::new(),
            last_move: None,
            in_check: false,
            game_over: false,
            winner: None,
            end_reason: None,
            participants: Participants::default(),
            join_token: None,
            last_error: None,
        }
    }
}

impl Session {
    /// Session seeded from a lobby ticket, waiting for the realtime join.
    pub fn seeded(ticket: &SessionTicket, role: Role, local_name: &str) -> Self {
        let mut participants = Participants::default();
        participants.assign(ticket.seat, local_name);
        Self {
            session_id: Some(ticket.session_id.clone()),
            local_participant_id: Some(ticket.participant_id.clone()),
            role: Some(role),
            seat: Some(ticket.seat),
            status: SessionStatus::Waiting,
            board: Some(ticket.board_encoding.clone()),
            participants,
            join_token: ticket.join_token.clone(),
            ..Self::default()
        }
    }

    /// True when this client holds the turn in an active session.
    pub fn is_local_turn(&self) -> bool {
        self.status == SessionStatus::Active && self.seat == Some(self.turn_owner)
    }

    /// This client's display name.
    pub fn local_name(&self) -> Option<&str> {
        self.seat.and_then(|seat| self.participants.get(seat))
    }

    /// The other participant's display name.
    pub fn opponent_name(&self) -> Option<&str> {
        self.seat.and_then(|seat| self.participants.get(seat.other()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_names_are_set_once() {
        let mut participants = Participants::default();
        assert!(participants.assign(Seat::First, "alice"));
        assert!(participants.assign(Seat::First, "alice"));
        assert!(!participants.assign(Seat::First, "mallory"));
        assert_eq!(participants.get(Seat::First), Some("alice"));
        assert!(!participants.is_full());
    }

    #[test]
    fn seeded_session_waits() {
        let ticket = SessionTicket {
            session_id: "s1".into(),
            board_encoding: "start".into(),
            seat: Seat::First,
            participant_id: "p1".into(),
            join_token: Some("tok".into()),
            status: SessionStatus::Waiting,
        };

        let session = Session::seeded(&ticket, Role::Initiator, "alice");

        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.local_name(), Some("alice"));
        assert_eq!(session.opponent_name(), None);
        assert!(!session.is_local_turn());
    }
}
