//! Reference model of the remote authority.
//!
//! [`ModelAuthority`] holds the authoritative copy of one session and answers
//! outbound messages the way a real server would: it seats participants,
//! enforces turn order, rejects moves it was told are illegal and echoes
//! request ids. It checks nothing about game rules beyond that.
//!
//! The model only speaks for one local client. The opponent's side is driven
//! explicitly through [`ModelAuthority::opponent_joins`] and
//! [`ModelAuthority::opponent_moves`].

use std::collections::HashSet;

use duelsync_proto::{
    BoardUpdated, GameError, InboundEvent, JoinSession, MoveError, OutboundMessage, ParticipantId,
    PlayerJoined, PresenceNotice, RequestId, Role, RoomJoined, Seat, SessionId, SessionSnapshot,
    SessionStatus, SessionTicket, SubmitMove,
};
use tracing::debug;

/// Board encoding before any move.
pub const START_BOARD: &str = "start";

#[derive(Debug, Clone)]
struct Seated {
    participant_id: ParticipantId,
    name: String,
    joined: bool,
}

/// Authoritative state of one session.
#[derive(Debug, Clone)]
pub struct ModelAuthority {
    session_id: SessionId,
    seats: [Option<Seated>; 2],
    status: SessionStatus,
    turn_owner: Seat,
    move_log: Vec<String>,
    illegal: HashSet<String>,
    finishing: Option<String>,
    echo_request_ids: bool,
}

impl ModelAuthority {
    /// Session `session_id` with the first seat held by `initiator`.
    pub fn new(session_id: impl Into<SessionId>, initiator: (&str, &str)) -> Self {
        let (participant_id, name) = initiator;
        Self {
            session_id: session_id.into(),
            seats: [Some(seated(participant_id, name)), None],
            status: SessionStatus::Waiting,
            turn_owner: Seat::First,
            move_log: Vec::new(),
            illegal: HashSet::new(),
            finishing: None,
            echo_request_ids: true,
        }
    }

    /// Seat the second participant. Their realtime join is still pending.
    #[must_use]
    pub fn with_joiner(mut self, participant_id: &str, name: &str) -> Self {
        self.seats[index(Seat::Second)] = Some(seated(participant_id, name));
        self
    }

    /// Reject `played_move` whenever it is submitted.
    #[must_use]
    pub fn with_illegal_move(mut self, played_move: &str) -> Self {
        self.illegal.insert(played_move.to_owned());
        self
    }

    /// End the game when `played_move` is accepted.
    #[must_use]
    pub fn with_finishing_move(mut self, played_move: &str) -> Self {
        self.finishing = Some(played_move.to_owned());
        self
    }

    /// Stop echoing request ids on replies.
    #[must_use]
    pub fn without_request_echo(mut self) -> Self {
        self.echo_request_ids = false;
        self
    }

    /// Session id.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Accepted moves in order.
    pub fn move_log(&self) -> &[String] {
        &self.move_log
    }

    /// Lobby ticket the participant in `seat` would have received.
    pub fn ticket(&self, seat: Seat) -> Option<SessionTicket> {
        let seated = self.seats[index(seat)].as_ref()?;
        Some(SessionTicket {
            session_id: self.session_id.clone(),
            board_encoding: START_BOARD.to_owned(),
            seat,
            participant_id: seated.participant_id.clone(),
            join_token: (seat == Seat::First).then(|| format!("{}-token", self.session_id)),
            status: SessionStatus::Waiting,
        })
    }

    /// Answer one outbound message.
    pub fn respond(&mut self, message: &OutboundMessage) -> Vec<InboundEvent> {
        match message {
            OutboundMessage::JoinSession(join) => self.on_join(join),
            OutboundMessage::SubmitMove(submit) => self.on_move(submit),
            OutboundMessage::LeaveSession(_) => Vec::new(),
        }
    }

    /// The seat opposite the local client joins the room.
    ///
    /// Returns the notice the local client receives, or nothing if the seat
    /// is empty or already joined.
    pub fn opponent_joins(&mut self, seat: Seat) -> Vec<InboundEvent> {
        let Some(opponent) = self.seats[index(seat)].as_mut() else {
            return Vec::new();
        };
        if opponent.joined {
            return Vec::new();
        }
        opponent.joined = true;
        let name = opponent.name.clone();
        self.refresh_status();
        vec![InboundEvent::PlayerJoined(PlayerJoined {
            seat_assignment: seat,
            participant_name: name,
            session_status: self.status,
        })]
    }

    /// The participant in `seat` plays `played_move` without a request id.
    ///
    /// Returns the broadcast, or nothing if the move would be rejected.
    pub fn opponent_moves(&mut self, seat: Seat, played_move: &str) -> Vec<InboundEvent> {
        if self.status != SessionStatus::Active
            || self.turn_owner != seat
            || self.move_log.iter().any(|m| m == played_move)
        {
            return Vec::new();
        }
        self.accept(played_move, None)
    }

    /// The participant in `seat` drops or comes back.
    pub fn presence(&self, seat: Seat, connected: bool) -> Vec<InboundEvent> {
        let Some(seated) = self.seats[index(seat)].as_ref() else {
            return Vec::new();
        };
        let notice = PresenceNotice {
            participant_id: Some(seated.participant_id.clone()),
            participant_name: Some(seated.name.clone()),
            seat: Some(seat),
        };
        if connected {
            vec![InboundEvent::ParticipantReconnected(notice)]
        } else {
            vec![InboundEvent::ParticipantDisconnected(notice)]
        }
    }

    fn on_join(&mut self, join: &JoinSession) -> Vec<InboundEvent> {
        if join.session_id != self.session_id {
            return vec![game_error("game not found")];
        }
        let Some(seat) = self.seat_of(&join.participant_id) else {
            return vec![game_error("player not in game")];
        };

        if let Some(seated) = self.seats[index(seat)].as_mut() {
            seated.joined = true;
        }
        self.refresh_status();
        debug!(session = %self.session_id, %seat, status = %self.status, "model join");

        vec![InboundEvent::RoomJoined(RoomJoined {
            session_id: self.session_id.clone(),
            participant_id: join.participant_id.clone(),
            role: if seat == Seat::First { Role::Initiator } else { Role::Joiner },
            seat_assignment: seat,
            participant_name: self.name(seat).unwrap_or_default().to_owned(),
            opponent_name: self.name(seat.other()).map(str::to_owned),
            session_snapshot: Some(self.snapshot()),
        })]
    }

    fn on_move(&mut self, submit: &SubmitMove) -> Vec<InboundEvent> {
        let reject = |message: &str| {
            vec![InboundEvent::MoveError(MoveError {
                session_id: submit.session_id.clone(),
                message: message.to_owned(),
                request_id: submit.request_id,
            })]
        };

        if submit.session_id != self.session_id {
            return reject("game not found");
        }
        if self.status != SessionStatus::Active {
            return reject("game not active");
        }
        if self.seat_of(&submit.participant_id) != Some(self.turn_owner) {
            return reject("not your turn");
        }
        if self.illegal.contains(&submit.played_move) || self.move_log.contains(&submit.played_move)
        {
            return reject("invalid move");
        }

        let echo = if self.echo_request_ids { submit.request_id } else { None };
        self.accept(&submit.played_move, echo)
    }

    fn accept(&mut self, played_move: &str, request_id: Option<RequestId>) -> Vec<InboundEvent> {
        let mover = self.turn_owner;
        self.move_log.push(played_move.to_owned());
        self.turn_owner = mover.other();

        let game_over = self.finishing.as_deref() == Some(played_move);
        if game_over {
            self.status = SessionStatus::Completed;
        }

        vec![InboundEvent::BoardUpdated(BoardUpdated {
            session_id: self.session_id.clone(),
            board_encoding: self.board(),
            turn_owner: self.turn_owner,
            played_move: Some(played_move.to_owned()),
            in_check: false,
            game_over,
            winner: game_over.then_some(mover),
            session_status: self.status,
            end_reason: game_over.then(|| "checkmate".to_owned()),
            request_id,
        })]
    }

    fn refresh_status(&mut self) {
        let all_joined = self.seats.iter().all(|s| s.as_ref().is_some_and(|s| s.joined));
        if self.status == SessionStatus::Waiting && all_joined {
            self.status = SessionStatus::Active;
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            board_encoding: self.board(),
            turn_owner: self.turn_owner,
            move_log: self.move_log.clone(),
            first_name: self.name(Seat::First).map(str::to_owned),
            second_name: self.name(Seat::Second).map(str::to_owned),
        }
    }

    fn board(&self) -> String {
        if self.move_log.is_empty() {
            START_BOARD.to_owned()
        } else {
            format!("{START_BOARD}:{}", self.move_log.join(","))
        }
    }

    fn seat_of(&self, participant_id: &ParticipantId) -> Option<Seat> {
        [Seat::First, Seat::Second].into_iter().find(|seat| {
            self.seats[index(*seat)].as_ref().is_some_and(|s| s.participant_id == *participant_id)
        })
    }

    fn name(&self, seat: Seat) -> Option<&str> {
        self.seats[index(seat)].as_ref().map(|s| s.name.as_str())
    }
}

fn seated(participant_id: &str, name: &str) -> Seated {
    Seated { participant_id: participant_id.into(), name: name.to_owned(), joined: false }
}

fn index(seat: Seat) -> usize {
    match seat {
        Seat::First => 0,
        Seat::Second => 1,
    }
}

fn game_error(message: &str) -> InboundEvent {
    InboundEvent::GameError(GameError { message: message.to_owned() })
}
