//! Fuzz target for the session reducer
//!
//! # Strategy
//!
//! - Sessions: a small id pool so events hit the current session and others
//! - Moves: a small pool so redelivery and duplicates are common
//! - Statuses: every status, including terminal ones, from every event kind
//!
//! # Invariants
//!
//! - Active implies both seats named
//! - Game over implies completed
//! - Terminal status never changes
//! - Move log never shrinks and holds no duplicates
//! - Seat never changes once assigned

#![no_main]

use arbitrary::Arbitrary;
use duelsync_core::{reduce, Session};
use duelsync_proto::{
    BoardUpdated, GameError, InboundEvent, MoveError, PlayerJoined, RequestId, Role, RoomJoined,
    Seat, SessionSnapshot, SessionStatus, StatusChanged,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum StatusChoice {
    Idle,
    Waiting,
    Active,
    Completed,
    Errored,
}

impl From<StatusChoice> for SessionStatus {
    fn from(choice: StatusChoice) -> Self {
        match choice {
            StatusChoice::Idle => Self::Idle,
            StatusChoice::Waiting => Self::Waiting,
            StatusChoice::Active => Self::Active,
            StatusChoice::Completed => Self::Completed,
            StatusChoice::Errored => Self::Errored,
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Joined { session: u8, first: bool, opponent: Option<u8>, snapshot: Option<(StatusChoice, Vec<u8>)> },
    PlayerJoined { first: bool, name: u8, status: StatusChoice },
    Status(StatusChoice),
    Board { session: u8, played: Option<u8>, first_to_move: bool, game_over: bool, status: StatusChoice },
    MoveError { session: u8 },
    GameError,
}

const NAMES: [&str; 3] = ["alice", "bob", "carol"];

fn seat(first: bool) -> Seat {
    if first { Seat::First } else { Seat::Second }
}

fn session_id(n: u8) -> String {
    format!("s{}", n % 2)
}

fn played(n: u8) -> String {
    format!("m{}", n % 8)
}

fn to_event(op: Op) -> InboundEvent {
    match op {
        Op::Joined { session, first, opponent, snapshot } => InboundEvent::RoomJoined(RoomJoined {
            session_id: session_id(session).into(),
            participant_id: "p1".into(),
            role: if first { Role::Initiator } else { Role::Joiner },
            seat_assignment: seat(first),
            participant_name: NAMES[0].to_owned(),
            opponent_name: opponent.map(|n| NAMES[usize::from(n) % NAMES.len()].to_owned()),
            session_snapshot: snapshot.map(|(status, moves)| SessionSnapshot {
                status: status.into(),
                board_encoding: "snap".to_owned(),
                turn_owner: Seat::First,
                move_log: moves.into_iter().map(played).collect(),
                first_name: None,
                second_name: None,
            }),
        }),
        Op::PlayerJoined { first, name, status } => InboundEvent::PlayerJoined(PlayerJoined {
            seat_assignment: seat(first),
            participant_name: NAMES[usize::from(name) % NAMES.len()].to_owned(),
            session_status: status.into(),
        }),
        Op::Status(status) => InboundEvent::StatusChanged(StatusChanged { status: status.into() }),
        Op::Board { session, played: mv, first_to_move, game_over, status } => {
            InboundEvent::BoardUpdated(BoardUpdated {
                session_id: session_id(session).into(),
                board_encoding: "board".to_owned(),
                turn_owner: seat(first_to_move),
                played_move: mv.map(played),
                in_check: false,
                game_over,
                winner: game_over.then_some(Seat::First),
                session_status: status.into(),
                end_reason: None,
                request_id: Some(RequestId(1)),
            })
        },
        Op::MoveError { session } => InboundEvent::MoveError(MoveError {
            session_id: session_id(session).into(),
            message: "invalid".to_owned(),
            request_id: None,
        }),
        Op::GameError => InboundEvent::GameError(GameError { message: String::new() }),
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let mut session = Session::default();

    for op in ops {
        let before = session.clone();
        session = reduce(session, &to_event(op));

        assert!(session.status != SessionStatus::Active || session.participants.is_full());
        assert!(!session.game_over || session.status == SessionStatus::Completed);

        let mut seen = std::collections::HashSet::new();
        assert!(session.move_log.iter().all(|m| seen.insert(m)), "duplicate move logged");

        if before.session_id.is_some() {
            assert_eq!(before.session_id, session.session_id, "session id changed");
            assert!(session.move_log.len() >= before.move_log.len(), "move log shrank");
            if before.status.is_terminal() {
                assert_eq!(before.status, session.status, "left terminal status");
            }
            if let Some(seat) = before.seat {
                assert_eq!(Some(seat), session.seat, "seat changed");
            }
        }
    }
});
