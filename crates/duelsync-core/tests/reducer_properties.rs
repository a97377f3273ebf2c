//! Property-based tests for the session reducer.
//!
//! Arbitrary inbound event sequences, including duplicates, foreign sessions
//! and out-of-order status changes, must never break the session invariants.

use duelsync_core::{Session, reduce};
use duelsync_proto::{
    BoardUpdated, GameError, InboundEvent, MoveError, PlayerJoined, PresenceNotice, Role,
    RoomJoined, Seat, SessionSnapshot, SessionStatus, StatusChanged,
};
use proptest::prelude::*;

fn seat_strategy() -> impl Strategy<Value = Seat> {
    prop_oneof![Just(Seat::First), Just(Seat::Second)]
}

fn status_strategy() -> impl Strategy<Value = SessionStatus> {
    prop_oneof![
        1 => Just(SessionStatus::Idle),
        2 => Just(SessionStatus::Waiting),
        4 => Just(SessionStatus::Active),
        1 => Just(SessionStatus::Completed),
        1 => Just(SessionStatus::Errored),
    ]
}

fn session_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![4 => Just("s1"), 1 => Just("s2")]
}

fn move_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "O-O"]).prop_map(String::from)
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["alice", "bob", "eve"]).prop_map(String::from)
}

fn snapshot_strategy() -> impl Strategy<Value = SessionSnapshot> {
    (status_strategy(), seat_strategy(), prop::collection::vec(move_strategy(), 0..6)).prop_map(
        |(status, turn_owner, move_log)| SessionSnapshot {
            status,
            board_encoding: format!("snap-{}", move_log.len()),
            turn_owner,
            move_log,
            first_name: Some("alice".into()),
            second_name: Some("bob".into()),
        },
    )
}

/// Generate random inbound events.
fn event_strategy() -> impl Strategy<Value = InboundEvent> {
    prop_oneof![
        2 => (session_strategy(), seat_strategy(), name_strategy(), prop::option::of(snapshot_strategy()))
            .prop_map(|(session, seat, name, snapshot)| {
                InboundEvent::RoomJoined(RoomJoined {
                    session_id: session.into(),
                    participant_id: "p1".into(),
                    role: Role::Initiator,
                    seat_assignment: seat,
                    participant_name: name,
                    opponent_name: None,
                    session_snapshot: snapshot,
                })
            }),
        2 => (seat_strategy(), name_strategy(), status_strategy()).prop_map(|(seat, name, status)| {
            InboundEvent::PlayerJoined(PlayerJoined {
                seat_assignment: seat,
                participant_name: name,
                session_status: status,
            })
        }),
        2 => status_strategy().prop_map(|status| InboundEvent::StatusChanged(StatusChanged { status })),
        6 => (session_strategy(), move_strategy(), seat_strategy(), any::<bool>(), status_strategy(), prop::bool::weighted(0.1))
            .prop_map(|(session, mv, turn_owner, in_check, status, game_over)| {
                InboundEvent::BoardUpdated(BoardUpdated {
                    session_id: session.into(),
                    board_encoding: format!("after-{mv}"),
                    turn_owner,
                    played_move: Some(mv),
                    in_check,
                    game_over,
                    winner: None,
                    session_status: status,
                    end_reason: None,
                    request_id: None,
                })
            }),
        1 => session_strategy().prop_map(|session| {
            InboundEvent::MoveError(MoveError {
                session_id: session.into(),
                message: "illegal".into(),
                request_id: None,
            })
        }),
        1 => Just(InboundEvent::GameError(GameError { message: "oops".into() })),
        1 => Just(InboundEvent::ParticipantDisconnected(PresenceNotice::default())),
    ]
}

/// Check single-session invariants on one step.
fn check_step(before: &Session, after: &Session) -> Result<(), TestCaseError> {
    // Identity is immutable once set.
    if before.session_id.is_some() {
        prop_assert_eq!(&before.session_id, &after.session_id);
    }
    if before.seat.is_some() {
        prop_assert_eq!(before.seat, after.seat);
    }
    if before.role.is_some() {
        prop_assert_eq!(before.role, after.role);
    }

    // Names are set once per seat.
    for seat in [Seat::First, Seat::Second] {
        if let Some(name) = before.participants.get(seat) {
            prop_assert_eq!(Some(name), after.participants.get(seat));
        }
    }

    // Terminal states are sticky.
    if before.status.is_terminal() {
        prop_assert_eq!(before.status, after.status);
    }

    // Active only with both seats filled.
    if after.status == SessionStatus::Active && before.status != SessionStatus::Active {
        prop_assert!(after.participants.is_full());
    }

    // Active never completes without a game-over flag.
    if before.status == SessionStatus::Active && after.status == SessionStatus::Completed {
        prop_assert!(after.game_over);
    }

    // started is never cleared.
    if before.started {
        prop_assert!(after.started);
    }

    // Move log only grows and holds no duplicates.
    prop_assert!(after.move_log.len() >= before.move_log.len());
    let mut sorted = after.move_log.clone();
    sorted.sort();
    sorted.dedup();
    prop_assert_eq!(sorted.len(), after.move_log.len());

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_session_invariants_hold(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut session = Session::default();
        for event in &events {
            let next = reduce(session.clone(), event);
            check_step(&session, &next)?;
            session = next;
        }
    }

    #[test]
    fn prop_reducer_is_deterministic(events in prop::collection::vec(event_strategy(), 0..40)) {
        let first = events.iter().fold(Session::default(), reduce);
        let second = events.iter().fold(Session::default(), reduce);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_redelivery_is_idempotent(events in prop::collection::vec(event_strategy(), 1..40)) {
        let mut session = Session::default();
        for event in &events {
            session = reduce(session, event);
            if matches!(event, InboundEvent::BoardUpdated(_)) {
                let again = reduce(session.clone(), event);
                prop_assert_eq!(&again, &session);
            }
        }
    }

    #[test]
    fn prop_distinct_moves_grow_log_by_one(moves in prop::collection::hash_set("[a-h][1-8]", 1..20)) {
        let start = [
            InboundEvent::RoomJoined(RoomJoined {
                session_id: "s1".into(),
                participant_id: "p1".into(),
                role: Role::Initiator,
                seat_assignment: Seat::First,
                participant_name: "alice".into(),
                opponent_name: Some("bob".into()),
                session_snapshot: None,
            }),
            InboundEvent::StatusChanged(StatusChanged { status: SessionStatus::Active }),
        ];
        let mut session = start.iter().fold(Session::default(), reduce);
        prop_assert_eq!(session.status, SessionStatus::Active);

        for (i, mv) in moves.iter().enumerate() {
            session = reduce(session, &InboundEvent::BoardUpdated(BoardUpdated {
                session_id: "s1".into(),
                board_encoding: format!("b{i}"),
                turn_owner: if i % 2 == 0 { Seat::Second } else { Seat::First },
                played_move: Some(mv.clone()),
                in_check: false,
                game_over: false,
                winner: None,
                session_status: SessionStatus::Active,
                end_reason: None,
                request_id: None,
            }));
            prop_assert_eq!(session.move_log.len(), i + 1);
            prop_assert_eq!(session.last_move.as_ref(), Some(mv));
        }
    }
}
