//! Pure session reducer.

use duelsync_proto::{
    BoardUpdated, InboundEvent, MoveError, PlayerJoined, RoomJoined, Seat, SessionStatus,
};
use tracing::{debug, warn};

use super::Session;

/// What proposed a status change. Some transitions are only legal for
/// specific causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Snapshot,
    PlayerJoined,
    StatusChanged,
    BoardUpdated,
    GameOver,
}

/// Fold one inbound event into the session.
///
/// Pure apart from logging: the same session and event always produce the
/// same result. Events that would break an invariant are ignored, in whole or
/// in part, and logged.
pub fn reduce(mut session: Session, event: &InboundEvent) -> Session {
    match event {
        InboundEvent::MoveError(rejected) => record_move_error(&mut session, rejected),
        InboundEvent::GameError(failure) => {
            session.last_error = Some(non_empty(&failure.message, "session error"));
        },
        InboundEvent::ParticipantDisconnected(_) | InboundEvent::ParticipantReconnected(_) => {},
        _ if session.status.is_terminal() => {
            debug!(status = %session.status, event = event.name(), "session is terminal, event ignored");
        },
        InboundEvent::RoomJoined(joined) => apply_room_joined(&mut session, joined),
        InboundEvent::PlayerJoined(joined) => apply_player_joined(&mut session, joined),
        InboundEvent::StatusChanged(change) => {
            if session.session_id.is_none() {
                debug!(status = %change.status, "status change without a session ignored");
            } else {
                transition(&mut session, change.status, Cause::StatusChanged);
            }
        },
        InboundEvent::BoardUpdated(update) => apply_board_update(&mut session, update),
    }
    session
}

fn record_move_error(session: &mut Session, rejected: &MoveError) {
    if session.session_id.as_ref().is_some_and(|id| *id != rejected.session_id) {
        debug!(event_session = %rejected.session_id, "move error for another session ignored");
        return;
    }
    session.last_error = Some(non_empty(&rejected.message, "invalid move"));
}

fn apply_room_joined(session: &mut Session, joined: &RoomJoined) {
    if let Some(current) = &session.session_id {
        if *current != joined.session_id {
            warn!(%current, event_session = %joined.session_id, "room joined for another session ignored");
            return;
        }
    }
    if let Some(current) = &session.local_participant_id {
        if *current != joined.participant_id {
            warn!(%current, event_participant = %joined.participant_id, "room joined for another participant ignored");
            return;
        }
    }

    session.session_id = Some(joined.session_id.clone());
    session.local_participant_id = Some(joined.participant_id.clone());
    keep_or_set(&mut session.role, joined.role, "role");
    let seat = *session.seat.get_or_insert(joined.seat_assignment);
    if seat != joined.seat_assignment {
        warn!(%seat, event_seat = %joined.seat_assignment, "seat is fixed once assigned");
    }

    seat_name(session, seat, &joined.participant_name);
    if let Some(opponent) = &joined.opponent_name {
        seat_name(session, seat.other(), opponent);
    }

    let Some(snapshot) = &joined.session_snapshot else {
        if session.status == SessionStatus::Idle {
            transition(session, SessionStatus::Waiting, Cause::Snapshot);
        }
        return;
    };
    if let Some(name) = &snapshot.first_name {
        seat_name(session, Seat::First, name);
    }
    if let Some(name) = &snapshot.second_name {
        seat_name(session, Seat::Second, name);
    }

    let log = dedup(&snapshot.move_log);
    if log.len() < session.move_log.len() {
        warn!(
            local = session.move_log.len(),
            snapshot = log.len(),
            "stale snapshot, keeping local board"
        );
        return;
    }
    session.board = Some(snapshot.board_encoding.clone());
    session.turn_owner = snapshot.turn_owner;
    session.move_log = log;
    session.last_move = session.move_log.last().cloned();
    transition(session, snapshot.status, Cause::Snapshot);
}

fn apply_player_joined(session: &mut Session, joined: &PlayerJoined) {
    if session.session_id.is_none() {
        debug!(seat = %joined.seat_assignment, "player joined without a session ignored");
        return;
    }
    seat_name(session, joined.seat_assignment, &joined.participant_name);
    transition(session, joined.session_status, Cause::PlayerJoined);
}

fn apply_board_update(session: &mut Session, update: &BoardUpdated) {
    if session.session_id.as_ref() != Some(&update.session_id) {
        debug!(event_session = %update.session_id, "board update for another session ignored");
        return;
    }

    session.board = Some(update.board_encoding.clone());
    session.turn_owner = update.turn_owner;
    session.in_check = update.in_check;
    if let Some(played) = &update.played_move {
        session.last_move = Some(played.clone());
        if session.move_log.contains(played) {
            debug!(played_move = %played, "move already logged");
        } else {
            session.move_log.push(played.clone());
        }
    }

    session.game_over = update.game_over;
    session.winner = update.winner;
    if update.end_reason.is_some() {
        session.end_reason.clone_from(&update.end_reason);
    }

    if update.game_over {
        transition(session, SessionStatus::Completed, Cause::GameOver);
    } else {
        transition(session, update.session_status, Cause::BoardUpdated);
    }
}

fn transition(session: &mut Session, proposed: SessionStatus, cause: Cause) {
    let current = session.status;
    if proposed == current {
        session.started |= current == SessionStatus::Active;
        return;
    }

    let allowed = match (current, proposed) {
        (from, _) if from.is_terminal() => false,
        (_, SessionStatus::Idle) => false,
        (_, SessionStatus::Active) => session.participants.is_full(),
        (SessionStatus::Active, SessionStatus::Completed) => cause == Cause::GameOver,
        (_, SessionStatus::Completed | SessionStatus::Waiting | SessionStatus::Errored) => true,
    };

    if !allowed {
        warn!(from = %current, to = %proposed, ?cause, "status transition refused");
        return;
    }

    debug!(from = %current, to = %proposed, ?cause, "session status changed");
    session.status = proposed;
    if proposed == SessionStatus::Active {
        session.started = true;
    }
}

fn seat_name(session: &mut Session, seat: Seat, name: &str) {
    if !session.participants.assign(seat, name) {
        warn!(%seat, name, "seat already holds another name");
    }
}

fn keep_or_set<T>(slot: &mut Option<T>, value: T, field: &'static str)
where
    T: Copy + PartialEq + std::fmt::Debug,
{
    match slot {
        Some(current) if *current != value => {
            warn!(field, ?current, ?value, "field is fixed once assigned");
        },
        Some(_) => {},
        None => *slot = Some(value),
    }
}

fn dedup(moves: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(moves.len());
    for played in moves {
        if !out.contains(played) {
            out.push(played.clone());
        }
    }
    out
}

fn non_empty(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() { fallback.to_owned() } else { message.to_owned() }
}
