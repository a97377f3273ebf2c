//! Standard session invariants.
//!
//! State checks look at every snapshot on its own. Step checks compare
//! consecutive snapshots of the same session.

use std::collections::HashSet;

use duelsync_proto::SessionStatus;

use super::{Invariant, InvariantResult, SessionHistory};

/// An active session has both seats named.
pub struct ActiveHasBothSeats;

impl Invariant for ActiveHasBothSeats {
    fn name(&self) -> &'static str {
        "active_has_both_seats"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (step, state) in history.states.iter().enumerate() {
            if state.status == SessionStatus::Active && !state.participants.is_full() {
                return Err(self.violation(format!(
                    "step {step}: active with participants {:?}",
                    state.participants
                )));
            }
        }
        Ok(())
    }
}

/// A session the authority declared over is completed.
pub struct GameOverIsCompleted;

impl Invariant for GameOverIsCompleted {
    fn name(&self) -> &'static str {
        "game_over_is_completed"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (step, state) in history.states.iter().enumerate() {
            if state.game_over && state.status != SessionStatus::Completed {
                return Err(self.violation(format!(
                    "step {step}: game over but status {}",
                    state.status
                )));
            }
        }
        Ok(())
    }
}

/// The most recent move is in the log.
pub struct LastMoveIsLogged;

impl Invariant for LastMoveIsLogged {
    fn name(&self) -> &'static str {
        "last_move_is_logged"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (step, state) in history.states.iter().enumerate() {
            if let Some(last) = &state.last_move {
                if !state.move_log.contains(last) {
                    return Err(self.violation(format!("step {step}: last move {last} not logged")));
                }
            }
        }
        Ok(())
    }
}

/// No move appears twice in the log.
pub struct MoveLogUnique;

impl Invariant for MoveLogUnique {
    fn name(&self) -> &'static str {
        "move_log_unique"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (step, state) in history.states.iter().enumerate() {
            let mut seen = HashSet::new();
            if let Some(dup) = state.move_log.iter().find(|m| !seen.insert(m.as_str())) {
                return Err(self.violation(format!("step {step}: move {dup} logged twice")));
            }
        }
        Ok(())
    }
}

/// The move log of one session never shrinks.
pub struct MoveLogGrowsOnly;

impl Invariant for MoveLogGrowsOnly {
    fn name(&self) -> &'static str {
        "move_log_grows_only"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (before, after) in history.same_session_steps() {
            if after.move_log.len() < before.move_log.len() {
                return Err(self.violation(format!(
                    "move log shrank {} → {}",
                    before.move_log.len(),
                    after.move_log.len()
                )));
            }
        }
        Ok(())
    }
}

/// A seat, once assigned, never changes.
pub struct SeatIsFixed;

impl Invariant for SeatIsFixed {
    fn name(&self) -> &'static str {
        "seat_is_fixed"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (before, after) in history.same_session_steps() {
            if let Some(seat) = before.seat {
                if after.seat != Some(seat) {
                    return Err(self.violation(format!("seat {seat} became {:?}", after.seat)));
                }
            }
        }
        Ok(())
    }
}

/// Completed and errored sessions never change status, and a started
/// session stays started.
pub struct TerminalIsSticky;

impl Invariant for TerminalIsSticky {
    fn name(&self) -> &'static str {
        "terminal_is_sticky"
    }

    fn check(&self, history: &SessionHistory) -> InvariantResult {
        for (before, after) in history.same_session_steps() {
            if before.status.is_terminal() && after.status != before.status {
                return Err(self.violation(format!(
                    "terminal status {} became {}",
                    before.status, after.status
                )));
            }
            if before.started && !after.started {
                return Err(self.violation("started flag cleared".to_owned()));
            }
        }
        Ok(())
    }
}
