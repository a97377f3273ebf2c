//! Invariant checking for session histories.
//!
//! Invariants are properties that must hold after every step, whatever
//! sequence of events produced the step. They are checked against a
//! [`SessionHistory`]: the ordered snapshots one client published, recorded
//! with a [`SessionRecorder`].
//!
//! # Usage
//!
//! ```ignore
//! let recorder = SessionRecorder::attach(client.sync().dispatcher());
//! // ... drive the client ...
//! InvariantRegistry::standard().assert_all(&recorder.history(), "after play");
//! ```

mod checks;
mod history;

pub use checks::{
    ActiveHasBothSeats, GameOverIsCompleted, LastMoveIsLogged, MoveLogGrowsOnly, MoveLogUnique,
    SeatIsFixed, TerminalIsSticky,
};
pub use history::{SessionHistory, SessionRecorder};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a session history.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant over the whole history.
    fn check(&self, history: &SessionHistory) -> InvariantResult;

    /// Violation of this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every session invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ActiveHasBothSeats);
        registry.add(GameOverIsCompleted);
        registry.add(LastMoveIsLogged);
        registry.add(MoveLogUnique);
        registry.add(MoveLogGrowsOnly);
        registry.add(SeatIsFixed);
        registry.add(TerminalIsSticky);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, collecting every violation.
    pub fn check_all(&self, history: &SessionHistory) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(history).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, history: &SessionHistory, context: &str) {
        if let Err(violations) = self.check_all(history) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
