//! Deterministic simulation harness for duelsync clients.
//!
//! Runs the real [`duelsync_client::SessionClient`] against in-memory
//! stand-ins so every test is reproducible:
//!
//! - [`SimEnv`]: virtual clock; sleeps jump time instead of waiting.
//! - [`ScriptedTransport`]: queue-backed transport with scripted failures.
//! - [`ModelAuthority`]: reference model of the remote authority that answers
//!   what the client sends.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks recorded session histories against
//! properties that must hold after every step. Use
//! [`InvariantRegistry::standard()`] for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authority;
pub mod invariants;
pub mod scripted;
pub mod sim_env;

pub use authority::{ModelAuthority, START_BOARD};
pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, SessionHistory, SessionRecorder, Violation,
};
pub use scripted::{ScriptError, ScriptedTransport};
pub use sim_env::{SimEnv, SimInstant};

use duelsync_client::SessionClient;

/// Client under simulation.
pub type SimClient = SessionClient<ScriptedTransport, SimEnv>;
