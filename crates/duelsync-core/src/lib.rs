//! Sans-IO session synchronization for two-player turn-based games.
//!
//! Four cooperating state machines keep a local mirror of a session held by a
//! remote authority:
//!
//! - [`Dispatcher`]: synchronous typed publish/subscribe.
//! - [`ConnectionManager`]: link lifecycle with exponential-backoff
//!   reconnection.
//! - [`Correlator`]: turns fire-and-forget messages into awaitable calls with
//!   timeouts.
//! - [`SessionStore`]: folds inbound events into immutable [`Session`]
//!   snapshots through the pure [`reduce`] function.
//!
//! [`SessionSync`] wires them together. None of them performs I/O or reads a
//! clock: time is a parameter and I/O is returned as [`LinkAction`]s for a
//! driver to execute. Everything is single-threaded (`Rc`/`RefCell`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod event;
pub mod link;
pub mod session;
mod sync;

pub use backoff::ReconnectPolicy;
pub use config::{DEFAULT_CALL_TIMEOUT, SyncConfig};
pub use correlation::{CallHandle, CallId, CallSpec, Correlator, Matcher};
pub use dispatcher::{
    DeliveryId, Dispatcher, HandlerResult, SubscriptionId, Topic, WeakDispatcher,
};
pub use env::{Environment, Timepoint};
pub use error::{CallError, ConnectionError, HandlerError};
pub use event::{ConnectionChange, Event, EventKind};
pub use link::{ConnectionManager, ConnectionStatus, LinkAction, LinkState};
pub use session::{Participants, Session, SessionStore, reduce};
pub use sync::SessionSync;
