//! Session synchronization facade.
//!
//! [`SessionSync`] wires the four core components to one dispatcher and is
//! the only type a driver needs. It stays Sans-IO: transport outcomes are fed
//! in through `on_*` methods, time through `now` parameters, and I/O comes
//! back as [`LinkAction`]s.
//!
//! ```text
//!  driver ──inbound──> handle_inbound ──> Dispatcher ──> SessionStore
//!     ^                                      │     └───> Correlator
//!     │                                      v
//!     └────────────── LinkAction <──── ConnectionManager
//! ```

use std::rc::Rc;

use duelsync_proto::{
    BoardUpdated, InboundEvent, JoinSession, LeaveSession, OutboundMessage, ParticipantId,
    RequestId, Role, RoomJoined, SessionId, SessionTicket, SubmitMove,
};
use tracing::{debug, trace};

use crate::{
    config::SyncConfig,
    correlation::{CallHandle, Correlator, join_session_spec, submit_move_spec},
    dispatcher::{Dispatcher, HandlerResult, SubscriptionId},
    env::Timepoint,
    error::{CallError, ConnectionError},
    event::{Event, EventKind},
    link::{ConnectionManager, ConnectionStatus, LinkAction, LinkState},
    session::{Session, SessionStore},
};

/// One client's synchronization state.
///
/// Explicitly constructed and torn down; nothing is global.
#[derive(Debug)]
pub struct SessionSync<I: Timepoint> {
    config: SyncConfig,
    dispatcher: Dispatcher<Event>,
    store: SessionStore,
    link: ConnectionManager<I>,
    correlator: Correlator<I>,
    next_request: u64,
}

impl<I: Timepoint> SessionSync<I> {
    /// Create a disconnected instance with an idle session.
    pub fn new(config: SyncConfig) -> Self {
        let dispatcher = Dispatcher::new();
        // The store subscribes first so call handles resolve after the
        // session already reflects the reply.
        let store = SessionStore::attach(&dispatcher);
        let link = ConnectionManager::new(dispatcher.clone(), config.reconnect);
        let correlator = Correlator::new(dispatcher.clone());
        Self { config, dispatcher, store, link, correlator, next_request: 0 }
    }

    /// Disconnect, fail pending calls and release every subscription this
    /// instance registered.
    pub fn teardown(&mut self) -> Vec<LinkAction> {
        let actions = self.link.disconnect();
        self.correlator.teardown();
        self.store.detach();
        debug!("session sync torn down");
        actions
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Shared dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<Event> {
        &self.dispatcher
    }

    /// Register an application handler that lives until unsubscribed.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        self.dispatcher.subscribe(kind, handler)
    }

    /// Register a handler dropped automatically on the next disconnect.
    pub fn subscribe_session<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        self.link.subscribe_session(kind, handler)
    }

    /// Remove a registration.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Current session snapshot.
    pub fn session(&self) -> Rc<Session> {
        self.store.snapshot()
    }

    /// Seed the session from a lobby ticket.
    pub fn seed(&self, ticket: &SessionTicket, role: Role, local_name: &str) {
        self.store.seed(ticket, role, local_name);
    }

    /// Link lifecycle state.
    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// Link status record.
    pub fn connection_status(&self) -> &ConnectionStatus {
        self.link.status()
    }

    /// Number of calls awaiting settlement.
    pub fn pending_calls(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Start opening the link.
    pub fn connect(&mut self, now: I) -> Vec<LinkAction> {
        self.link.connect(now)
    }

    /// Report a successful transport open.
    pub fn on_open_succeeded(&mut self) -> Vec<LinkAction> {
        self.link.on_open_succeeded()
    }

    /// Report a failed transport open.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::ConnectFailed`] for the first attempt after an
    /// explicit connect.
    pub fn on_open_failed(&mut self, reason: &str, now: I) -> Result<(), ConnectionError> {
        self.link.on_open_failed(reason, now)
    }

    /// Report loss of an established link.
    pub fn on_transport_dropped(&mut self, reason: &str, now: I) {
        self.link.on_transport_dropped(reason, now);
    }

    /// Route one decoded inbound event to subscribers.
    pub fn handle_inbound(&mut self, event: InboundEvent) {
        trace!(event = event.name(), "inbound");
        self.dispatcher.publish(Event::Remote(event));
    }

    /// Advance timers: expire calls, then start due reconnect attempts.
    pub fn tick(&mut self, now: I) -> Vec<LinkAction> {
        self.correlator.tick(now);
        self.link.tick(now)
    }

    /// Earliest instant at which [`Self::tick`] has work to do.
    pub fn next_wakeup(&self) -> Option<I> {
        match (self.link.next_wakeup(), self.correlator.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Close the link and stop reconnecting. Pending calls fail with
    /// [`CallError::ConnectionLost`].
    pub fn disconnect(&mut self) -> Vec<LinkAction> {
        self.link.disconnect()
    }

    /// Join the realtime room of a session.
    ///
    /// # Errors
    ///
    /// [`CallError::NotConnected`] or [`CallError::InvalidParams`]; nothing is
    /// sent in either case.
    pub fn join_session(
        &mut self,
        session_id: SessionId,
        participant_id: ParticipantId,
        now: I,
    ) -> Result<(CallHandle<RoomJoined>, LinkAction), CallError> {
        let spec = join_session_spec(session_id.clone(), self.config.call_timeout);
        let message = OutboundMessage::JoinSession(JoinSession { session_id, participant_id });
        self.correlator.call(self.link.state(), message, spec, now)
    }

    /// Join the room of the session currently held by the store.
    ///
    /// # Errors
    ///
    /// As [`Self::join_session`]; [`CallError::InvalidParams`] when no
    /// session has been seeded.
    pub fn join_current(
        &mut self,
        now: I,
    ) -> Result<(CallHandle<RoomJoined>, LinkAction), CallError> {
        let (session_id, participant_id) = self.current_identity();
        self.join_session(session_id, participant_id, now)
    }

    /// Submit a move in the current session.
    ///
    /// # Errors
    ///
    /// [`CallError::NotConnected`] or [`CallError::InvalidParams`] before
    /// sending, including when no session is known.
    pub fn submit_move(
        &mut self,
        played_move: &str,
        now: I,
    ) -> Result<(CallHandle<BoardUpdated>, LinkAction), CallError> {
        let (session_id, participant_id) = self.current_identity();
        let request_id = RequestId(self.next_request);
        self.next_request += 1;

        let played_move = played_move.trim().to_owned();
        let spec = submit_move_spec(
            session_id.clone(),
            request_id,
            played_move.clone(),
            self.config.call_timeout,
        );
        let message = OutboundMessage::SubmitMove(SubmitMove {
            session_id,
            participant_id,
            played_move,
            request_id: Some(request_id),
        });
        self.correlator.call(self.link.state(), message, spec, now)
    }

    /// Leave the current session and reset the local mirror.
    ///
    /// Fire-and-forget: returns the send action only when connected and a
    /// session is known.
    pub fn leave_session(&mut self) -> Option<LinkAction> {
        let session_id = self.store.snapshot().session_id.clone();
        let action = match session_id {
            Some(session_id) if self.link.is_connected() => {
                debug!(session = %session_id, "leaving session");
                Some(LinkAction::Send(OutboundMessage::LeaveSession(LeaveSession { session_id })))
            },
            _ => None,
        };
        self.store.reset();
        action
    }

    fn current_identity(&self) -> (SessionId, ParticipantId) {
        let session = self.store.snapshot();
        (
            session.session_id.clone().unwrap_or_else(|| SessionId::new("")),
            session.local_participant_id.clone().unwrap_or_else(|| ParticipantId::new("")),
        )
    }
}
