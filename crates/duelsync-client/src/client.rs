//! Async driver for the synchronization core.
//!
//! [`SessionClient`] owns a [`SessionSync`], a [`Transport`] and an
//! [`Environment`]. It executes the core's [`LinkAction`]s, feeds transport
//! outcomes back, and sleeps until the core's next wakeup. All protocol and
//! lifecycle decisions stay in the core; this layer only performs I/O.
//!
//! The driver is single-threaded. It suspends only on transport open,
//! transport send, transport receive and timer sleep.

use std::rc::Rc;

use duelsync_core::{
    CallError, CallHandle, Environment, Event, EventKind, HandlerResult, LinkAction, LinkState,
    Session, SessionSync, SubscriptionId, SyncConfig,
};
use duelsync_proto::{BoardUpdated, ParticipantId, Role, RoomJoined, SessionId, SessionTicket};
use tracing::{debug, warn};

use crate::{
    error::ClientError,
    transport::{Transport, TransportEvent},
};

/// Outcome of one [`SessionClient::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An event or timer was processed.
    Progressed,
    /// Nothing can happen: no link and no timer armed.
    Idle,
}

/// What ended a [`SessionClient::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wakeup {
    /// The transport produced an event.
    Transport(TransportEvent),
    /// A core timer is due.
    Timer,
}

/// Session client driving the core over a transport.
pub struct SessionClient<T, E>
where
    T: Transport,
    E: Environment,
{
    sync: SessionSync<E::Instant>,
    transport: T,
    env: E,
}

impl<T, E> SessionClient<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Create a disconnected client.
    pub fn new(transport: T, env: E, config: SyncConfig) -> Self {
        Self { sync: SessionSync::new(config), transport, env }
    }

    /// Core state, for inspection.
    pub fn sync(&self) -> &SessionSync<E::Instant> {
        &self.sync
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current session snapshot.
    pub fn session(&self) -> Rc<Session> {
        self.sync.session()
    }

    /// Link lifecycle state.
    pub fn link_state(&self) -> LinkState {
        self.sync.link_state()
    }

    /// Register an application handler.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        self.sync.subscribe(kind, handler)
    }

    /// Register a handler dropped on the next disconnect.
    pub fn subscribe_session<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        self.sync.subscribe_session(kind, handler)
    }

    /// Remove a registration.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.sync.unsubscribe(id)
    }

    /// Seed the session from a lobby ticket.
    pub fn seed(&self, ticket: &SessionTicket, role: Role, local_name: &str) {
        self.sync.seed(ticket, role, local_name);
    }

    /// Open the link.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connection`] if the first open fails. Background
    /// reconnection stays scheduled and runs on later [`Self::step`] calls.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let actions = self.sync.connect(self.env.now());
        self.execute(actions).await
    }

    /// Close the link and stop reconnecting.
    pub async fn disconnect(&mut self) {
        let actions = self.sync.disconnect();
        // Close never fails.
        let _ = self.execute(actions).await;
    }

    /// Join the realtime room of a session and wait for confirmation.
    ///
    /// # Errors
    ///
    /// Any [`CallError`], wrapped in [`ClientError::Call`].
    pub async fn join_session(
        &mut self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<RoomJoined, ClientError> {
        let (mut handle, action) =
            self.sync.join_session(session_id, participant_id, self.env.now())?;
        self.execute(vec![action]).await?;
        self.drive_until(&mut handle).await
    }

    /// Join the room of the seeded session and wait for confirmation.
    ///
    /// # Errors
    ///
    /// Any [`CallError`], wrapped in [`ClientError::Call`].
    pub async fn join_current(&mut self) -> Result<RoomJoined, ClientError> {
        let (mut handle, action) = self.sync.join_current(self.env.now())?;
        self.execute(vec![action]).await?;
        self.drive_until(&mut handle).await
    }

    /// Submit a move and wait for the authority's verdict.
    ///
    /// # Errors
    ///
    /// Any [`CallError`], wrapped in [`ClientError::Call`]. A rejected move is
    /// [`CallError::RemoteRejected`].
    pub async fn submit_move(&mut self, played_move: &str) -> Result<BoardUpdated, ClientError> {
        let (mut handle, action) = self.sync.submit_move(played_move, self.env.now())?;
        self.execute(vec![action]).await?;
        self.drive_until(&mut handle).await
    }

    /// Leave the current session. Fire-and-forget.
    pub async fn leave_session(&mut self) {
        if let Some(action) = self.sync.leave_session() {
            let _ = self.execute(vec![action]).await;
        }
    }

    /// Disconnect and release all core subscriptions.
    pub async fn shutdown(mut self) {
        let actions = self.sync.teardown();
        let _ = self.execute(actions).await;
    }

    /// Process one inbound event or one timer expiry.
    ///
    /// Equivalent to [`Self::wait`] followed by [`Self::handle`]. Drivers that
    /// race the client against other input should call those two separately,
    /// since only the wait is cancel-safe.
    ///
    /// # Errors
    ///
    /// Propagates failures of actions triggered by the step. Reconnect
    /// failures are absorbed by the core and never returned here.
    pub async fn step(&mut self) -> Result<Step, ClientError> {
        match self.wait().await {
            Some(wakeup) => {
                self.handle(wakeup).await?;
                Ok(Step::Progressed)
            },
            None => Ok(Step::Idle),
        }
    }

    /// Wait for the next inbound event or due timer.
    ///
    /// Returns `None` at once when nothing can happen: no link and no timer
    /// armed. Cancel-safe: dropping the future loses nothing.
    pub async fn wait(&mut self) -> Option<Wakeup> {
        let connected = self.sync.link_state() == LinkState::Connected;
        match (connected, self.sync.next_wakeup()) {
            (true, Some(at)) => {
                let delay = self.env.until(at);
                tokio::select! {
                    biased;
                    event = self.transport.recv() => Some(Wakeup::Transport(event)),
                    () = self.env.sleep(delay) => Some(Wakeup::Timer),
                }
            },
            (true, None) => Some(Wakeup::Transport(self.transport.recv().await)),
            (false, Some(at)) => {
                self.env.sleep(self.env.until(at)).await;
                Some(Wakeup::Timer)
            },
            (false, None) => None,
        }
    }

    /// Feed a wakeup into the core and execute the resulting actions.
    ///
    /// # Errors
    ///
    /// As [`Self::step`].
    pub async fn handle(&mut self, wakeup: Wakeup) -> Result<(), ClientError> {
        match wakeup {
            Wakeup::Transport(TransportEvent::Inbound(inbound)) => {
                self.sync.handle_inbound(inbound);
            },
            Wakeup::Transport(TransportEvent::Closed { reason }) => {
                let now = self.env.now();
                self.sync.on_transport_dropped(&reason, now);
            },
            Wakeup::Timer => {},
        }

        let actions = self.sync.tick(self.env.now());
        self.execute(actions).await
    }

    /// Step until `handle` settles.
    ///
    /// # Errors
    ///
    /// The call's own error, or [`CallError::ConnectionLost`] if the client
    /// goes idle first.
    pub async fn drive_until<V>(&mut self, handle: &mut CallHandle<V>) -> Result<V, ClientError> {
        loop {
            if let Some(result) = handle.try_result() {
                return result.map_err(ClientError::from);
            }
            if self.step().await? == Step::Idle {
                let result = handle.try_result().unwrap_or(Err(CallError::ConnectionLost));
                return result.map_err(ClientError::from);
            }
        }
    }

    async fn execute(&mut self, actions: Vec<LinkAction>) -> Result<(), ClientError> {
        for action in actions {
            match action {
                LinkAction::Open => self.open().await?,
                LinkAction::Send(message) => {
                    if let Err(e) = self.transport.send(&message).await {
                        warn!(message = message.name(), error = %e, "send failed");
                        let now = self.env.now();
                        self.sync.on_transport_dropped(&e.to_string(), now);
                    }
                },
                LinkAction::Close => self.transport.close().await,
            }
        }
        Ok(())
    }

    async fn open(&mut self) -> Result<(), ClientError> {
        match self.transport.open().await {
            Ok(()) => {
                for action in self.sync.on_open_succeeded() {
                    debug!(?action, "post-open action");
                    if action == LinkAction::Close {
                        self.transport.close().await;
                    }
                }
                Ok(())
            },
            Err(e) => {
                let now = self.env.now();
                self.sync.on_open_failed(&e.to_string(), now)?;
                Ok(())
            },
        }
    }
}
