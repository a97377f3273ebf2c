//! Link lifecycle state machine.
//!
//! Owns the status of the single realtime link to the authority: explicit
//! connect and disconnect, drop detection and bounded reconnection with
//! exponential backoff. It follows the action pattern: methods take the
//! current time and return [`LinkAction`]s for the driver to execute. No I/O,
//! no timers.
//!
//! # State machine
//!
//! ```text
//! ┌──────────────┐ connect  ┌────────────┐ opened ┌───────────┐
//! │ Disconnected │─────────>│ Connecting │───────>│ Connected │
//! └──────────────┘          └────────────┘        └───────────┘
//!        ^                        │ failed          │      ^
//!        │ disconnect             v         dropped │      │ opened
//!        │                  ┌──────────────┐<───────┘      │
//!        └──────────────────│ Reconnecting │───────────────┘
//!                           └──────────────┘
//!                                 │ attempts exhausted
//!                                 v
//!                           ┌──────────┐
//!                           │  Failed  │
//!                           └──────────┘
//! ```
//!
//! Each status transition is published on the dispatcher as a
//! [`ConnectionChange`] under [`EventKind::ConnectionChanged`].

use duelsync_proto::OutboundMessage;
use tracing::{debug, info, warn};

use crate::{
    backoff::ReconnectPolicy,
    dispatcher::{Dispatcher, HandlerResult, SubscriptionId},
    env::Timepoint,
    error::ConnectionError,
    event::{ConnectionChange, Event, EventKind},
};

/// Link lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No link and no reconnection scheduled.
    Disconnected,
    /// First open in progress.
    Connecting,
    /// Link usable.
    Connected,
    /// Link lost; waiting for or running a reconnection attempt.
    Reconnecting,
    /// Reconnection exhausted. Only an explicit connect leaves this state.
    Failed,
}

/// I/O the driver must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Open the transport and report the outcome back.
    Open,
    /// Send one message over the open transport.
    Send(OutboundMessage),
    /// Close the transport if it is open.
    Close,
}

/// Snapshot of link status for the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// True while the link is usable.
    pub connected: bool,
    /// Most recent transport error.
    pub last_error: Option<String>,
    /// Attempt counter of the current reconnection cycle. Zero when connected.
    pub reconnect_attempt: u32,
}

/// Connection manager.
///
/// Generic over the instant type so tests can drive it with virtual time.
#[derive(Debug)]
pub struct ConnectionManager<I: Timepoint> {
    dispatcher: Dispatcher<Event>,
    policy: ReconnectPolicy,
    state: LinkState,
    status: ConnectionStatus,
    next_attempt_at: Option<I>,
    session_subscriptions: Vec<SubscriptionId>,
}

impl<I: Timepoint> ConnectionManager<I> {
    /// Create a disconnected manager publishing on `dispatcher`.
    pub fn new(dispatcher: Dispatcher<Event>, policy: ReconnectPolicy) -> Self {
        Self {
            dispatcher,
            policy,
            state: LinkState::Disconnected,
            status: ConnectionStatus::default(),
            next_attempt_at: None,
            session_subscriptions: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// True while the link is usable.
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Status snapshot.
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Backoff policy in effect.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// When the next reconnection attempt is due.
    pub fn next_wakeup(&self) -> Option<I> {
        self.next_attempt_at
    }

    /// Start opening the link.
    ///
    /// Idempotent while connected or connecting. From any other state it
    /// cancels a scheduled reconnection and starts a fresh attempt cycle.
    pub fn connect(&mut self, _now: I) -> Vec<LinkAction> {
        match self.state {
            LinkState::Connected | LinkState::Connecting => {
                debug!(state = ?self.state, "connect ignored");
                Vec::new()
            },
            LinkState::Disconnected | LinkState::Reconnecting | LinkState::Failed => {
                self.state = LinkState::Connecting;
                self.status.reconnect_attempt = 0;
                self.next_attempt_at = None;
                debug!("opening link");
                vec![LinkAction::Open]
            },
        }
    }

    /// Report that the transport opened.
    pub fn on_open_succeeded(&mut self) -> Vec<LinkAction> {
        match self.state {
            LinkState::Connecting | LinkState::Reconnecting => {
                let reconnected = self.status.reconnect_attempt > 0;
                self.state = LinkState::Connected;
                self.status = ConnectionStatus { connected: true, ..ConnectionStatus::default() };
                self.next_attempt_at = None;
                info!(reconnected, "link connected");
                self.publish(ConnectionChange::Connected { reconnected });
                Vec::new()
            },
            LinkState::Disconnected | LinkState::Failed => {
                debug!(state = ?self.state, "open completed after link was abandoned, closing");
                vec![LinkAction::Close]
            },
            LinkState::Connected => Vec::new(),
        }
    }

    /// Report that opening the transport failed.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ConnectFailed`] if this was the first attempt
    /// after an explicit connect. Background reconnection is still scheduled.
    pub fn on_open_failed(&mut self, reason: &str, now: I) -> Result<(), ConnectionError> {
        match self.state {
            LinkState::Connecting => {
                warn!(reason, "connect failed");
                self.status.last_error = Some(reason.to_owned());
                self.schedule_retry(now);
                Err(ConnectionError::ConnectFailed { reason: reason.to_owned() })
            },
            LinkState::Reconnecting => {
                warn!(attempt = self.status.reconnect_attempt, reason, "reconnect attempt failed");
                self.status.last_error = Some(reason.to_owned());
                self.schedule_retry(now);
                Ok(())
            },
            LinkState::Disconnected | LinkState::Connected | LinkState::Failed => {
                debug!(state = ?self.state, reason, "stale open failure ignored");
                Ok(())
            },
        }
    }

    /// Report that an established link was lost.
    ///
    /// Ignored unless connected, so a drop during an explicit disconnect never
    /// starts a reconnection.
    pub fn on_transport_dropped(&mut self, reason: &str, now: I) {
        if self.state != LinkState::Connected {
            debug!(state = ?self.state, reason, "drop ignored");
            return;
        }

        warn!(reason, "link dropped");
        self.status.connected = false;
        self.status.last_error = Some(reason.to_owned());
        self.publish(ConnectionChange::Dropped { reason: reason.to_owned() });
        self.schedule_retry(now);
    }

    /// Advance timers. Starts a reconnection attempt when one is due.
    pub fn tick(&mut self, now: I) -> Vec<LinkAction> {
        if self.state != LinkState::Reconnecting {
            return Vec::new();
        }
        match self.next_attempt_at {
            Some(at) if now >= at => {
                self.next_attempt_at = None;
                self.status.reconnect_attempt += 1;
                let attempt = self.status.reconnect_attempt;
                info!(attempt, max = self.policy.max_attempts, "reconnecting");
                self.publish(ConnectionChange::Reconnecting { attempt });
                vec![LinkAction::Open]
            },
            _ => Vec::new(),
        }
    }

    /// Close the link and stop reconnecting.
    ///
    /// Idempotent. Publishes [`ConnectionChange::Disconnected`] and then drops
    /// every session-scoped subscription.
    pub fn disconnect(&mut self) -> Vec<LinkAction> {
        let actions = if self.state == LinkState::Disconnected {
            Vec::new()
        } else {
            self.state = LinkState::Disconnected;
            self.status.connected = false;
            self.status.reconnect_attempt = 0;
            self.next_attempt_at = None;
            info!("link disconnected");
            self.publish(ConnectionChange::Disconnected);
            vec![LinkAction::Close]
        };

        let cleared = self.session_subscriptions.len();
        for id in self.session_subscriptions.drain(..) {
            self.dispatcher.unsubscribe(id);
        }
        if cleared > 0 {
            debug!(cleared, "session subscriptions cleared");
        }
        actions
    }

    /// Register a handler that lives until the next [`Self::disconnect`].
    pub fn subscribe_session<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        let id = self.dispatcher.subscribe(kind, handler);
        self.session_subscriptions.push(id);
        id
    }

    fn schedule_retry(&mut self, now: I) {
        if self.status.reconnect_attempt >= self.policy.max_attempts {
            self.state = LinkState::Failed;
            self.next_attempt_at = None;
            warn!(attempts = self.status.reconnect_attempt, "reconnection exhausted");
            self.publish(ConnectionChange::ReconnectFailed);
            return;
        }

        let next = self.status.reconnect_attempt + 1;
        let delay = self.policy.delay_for_attempt(next);
        self.state = LinkState::Reconnecting;
        self.next_attempt_at = Some(now + delay);
        debug!(attempt = next, ?delay, "reconnect scheduled");
    }

    fn publish(&self, change: ConnectionChange) {
        self.dispatcher.publish(Event::Connection(change));
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use super::*;

    type T = Duration;

    fn t(ms: u64) -> T {
        Duration::from_millis(ms)
    }

    fn manager() -> (ConnectionManager<T>, Rc<RefCell<Vec<ConnectionChange>>>) {
        let dispatcher = Dispatcher::new();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        dispatcher.subscribe(EventKind::ConnectionChanged, move |event: &Event| {
            if let Some(change) = event.as_connection() {
                sink.borrow_mut().push(change.clone());
            }
            Ok(())
        });
        (ConnectionManager::new(dispatcher, ReconnectPolicy::default()), changes)
    }

    fn connected() -> (ConnectionManager<T>, Rc<RefCell<Vec<ConnectionChange>>>) {
        let (mut link, changes) = manager();
        assert_eq!(link.connect(t(0)), vec![LinkAction::Open]);
        link.on_open_succeeded();
        changes.borrow_mut().clear();
        (link, changes)
    }

    #[test]
    fn connect_is_idempotent() {
        let (mut link, changes) = manager();

        assert_eq!(link.connect(t(0)), vec![LinkAction::Open]);
        assert!(link.connect(t(1)).is_empty());
        assert!(link.on_open_succeeded().is_empty());
        assert!(link.connect(t(2)).is_empty());

        assert!(link.is_connected());
        assert_eq!(*changes.borrow(), vec![ConnectionChange::Connected { reconnected: false }]);
    }

    #[test]
    fn first_connect_failure_errors_but_keeps_retrying() {
        let (mut link, _) = manager();
        link.connect(t(0));

        let err = link.on_open_failed("refused", t(0)).unwrap_err();

        assert_eq!(err, ConnectionError::ConnectFailed { reason: "refused".into() });
        assert_eq!(link.state(), LinkState::Reconnecting);
        assert_eq!(link.next_wakeup(), Some(t(1_000)));
        assert_eq!(link.status().last_error.as_deref(), Some("refused"));
    }

    #[test]
    fn drop_schedules_backoff_and_exhausts() {
        let (mut link, changes) = connected();

        link.on_transport_dropped("reset", t(0));
        let mut now = t(0);
        let mut delays = Vec::new();
        while let Some(at) = link.next_wakeup() {
            delays.push(at - now);
            now = at;
            assert_eq!(link.tick(now), vec![LinkAction::Open]);
            link.on_open_failed("refused", now).unwrap();
        }

        let expected: Vec<_> = [1, 2, 4, 8, 16].into_iter().map(Duration::from_secs).collect();
        assert_eq!(delays, expected);
        assert_eq!(link.state(), LinkState::Failed);

        let changes = changes.borrow();
        assert_eq!(changes.first(), Some(&ConnectionChange::Dropped { reason: "reset".into() }));
        assert_eq!(changes.last(), Some(&ConnectionChange::ReconnectFailed));
        let attempts: Vec<_> = changes.iter().filter_map(ConnectionChange::attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn tick_before_deadline_does_nothing() {
        let (mut link, _) = connected();
        link.on_transport_dropped("reset", t(0));

        assert!(link.tick(t(999)).is_empty());
        assert_eq!(link.status().reconnect_attempt, 0);
        assert_eq!(link.tick(t(1_000)), vec![LinkAction::Open]);
        assert_eq!(link.status().reconnect_attempt, 1);
    }

    #[test]
    fn successful_reconnect_resets_counter() {
        let (mut link, changes) = connected();
        link.on_transport_dropped("reset", t(0));
        link.tick(t(1_000));
        link.on_open_failed("refused", t(1_000)).unwrap();
        link.tick(t(3_000));

        link.on_open_succeeded();

        assert!(link.is_connected());
        assert_eq!(link.status().reconnect_attempt, 0);
        assert_eq!(link.status().last_error, None);
        assert_eq!(changes.borrow().last(), Some(&ConnectionChange::Connected { reconnected: true }));
    }

    #[test]
    fn disconnect_stops_reconnection_and_is_idempotent() {
        let (mut link, changes) = connected();
        link.on_transport_dropped("reset", t(0));

        assert_eq!(link.disconnect(), vec![LinkAction::Close]);
        assert!(link.disconnect().is_empty());
        assert!(link.tick(t(60_000)).is_empty());
        assert_eq!(link.next_wakeup(), None);

        let disconnects =
            changes.borrow().iter().filter(|c| **c == ConnectionChange::Disconnected).count();
        assert_eq!(disconnects, 1);
    }

    #[test]
    fn drop_after_disconnect_does_not_reconnect() {
        let (mut link, changes) = connected();
        link.disconnect();
        changes.borrow_mut().clear();

        link.on_transport_dropped("closed by us", t(0));

        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn late_open_after_disconnect_is_closed() {
        let (mut link, _) = manager();
        link.connect(t(0));
        link.disconnect();

        assert_eq!(link.on_open_succeeded(), vec![LinkAction::Close]);
        assert_eq!(link.state(), LinkState::Disconnected);
    }

    #[test]
    fn disconnect_clears_session_subscriptions() {
        let (mut link, _) = connected();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let id = link.subscribe_session(EventKind::ConnectionChanged, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        link.disconnect();

        assert!(!link.dispatcher.is_subscribed(id));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn zero_attempt_policy_fails_immediately() {
        let dispatcher = Dispatcher::new();
        let mut link: ConnectionManager<T> =
            ConnectionManager::new(dispatcher, ReconnectPolicy::disabled());
        link.connect(t(0));
        link.on_open_succeeded();

        link.on_transport_dropped("reset", t(0));

        assert_eq!(link.state(), LinkState::Failed);
        assert_eq!(link.next_wakeup(), None);
    }
}
