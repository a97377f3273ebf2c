//! Session store: owns the current snapshot and publishes changes.

use std::{cell::RefCell, fmt, rc::Rc};

use duelsync_proto::{InboundEvent, Role, SessionTicket};
use tracing::{debug, trace};

use super::{Session, reduce};
use crate::{
    dispatcher::{Dispatcher, SubscriptionId, WeakDispatcher},
    event::{Event, EventKind},
};

type Current = Rc<RefCell<Rc<Session>>>;

/// Holds the one live [`Session`] and keeps it in sync with inbound events.
///
/// Every change replaces the snapshot as a whole and is announced as an
/// [`Event::Session`] under [`EventKind::SessionChanged`]. Readers never see a
/// partially applied event.
pub struct SessionStore {
    dispatcher: Dispatcher<Event>,
    current: Current,
    subscriptions: Vec<SubscriptionId>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &self.current.borrow().status)
            .field("attached", &!self.subscriptions.is_empty())
            .finish()
    }
}

impl SessionStore {
    /// Create an idle store listening to every inbound event kind.
    pub fn attach(dispatcher: &Dispatcher<Event>) -> Self {
        let current: Current = Rc::new(RefCell::new(Rc::new(Session::default())));
        let subscriptions = EventKind::INBOUND
            .iter()
            .map(|&kind| {
                let current = Rc::clone(&current);
                let weak = dispatcher.downgrade();
                dispatcher.subscribe(kind, move |event: &Event| {
                    if let Some(inbound) = event.as_inbound() {
                        apply(&current, &weak, inbound);
                    }
                    Ok(())
                })
            })
            .collect();

        Self { dispatcher: dispatcher.clone(), current, subscriptions }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Rc<Session> {
        Rc::clone(&self.current.borrow())
    }

    /// Replace the session with one seeded from a lobby ticket.
    pub fn seed(&self, ticket: &SessionTicket, role: Role, local_name: &str) {
        debug!(session = %ticket.session_id, ?role, "session seeded");
        self.replace(Session::seeded(ticket, role, local_name));
    }

    /// Return to the idle session.
    pub fn reset(&self) {
        debug!("session reset");
        self.replace(Session::default());
    }

    /// Stop following inbound events. The last snapshot stays readable.
    pub fn detach(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.dispatcher.unsubscribe(id);
        }
    }

    fn replace(&self, session: Session) {
        let next = Rc::new(session);
        *self.current.borrow_mut() = Rc::clone(&next);
        self.dispatcher.publish(Event::Session(next));
    }
}

fn apply(current: &Current, dispatcher: &WeakDispatcher<Event>, event: &InboundEvent) {
    let previous = Rc::clone(&current.borrow());
    let next = reduce(Session::clone(&previous), event);
    if next == *previous {
        trace!(event = event.name(), "session unchanged");
        return;
    }

    debug!(event = event.name(), status = %next.status, moves = next.move_log.len(), "session updated");
    let next = Rc::new(next);
    *current.borrow_mut() = Rc::clone(&next);
    if let Some(dispatcher) = dispatcher.upgrade() {
        dispatcher.publish(Event::Session(next));
    }
}

#[cfg(test)]
mod tests {
    use duelsync_proto::{GameError, Seat, SessionStatus};

    use super::*;

    fn ticket() -> SessionTicket {
        SessionTicket {
            session_id: "s1".into(),
            board_encoding: "start".into(),
            seat: Seat::First,
            participant_id: "p1".into(),
            join_token: Some("tok".into()),
            status: SessionStatus::Waiting,
        }
    }

    fn watch(dispatcher: &Dispatcher<Event>) -> Rc<RefCell<Vec<Rc<Session>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        dispatcher.subscribe(EventKind::SessionChanged, move |event| {
            if let Some(session) = event.as_session() {
                sink.borrow_mut().push(Rc::clone(session));
            }
            Ok(())
        });
        seen
    }

    #[test]
    fn inbound_event_publishes_new_snapshot() {
        let dispatcher = Dispatcher::new();
        let store = SessionStore::attach(&dispatcher);
        let seen = watch(&dispatcher);

        dispatcher.publish(Event::Remote(InboundEvent::GameError(GameError {
            message: "room full".into(),
        })));

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(store.snapshot().last_error.as_deref(), Some("room full"));
        assert!(Rc::ptr_eq(&seen.borrow()[0], &store.snapshot()));
    }

    #[test]
    fn unchanged_session_is_not_republished() {
        let dispatcher = Dispatcher::new();
        let store = SessionStore::attach(&dispatcher);
        let seen = watch(&dispatcher);
        let before = store.snapshot();

        dispatcher.publish(Event::Remote(InboundEvent::ParticipantReconnected(Default::default())));

        assert!(seen.borrow().is_empty());
        assert!(Rc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn seed_and_reset_publish() {
        let dispatcher = Dispatcher::new();
        let store = SessionStore::attach(&dispatcher);
        let seen = watch(&dispatcher);

        store.seed(&ticket(), Role::Initiator, "alice");
        assert_eq!(store.snapshot().status, SessionStatus::Waiting);
        assert_eq!(store.snapshot().join_token.as_deref(), Some("tok"));

        store.reset();
        assert_eq!(*store.snapshot(), Session::default());
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn old_snapshots_stay_immutable() {
        let dispatcher = Dispatcher::new();
        let store = SessionStore::attach(&dispatcher);
        store.seed(&ticket(), Role::Initiator, "alice");
        let held = store.snapshot();

        dispatcher.publish(Event::Remote(InboundEvent::GameError(GameError {
            message: "late".into(),
        })));

        assert_eq!(held.last_error, None);
        assert_eq!(store.snapshot().last_error.as_deref(), Some("late"));
    }

    #[test]
    fn detached_store_ignores_events() {
        let dispatcher = Dispatcher::new();
        let mut store = SessionStore::attach(&dispatcher);
        store.detach();

        dispatcher.publish(Event::Remote(InboundEvent::GameError(GameError::default())));

        assert_eq!(store.snapshot().last_error, None);
        assert_eq!(dispatcher.subscriber_count(EventKind::GameError), 0);
    }
}
