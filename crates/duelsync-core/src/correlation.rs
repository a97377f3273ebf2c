//! Request correlation over a fire-and-forget event channel.
//!
//! The authority answers requests with ordinary broadcast events that carry no
//! mandatory correlation id. A call registers two temporary subscriptions, one
//! for the success event and one for the error event, sends its message and
//! settles exactly once:
//!
//! - the first matching success or error event,
//! - the deadline passing ([`CallError::Timeout`]),
//! - the link going away ([`CallError::ConnectionLost`]).
//!
//! Whichever comes first wins. The temporary subscriptions are removed on every
//! outcome.
//!
//! Concurrent calls of the same kind are matched first-in first-out: one
//! delivery of an inbound event settles at most one call, the oldest pending
//! one whose matcher accepts it. When the authority echoes the call's
//! [`RequestId`], matching is exact.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fmt,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll},
    time::Duration,
};

use duelsync_proto::{
    BoardUpdated, InboundEvent, OutboundMessage, RequestId, RoomJoined, SessionId,
};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::{
    dispatcher::{DeliveryId, Dispatcher, SubscriptionId, WeakDispatcher},
    env::Timepoint,
    error::CallError,
    event::{Event, EventKind},
    link::{LinkAction, LinkState},
};

/// Identifier of one correlated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Event predicate that extracts a value from matching events.
pub struct Matcher<T> {
    kind: EventKind,
    extract: Box<dyn Fn(&Event) -> Option<T>>,
}

impl<T> Matcher<T> {
    /// Match events of `kind` for which `extract` returns a value.
    pub fn new<F>(kind: EventKind, extract: F) -> Self
    where
        F: Fn(&Event) -> Option<T> + 'static,
    {
        Self { kind, extract: Box::new(extract) }
    }

    /// Kind this matcher listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl<T> fmt::Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Description of one correlated call.
#[derive(Debug)]
pub struct CallSpec<T> {
    /// Call kind, for logs and timeout errors.
    pub label: &'static str,
    /// Settles the call with a value.
    pub success: Matcher<T>,
    /// Settles the call with [`CallError::RemoteRejected`].
    pub failure: Matcher<String>,
    /// Deadline relative to the send.
    pub timeout: Duration,
}

/// Join call: settles on `room_joined` for the same session, or on `error`.
pub fn join_session_spec(session_id: SessionId, timeout: Duration) -> CallSpec<RoomJoined> {
    CallSpec {
        label: "join_session",
        success: Matcher::new(EventKind::RoomJoined, move |event| match event.as_inbound() {
            Some(InboundEvent::RoomJoined(joined)) if joined.session_id == session_id => {
                Some(joined.clone())
            },
            _ => None,
        }),
        failure: Matcher::new(EventKind::GameError, |event| match event.as_inbound() {
            Some(InboundEvent::GameError(e)) => Some(non_empty(&e.message, "failed to join")),
            _ => None,
        }),
        timeout,
    }
}

/// Move call: settles on `board_updated` or `move_error` for the same session.
///
/// A reply echoing a different request id never matches. A board update
/// without an echo matches only if it carries `played_move`, so the
/// opponent's broadcast never confirms a local move. A move error without an
/// echo matches the oldest pending move.
pub fn submit_move_spec(
    session_id: SessionId,
    request_id: RequestId,
    played_move: String,
    timeout: Duration,
) -> CallSpec<BoardUpdated> {
    let failure_session = session_id.clone();
    CallSpec {
        label: "submit_move",
        success: Matcher::new(EventKind::BoardUpdated, move |event| match event.as_inbound() {
            Some(InboundEvent::BoardUpdated(update))
                if update.session_id == session_id
                    && confirms_move(update, request_id, &played_move) =>
            {
                Some(update.clone())
            },
            _ => None,
        }),
        failure: Matcher::new(EventKind::MoveError, move |event| match event.as_inbound() {
            Some(InboundEvent::MoveError(e))
                if e.session_id == failure_session && echo_matches(e.request_id, request_id) =>
            {
                Some(non_empty(&e.message, "invalid move"))
            },
            _ => None,
        }),
        timeout,
    }
}

fn echo_matches(echoed: Option<RequestId>, ours: RequestId) -> bool {
    echoed.is_none_or(|id| id == ours)
}

fn confirms_move(update: &BoardUpdated, ours: RequestId, played_move: &str) -> bool {
    match update.request_id {
        Some(id) => id == ours,
        None => update.played_move.as_deref() == Some(played_move),
    }
}

fn non_empty(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() { fallback.to_owned() } else { message.to_owned() }
}

type Reply<T> = Result<T, CallError>;
type ReplySlot<T> = Rc<RefCell<Option<oneshot::Sender<Reply<T>>>>>;

struct PendingCall<I> {
    label: &'static str,
    timeout: Duration,
    deadline: I,
    subscriptions: [SubscriptionId; 2],
    reject: Box<dyn FnOnce(CallError)>,
}

struct Calls<I> {
    pending: RefCell<BTreeMap<CallId, PendingCall<I>>>,
    claimed: RefCell<Vec<DeliveryId>>,
    next_id: Cell<u64>,
}

impl<I> Calls<I> {
    /// Remove `id` from the pending set if the current delivery is unclaimed.
    ///
    /// Returns true if the caller won the right to settle the call.
    fn settle(&self, dispatcher: &Dispatcher<Event>, id: CallId) -> bool {
        let delivery = dispatcher.current_delivery();
        if let Some(delivery) = delivery {
            let mut claimed = self.claimed.borrow_mut();
            claimed.retain(|d| dispatcher.is_delivering(*d));
            if claimed.contains(&delivery) {
                trace!(call = %id, "delivery already settled another call");
                return false;
            }
        }

        let Some(call) = self.pending.borrow_mut().remove(&id) else {
            return false;
        };
        if let Some(delivery) = delivery {
            self.claimed.borrow_mut().push(delivery);
        }
        for sub in call.subscriptions {
            dispatcher.unsubscribe(sub);
        }
        debug!(call = %id, label = call.label, "call settled");
        true
    }

    fn fail_all(&self, dispatcher: &Dispatcher<Event>, error: &CallError) {
        let drained = std::mem::take(&mut *self.pending.borrow_mut());
        if drained.is_empty() {
            return;
        }
        warn!(count = drained.len(), %error, "failing pending calls");
        for (_, call) in drained {
            for sub in call.subscriptions {
                dispatcher.unsubscribe(sub);
            }
            (call.reject)(error.clone());
        }
    }
}

/// Correlation layer.
///
/// Pending calls live in this component; replies arrive through the shared
/// dispatcher. Generic over the instant type for simulated time.
pub struct Correlator<I: Timepoint> {
    dispatcher: Dispatcher<Event>,
    calls: Rc<Calls<I>>,
    link_subscription: Option<SubscriptionId>,
}

impl<I: Timepoint> fmt::Debug for Correlator<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator").field("pending", &self.pending_count()).finish()
    }
}

impl<I: Timepoint> Correlator<I> {
    /// Create a correlator. Pending calls fail with
    /// [`CallError::ConnectionLost`] whenever the link goes away.
    pub fn new(dispatcher: Dispatcher<Event>) -> Self {
        let calls = Rc::new(Calls {
            pending: RefCell::new(BTreeMap::new()),
            claimed: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        });

        let weak_calls = Rc::downgrade(&calls);
        let weak_dispatcher = dispatcher.downgrade();
        let link_subscription =
            dispatcher.subscribe(EventKind::ConnectionChanged, move |event: &Event| {
                let Some(change) = event.as_connection() else {
                    return Ok(());
                };
                if !change.ends_link() {
                    return Ok(());
                }
                if let (Some(calls), Some(dispatcher)) =
                    (weak_calls.upgrade(), weak_dispatcher.upgrade())
                {
                    calls.fail_all(&dispatcher, &CallError::ConnectionLost);
                }
                Ok(())
            });

        Self { dispatcher, calls, link_subscription: Some(link_subscription) }
    }

    /// Number of calls awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.calls.pending.borrow().len()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.calls.pending.borrow().values().map(|c| c.deadline).min()
    }

    /// Start a call.
    ///
    /// Checks run in order: link connected, message valid. Only then are the
    /// reply subscriptions registered and the deadline armed. On success the
    /// returned [`LinkAction::Send`] must be executed by the driver.
    ///
    /// # Errors
    ///
    /// - [`CallError::NotConnected`] if `link` is not connected.
    /// - [`CallError::InvalidParams`] if the message fails validation.
    pub fn call<T: 'static>(
        &self,
        link: LinkState,
        message: OutboundMessage,
        spec: CallSpec<T>,
        now: I,
    ) -> Result<(CallHandle<T>, LinkAction), CallError> {
        if link != LinkState::Connected {
            debug!(label = spec.label, ?link, "call refused, link not connected");
            return Err(CallError::NotConnected);
        }
        message.validate().map_err(|e| CallError::InvalidParams { reason: e.to_string() })?;

        let id = CallId(self.calls.next_id.get());
        self.calls.next_id.set(id.0 + 1);

        let (tx, rx) = oneshot::channel();
        let slot: ReplySlot<T> = Rc::new(RefCell::new(Some(tx)));

        let success_sub = self.arm(id, spec.success, Rc::clone(&slot), Ok);
        let failure_sub = self.arm(id, spec.failure, Rc::clone(&slot), |message| {
            Err(CallError::RemoteRejected { message })
        });

        let reject_slot = Rc::clone(&slot);
        self.calls.pending.borrow_mut().insert(id, PendingCall {
            label: spec.label,
            timeout: spec.timeout,
            deadline: now + spec.timeout,
            subscriptions: [success_sub, failure_sub],
            reject: Box::new(move |error| send_reply(&reject_slot, Err(error))),
        });

        debug!(call = %id, label = spec.label, message = message.name(), "call sent");
        Ok((CallHandle { id, rx }, LinkAction::Send(message)))
    }

    /// Reject every call whose deadline has passed.
    pub fn tick(&self, now: I) {
        let expired: Vec<CallId> = self
            .calls
            .pending
            .borrow()
            .iter()
            .filter(|(_, call)| now >= call.deadline)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            let Some(call) = self.calls.pending.borrow_mut().remove(&id) else {
                continue;
            };
            for sub in call.subscriptions {
                self.dispatcher.unsubscribe(sub);
            }
            warn!(call = %id, label = call.label, timeout = ?call.timeout, "call timed out");
            (call.reject)(CallError::Timeout { label: call.label, after: call.timeout });
        }
    }

    /// Reject every pending call with `error`.
    pub fn fail_all(&self, error: &CallError) {
        self.calls.fail_all(&self.dispatcher, error);
    }

    /// Fail pending calls and stop listening for link changes.
    pub fn teardown(&mut self) {
        self.fail_all(&CallError::ConnectionLost);
        if let Some(id) = self.link_subscription.take() {
            self.dispatcher.unsubscribe(id);
        }
    }

    fn arm<V: 'static, T: 'static>(
        &self,
        id: CallId,
        matcher: Matcher<V>,
        slot: ReplySlot<T>,
        into_reply: impl Fn(V) -> Reply<T> + 'static,
    ) -> SubscriptionId {
        let calls: Weak<Calls<I>> = Rc::downgrade(&self.calls);
        let dispatcher: WeakDispatcher<Event> = self.dispatcher.downgrade();
        let Matcher { kind, extract } = matcher;

        self.dispatcher.subscribe(kind, move |event: &Event| {
            let Some(value) = extract(event) else {
                return Ok(());
            };
            let (Some(calls), Some(dispatcher)) = (calls.upgrade(), dispatcher.upgrade()) else {
                return Ok(());
            };
            if calls.settle(&dispatcher, id) {
                send_reply(&slot, into_reply(value));
            }
            Ok(())
        })
    }
}

fn send_reply<T>(slot: &ReplySlot<T>, reply: Reply<T>) {
    if let Some(tx) = slot.borrow_mut().take() {
        if tx.send(reply).is_err() {
            trace!("call handle dropped before the reply arrived");
        }
    }
}

/// Awaitable result of a correlated call.
///
/// Resolves exactly once. Dropping the handle does not cancel the call; it
/// still settles and cleans up its subscriptions.
#[derive(Debug)]
pub struct CallHandle<T> {
    id: CallId,
    rx: oneshot::Receiver<Reply<T>>,
}

impl<T> CallHandle<T> {
    /// Identifier of the call.
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Outcome if the call has settled, without waiting.
    ///
    /// Returns the outcome once; later calls report
    /// [`CallError::ConnectionLost`].
    pub fn try_result(&mut self) -> Option<Reply<T>> {
        match self.rx.try_recv() {
            Ok(reply) => Some(reply),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CallError::ConnectionLost)),
        }
    }
}

impl<T> Future for CallHandle<T> {
    type Output = Reply<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CallError::ConnectionLost)))
    }
}

#[cfg(test)]
mod tests {
    use duelsync_proto::{
        GameError, JoinSession, MoveError, ParticipantId, Role, Seat, SessionStatus, SubmitMove,
    };

    use super::*;
    use crate::event::ConnectionChange;

    type T = Duration;

    fn ms(ms: u64) -> T {
        Duration::from_millis(ms)
    }

    fn setup() -> (Dispatcher<Event>, Correlator<T>) {
        let dispatcher = Dispatcher::new();
        let correlator = Correlator::new(dispatcher.clone());
        (dispatcher, correlator)
    }

    fn join_message(session: &str) -> OutboundMessage {
        OutboundMessage::JoinSession(JoinSession {
            session_id: session.into(),
            participant_id: ParticipantId::new("p1"),
        })
    }

    fn move_message(session: &str, mv: &str, request_id: RequestId) -> OutboundMessage {
        OutboundMessage::SubmitMove(SubmitMove {
            session_id: session.into(),
            participant_id: ParticipantId::new("p1"),
            played_move: mv.to_owned(),
            request_id: Some(request_id),
        })
    }

    fn room_joined(session: &str) -> Event {
        Event::Remote(InboundEvent::RoomJoined(RoomJoined {
            session_id: session.into(),
            participant_id: ParticipantId::new("p1"),
            role: Role::Initiator,
            seat_assignment: Seat::First,
            participant_name: "alice".into(),
            opponent_name: None,
            session_snapshot: None,
        }))
    }

    fn board_updated(session: &str, mv: &str, echo: Option<RequestId>) -> Event {
        Event::Remote(InboundEvent::BoardUpdated(BoardUpdated {
            session_id: session.into(),
            board_encoding: format!("after-{mv}"),
            turn_owner: Seat::Second,
            played_move: Some(mv.to_owned()),
            in_check: false,
            game_over: false,
            winner: None,
            session_status: SessionStatus::Active,
            end_reason: None,
            request_id: echo,
        }))
    }

    fn submit(
        correlator: &Correlator<T>,
        mv: &str,
        request_id: RequestId,
        now: T,
    ) -> CallHandle<BoardUpdated> {
        let spec = submit_move_spec("s1".into(), request_id, mv.to_owned(), ms(10_000));
        let (handle, action) = correlator
            .call(LinkState::Connected, move_message("s1", mv, request_id), spec, now)
            .unwrap();
        assert!(matches!(action, LinkAction::Send(OutboundMessage::SubmitMove(_))));
        handle
    }

    #[test]
    fn refuses_when_not_connected() {
        let (dispatcher, correlator) = setup();
        let spec = join_session_spec("s1".into(), ms(10_000));

        let err =
            correlator.call(LinkState::Reconnecting, join_message("s1"), spec, ms(0)).unwrap_err();

        assert_eq!(err, CallError::NotConnected);
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(dispatcher.subscriber_count(EventKind::RoomJoined), 0);
    }

    #[test]
    fn refuses_invalid_params_before_subscribing() {
        let (dispatcher, correlator) = setup();
        let spec = join_session_spec("".into(), ms(10_000));

        let err =
            correlator.call(LinkState::Connected, join_message(" "), spec, ms(0)).unwrap_err();

        assert!(matches!(err, CallError::InvalidParams { .. }));
        assert_eq!(dispatcher.subscriber_count(EventKind::RoomJoined), 0);
    }

    #[test]
    fn join_resolves_on_matching_room_joined() {
        let (dispatcher, correlator) = setup();
        let spec = join_session_spec("s1".into(), ms(10_000));
        let (mut handle, _) =
            correlator.call(LinkState::Connected, join_message("s1"), spec, ms(0)).unwrap();

        dispatcher.publish(room_joined("other"));
        assert!(handle.try_result().is_none());

        dispatcher.publish(room_joined("s1"));
        let joined = handle.try_result().unwrap().unwrap();
        assert_eq!(joined.session_id.as_str(), "s1");
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(dispatcher.subscriber_count(EventKind::RoomJoined), 0);
        assert_eq!(dispatcher.subscriber_count(EventKind::GameError), 0);
    }

    #[test]
    fn join_rejects_on_game_error() {
        let (dispatcher, correlator) = setup();
        let spec = join_session_spec("s1".into(), ms(10_000));
        let (mut handle, _) =
            correlator.call(LinkState::Connected, join_message("s1"), spec, ms(0)).unwrap();

        dispatcher.publish(Event::Remote(InboundEvent::GameError(GameError {
            message: "room full".into(),
        })));

        assert_eq!(
            handle.try_result(),
            Some(Err(CallError::RemoteRejected { message: "room full".into() }))
        );
    }

    #[test]
    fn times_out_at_deadline_and_ignores_late_reply() {
        let (dispatcher, correlator) = setup();
        let mut handle = submit(&correlator, "e4", RequestId(1), ms(0));

        correlator.tick(ms(9_999));
        assert!(handle.try_result().is_none());
        assert_eq!(correlator.next_deadline(), Some(ms(10_000)));

        correlator.tick(ms(10_000));
        assert_eq!(
            handle.try_result(),
            Some(Err(CallError::Timeout { label: "submit_move", after: ms(10_000) }))
        );

        dispatcher.publish(board_updated("s1", "e4", None));
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(dispatcher.subscriber_count(EventKind::BoardUpdated), 0);
    }

    #[test]
    fn link_loss_rejects_pending_calls() {
        let (dispatcher, correlator) = setup();
        let mut first = submit(&correlator, "e4", RequestId(1), ms(0));
        let mut second = submit(&correlator, "d4", RequestId(2), ms(0));

        dispatcher.publish(Event::Connection(ConnectionChange::Dropped { reason: "reset".into() }));

        assert_eq!(first.try_result(), Some(Err(CallError::ConnectionLost)));
        assert_eq!(second.try_result(), Some(Err(CallError::ConnectionLost)));
        assert_eq!(dispatcher.subscriber_count(EventKind::MoveError), 0);
    }

    #[test]
    fn one_reply_settles_one_call_in_fifo_order() {
        let (dispatcher, correlator) = setup();
        let mut first = submit(&correlator, "e4", RequestId(1), ms(0));
        let mut second = submit(&correlator, "d4", RequestId(2), ms(0));

        dispatcher.publish(board_updated("s1", "e4", None));
        assert_eq!(first.try_result().unwrap().unwrap().played_move.as_deref(), Some("e4"));
        assert!(second.try_result().is_none());

        dispatcher.publish(board_updated("s1", "d4", None));
        assert_eq!(second.try_result().unwrap().unwrap().played_move.as_deref(), Some("d4"));
    }

    #[test]
    fn opponent_update_without_echo_leaves_move_pending() {
        let (dispatcher, correlator) = setup();
        let mut handle = submit(&correlator, "e5", RequestId(0), ms(0));

        dispatcher.publish(board_updated("s1", "d4", None));
        assert!(handle.try_result().is_none());
        assert_eq!(correlator.pending_count(), 1);

        dispatcher.publish(board_updated("s1", "e5", None));
        assert_eq!(handle.try_result().unwrap().unwrap().played_move.as_deref(), Some("e5"));
    }

    #[test]
    fn echoed_update_settles_regardless_of_move_text() {
        let (dispatcher, correlator) = setup();
        let mut handle = submit(&correlator, "e2e4", RequestId(3), ms(0));

        dispatcher.publish(board_updated("s1", "e4", Some(RequestId(3))));

        assert!(handle.try_result().unwrap().is_ok());
    }

    #[test]
    fn echoed_request_id_matches_exactly() {
        let (dispatcher, correlator) = setup();
        let mut first = submit(&correlator, "e4", RequestId(1), ms(0));
        let mut second = submit(&correlator, "d4", RequestId(2), ms(0));

        dispatcher.publish(Event::Remote(InboundEvent::MoveError(MoveError {
            session_id: "s1".into(),
            message: "illegal".into(),
            request_id: Some(RequestId(2)),
        })));

        assert!(first.try_result().is_none());
        assert_eq!(
            second.try_result(),
            Some(Err(CallError::RemoteRejected { message: "illegal".into() }))
        );
    }

    #[test]
    fn dropped_handle_still_settles_and_cleans_up() {
        let (dispatcher, correlator) = setup();
        drop(submit(&correlator, "e4", RequestId(0), ms(0)));

        dispatcher.publish(board_updated("s1", "e4", None));

        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(dispatcher.subscriber_count(EventKind::BoardUpdated), 0);
        assert_eq!(dispatcher.subscriber_count(EventKind::MoveError), 0);
    }

    #[test]
    fn teardown_rejects_and_unsubscribes() {
        let (dispatcher, mut correlator) = setup();
        let mut handle = submit(&correlator, "e4", RequestId(1), ms(0));

        correlator.teardown();

        assert_eq!(handle.try_result(), Some(Err(CallError::ConnectionLost)));
        assert_eq!(dispatcher.subscriber_count(EventKind::ConnectionChanged), 0);
    }
}
