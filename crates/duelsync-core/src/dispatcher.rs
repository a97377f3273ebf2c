//! Synchronous publish/subscribe event dispatcher.
//!
//! Routes events to handlers registered for the event's kind. Delivery is
//! synchronous, on the caller's stack, in registration order.
//!
//! # Re-entrancy
//!
//! Handlers may subscribe, unsubscribe and publish from inside a delivery:
//!
//! - `publish` works on a snapshot of the handler list, so handlers added
//!   during a delivery first run on the next publish.
//! - A handler unsubscribed during a delivery is skipped for the remainder of
//!   that delivery.
//! - A nested publish of the same kind runs every other handler. A handler that
//!   is already running further up the stack is skipped with a warning instead
//!   of being invoked recursively.
//!
//! # Fault isolation
//!
//! A handler returning an error or panicking is logged and the remaining
//! handlers still run. Nothing propagates to the publisher.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    hash::Hash,
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use tracing::{error, trace, warn};

use crate::error::HandlerError;

/// Event type routable by a [`Dispatcher`].
pub trait Topic {
    /// Routing key. One handler list exists per kind.
    type Kind: Copy + Eq + Hash + fmt::Debug;

    /// Kind of this event.
    fn kind(&self) -> Self::Kind;
}

/// Result type returned by event handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Token identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Identifies one in-progress `publish` call.
///
/// Lets a handler tell whether two callbacks it observes belong to the same
/// delivery of the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(u64);

type Handler<E> = Rc<RefCell<dyn FnMut(&E) -> HandlerResult>>;

struct Registration<E> {
    id: SubscriptionId,
    handler: Handler<E>,
}

struct Registry<E: Topic> {
    next_id: u64,
    by_kind: HashMap<E::Kind, Vec<Registration<E>>>,
    kinds: HashMap<SubscriptionId, E::Kind>,
}

struct Inner<E: Topic> {
    registry: RefCell<Registry<E>>,
    next_delivery: Cell<u64>,
    active: RefCell<Vec<DeliveryId>>,
}

/// Event dispatcher handle.
///
/// Cloning is cheap and every clone refers to the same handler registry.
pub struct Dispatcher<E: Topic> {
    inner: Rc<Inner<E>>,
}

impl<E: Topic> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<E: Topic> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Topic> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscriptions", &self.inner.registry.borrow().kinds.len())
            .field("active_deliveries", &self.inner.active.borrow().len())
            .finish()
    }
}

impl<E: Topic> Dispatcher<E> {
    /// Create a dispatcher with no handlers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                registry: RefCell::new(Registry {
                    next_id: 0,
                    by_kind: HashMap::new(),
                    kinds: HashMap::new(),
                }),
                next_delivery: Cell::new(0),
                active: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Non-owning handle, for handlers that need to reach the dispatcher they
    /// are registered on.
    pub fn downgrade(&self) -> WeakDispatcher<E> {
        WeakDispatcher { inner: Rc::downgrade(&self.inner) }
    }

    /// Register `handler` for events of `kind`.
    ///
    /// Handlers for the same kind run in registration order.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) -> HandlerResult + 'static,
        E: 'static,
    {
        let handler: Handler<E> = Rc::new(RefCell::new(handler));
        let mut registry = self.inner.registry.borrow_mut();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.by_kind.entry(kind).or_default().push(Registration { id, handler });
        registry.kinds.insert(id, kind);
        trace!(subscription = %id, ?kind, "subscribed");
        id
    }

    /// Remove a registration.
    ///
    /// Returns false if the id is unknown or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.inner.registry.borrow_mut();
        let Some(kind) = registry.kinds.remove(&id) else {
            return false;
        };
        if let Some(list) = registry.by_kind.get_mut(&kind) {
            list.retain(|r| r.id != id);
            if list.is_empty() {
                registry.by_kind.remove(&kind);
            }
        }
        trace!(subscription = %id, ?kind, "unsubscribed");
        true
    }

    /// True while the registration is live.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.registry.borrow().kinds.contains_key(&id)
    }

    /// Number of live handlers for `kind`.
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.inner.registry.borrow().by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler registered for its kind.
    pub fn publish(&self, event: E) {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, Handler<E>)> = self
            .inner
            .registry
            .borrow()
            .by_kind
            .get(&kind)
            .map(|list| list.iter().map(|r| (r.id, Rc::clone(&r.handler))).collect())
            .unwrap_or_default();

        if snapshot.is_empty() {
            trace!(?kind, "no subscribers");
            return;
        }

        let delivery = DeliveryId(self.inner.next_delivery.get());
        self.inner.next_delivery.set(delivery.0 + 1);
        self.inner.active.borrow_mut().push(delivery);

        for (id, handler) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            let Ok(mut handler) = handler.try_borrow_mut() else {
                warn!(subscription = %id, ?kind, "handler already running, skipping nested delivery");
                continue;
            };

            match panic::catch_unwind(AssertUnwindSafe(|| (&mut *handler)(&event))) {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    error!(subscription = %id, ?kind, error = %e, "event handler failed");
                },
                Err(payload) => {
                    error!(
                        subscription = %id,
                        ?kind,
                        panic = panic_message(payload.as_ref()),
                        "event handler panicked"
                    );
                },
            }
        }

        self.inner.active.borrow_mut().retain(|d| *d != delivery);
    }

    /// Innermost delivery currently running, if any.
    pub fn current_delivery(&self) -> Option<DeliveryId> {
        self.inner.active.borrow().last().copied()
    }

    /// True while `delivery` is still on the stack.
    pub fn is_delivering(&self, delivery: DeliveryId) -> bool {
        self.inner.active.borrow().contains(&delivery)
    }
}

/// Non-owning [`Dispatcher`] handle.
///
/// Handlers stored inside a dispatcher hold this instead of a full handle.
pub struct WeakDispatcher<E: Topic> {
    inner: Weak<Inner<E>>,
}

impl<E: Topic> Clone for WeakDispatcher<E> {
    fn clone(&self) -> Self {
        Self { inner: Weak::clone(&self.inner) }
    }
}

impl<E: Topic> WeakDispatcher<E> {
    /// Full handle, if the dispatcher is still alive.
    pub fn upgrade(&self) -> Option<Dispatcher<E>> {
        self.inner.upgrade().map(|inner| Dispatcher { inner })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
