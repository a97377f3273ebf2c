//! Recorded session histories.

use std::{cell::RefCell, rc::Rc};

use duelsync_core::{Dispatcher, Event, EventKind, Session, SubscriptionId};

/// Ordered session snapshots published by one client.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    /// Snapshots in publication order.
    pub states: Vec<Rc<Session>>,
}

impl SessionHistory {
    /// History from owned snapshots.
    pub fn from_states(states: Vec<Session>) -> Self {
        Self { states: states.into_iter().map(Rc::new).collect() }
    }

    /// Consecutive snapshot pairs that describe the same session.
    ///
    /// A change of session id (or a reset to no session) starts a new
    /// session, so pairs across that boundary are skipped.
    pub fn same_session_steps(&self) -> impl Iterator<Item = (&Session, &Session)> {
        self.states.windows(2).filter_map(|pair| {
            let (before, after) = (pair[0].as_ref(), pair[1].as_ref());
            let same = before.session_id.is_some() && before.session_id == after.session_id;
            same.then_some((before, after))
        })
    }

    /// Latest snapshot.
    pub fn last(&self) -> Option<&Session> {
        self.states.last().map(AsRef::as_ref)
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Records every `session.changed` snapshot published on a dispatcher.
#[derive(Debug)]
pub struct SessionRecorder {
    dispatcher: Dispatcher<Event>,
    subscription: SubscriptionId,
    states: Rc<RefCell<Vec<Rc<Session>>>>,
}

impl SessionRecorder {
    /// Start recording.
    pub fn attach(dispatcher: &Dispatcher<Event>) -> Self {
        let states = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&states);
        let subscription = dispatcher.subscribe(EventKind::SessionChanged, move |event| {
            if let Some(session) = event.as_session() {
                sink.borrow_mut().push(Rc::clone(session));
            }
            Ok(())
        });
        Self { dispatcher: dispatcher.clone(), subscription, states }
    }

    /// Snapshots recorded so far.
    pub fn history(&self) -> SessionHistory {
        SessionHistory { states: self.states.borrow().clone() }
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.subscription);
    }
}
