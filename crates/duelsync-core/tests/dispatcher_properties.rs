//! Property-based tests for the event dispatcher.
//!
//! A random program of subscribe, unsubscribe and publish operations is run
//! against the dispatcher and against a plain `Vec` model of the registry.
//! Every publish must invoke exactly the live handlers of that kind, each
//! once, in registration order.

use std::{cell::RefCell, rc::Rc};

use duelsync_core::{Dispatcher, HandlerError, SubscriptionId, Topic};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    A,
    B,
    C,
}

#[derive(Debug, Clone)]
struct Note(Kind);

impl Topic for Note {
    type Kind = Kind;

    fn kind(&self) -> Kind {
        self.0
    }
}

#[derive(Debug, Clone)]
enum Op {
    Subscribe { kind: Kind, fails: bool },
    Unsubscribe { index: usize },
    Publish { kind: Kind },
}

fn kind_strategy() -> impl Strategy<Value = Kind> {
    prop_oneof![Just(Kind::A), Just(Kind::B), Just(Kind::C)]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (kind_strategy(), prop::bool::weighted(0.2))
            .prop_map(|(kind, fails)| Op::Subscribe { kind, fails }),
        1 => (0usize..32).prop_map(|index| Op::Unsubscribe { index }),
        3 => kind_strategy().prop_map(|kind| Op::Publish { kind }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_publish_matches_registry_model(ops in prop::collection::vec(op_strategy(), 0..80)) {
        let dispatcher = Dispatcher::new();
        let calls: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

        // Model: (tag, kind, id, live)
        let mut model: Vec<(usize, Kind, SubscriptionId, bool)> = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe { kind, fails } => {
                    let tag = model.len();
                    let sink = Rc::clone(&calls);
                    let id = dispatcher.subscribe(kind, move |_: &Note| {
                        sink.borrow_mut().push(tag);
                        if fails { Err(HandlerError::new("scripted failure")) } else { Ok(()) }
                    });
                    model.push((tag, kind, id, true));
                },
                Op::Unsubscribe { index } => {
                    if let Some(entry) = model.get_mut(index) {
                        let removed = dispatcher.unsubscribe(entry.2);
                        prop_assert_eq!(removed, entry.3);
                        entry.3 = false;
                    }
                },
                Op::Publish { kind } => {
                    calls.borrow_mut().clear();
                    dispatcher.publish(Note(kind));

                    let expected: Vec<usize> = model
                        .iter()
                        .filter(|(_, k, _, live)| *k == kind && *live)
                        .map(|(tag, ..)| *tag)
                        .collect();
                    prop_assert_eq!(&*calls.borrow(), &expected);
                    prop_assert_eq!(dispatcher.subscriber_count(kind), expected.len());
                },
            }
        }

        prop_assert_eq!(dispatcher.current_delivery(), None);
    }

    #[test]
    fn prop_self_unsubscribe_runs_once(subscribers in 1usize..8, publishes in 1usize..5) {
        let dispatcher: Dispatcher<Note> = Dispatcher::new();
        let hits = Rc::new(RefCell::new(vec![0u32; subscribers]));

        for i in 0..subscribers {
            let hits = Rc::clone(&hits);
            let weak = dispatcher.downgrade();
            let own: Rc<RefCell<Option<SubscriptionId>>> = Rc::new(RefCell::new(None));
            let own_in = Rc::clone(&own);
            let id = dispatcher.subscribe(Kind::A, move |_: &Note| {
                hits.borrow_mut()[i] += 1;
                if let (Some(d), Some(id)) = (weak.upgrade(), *own_in.borrow()) {
                    d.unsubscribe(id);
                }
                Ok(())
            });
            *own.borrow_mut() = Some(id);
        }

        for _ in 0..publishes {
            dispatcher.publish(Note(Kind::A));
        }

        prop_assert!(hits.borrow().iter().all(|&n| n == 1));
        prop_assert_eq!(dispatcher.subscriber_count(Kind::A), 0);
    }
}

#[test]
fn publish_without_subscribers_is_noop() {
    let dispatcher: Dispatcher<Note> = Dispatcher::new();
    dispatcher.publish(Note(Kind::B));
    assert_eq!(dispatcher.current_delivery(), None);
}

#[test]
fn same_logic_under_two_kinds_gets_two_ids() {
    let dispatcher: Dispatcher<Note> = Dispatcher::new();
    let count = Rc::new(RefCell::new(0));

    let make = |count: Rc<RefCell<i32>>| {
        move |_: &Note| -> Result<(), HandlerError> {
            *count.borrow_mut() += 1;
            Ok(())
        }
    };
    let a = dispatcher.subscribe(Kind::A, make(Rc::clone(&count)));
    let b = dispatcher.subscribe(Kind::B, make(Rc::clone(&count)));
    assert_ne!(a, b);

    dispatcher.publish(Note(Kind::A));
    dispatcher.publish(Note(Kind::B));
    dispatcher.unsubscribe(a);
    dispatcher.publish(Note(Kind::A));

    assert_eq!(*count.borrow(), 2);
}
