//! Scripted in-memory transport.
//!
//! [`ScriptedTransport`] replaces the network with a queue. Tests push
//! inbound events and link drops into it, script open failures, and inspect
//! everything the client sent. When a [`ModelAuthority`] is attached, every
//! sent message is answered immediately by queueing the model's replies.
//!
//! Clones share one script, so a test keeps a handle after moving the
//! transport into a client.
//!
//! `recv` never blocks on a timer: with an empty queue it stays pending, so a
//! driver racing it against a simulated sleep always takes the sleep.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    future::poll_fn,
    rc::Rc,
    task::Poll,
};

use duelsync_client::{Transport, TransportEvent};
use duelsync_proto::{InboundEvent, OutboundMessage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::authority::ModelAuthority;

/// Error type for the scripted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Open refused by the script.
    Refused(String),
    /// Send while the link is not open.
    NotOpen,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused(reason) => write!(f, "open refused: {reason}"),
            Self::NotOpen => f.write_str("link not open"),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Seeded fault injection for opens.
#[derive(Debug)]
struct Faults {
    rng: ChaCha8Rng,
    open_failure_rate: f64,
}

#[derive(Debug, Default)]
struct Script {
    open: bool,
    inbound: VecDeque<TransportEvent>,
    sent: Vec<OutboundMessage>,
    failing_opens: VecDeque<String>,
    refusing: Option<String>,
    faults: Option<Faults>,
    authority: Option<ModelAuthority>,
    muted: bool,
    opens: usize,
    closes: usize,
}

/// In-memory transport driven by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    /// Transport with no authority: nothing answers sent messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport answered by `authority`.
    pub fn with_authority(authority: ModelAuthority) -> Self {
        let transport = Self::new();
        transport.script.borrow_mut().authority = Some(authority);
        transport
    }

    /// Fail each open with probability `rate`, drawn from a seeded RNG.
    #[must_use]
    pub fn with_open_faults(self, seed: u64, rate: f64) -> Self {
        self.script.borrow_mut().faults =
            Some(Faults { rng: ChaCha8Rng::seed_from_u64(seed), open_failure_rate: rate });
        self
    }

    /// Queue an inbound event.
    pub fn push_inbound(&self, event: InboundEvent) {
        self.script.borrow_mut().inbound.push_back(TransportEvent::Inbound(event));
    }

    /// Queue several inbound events.
    pub fn push_all(&self, events: impl IntoIterator<Item = InboundEvent>) {
        let mut script = self.script.borrow_mut();
        script.inbound.extend(events.into_iter().map(TransportEvent::Inbound));
    }

    /// Queue a link drop behind the events already queued.
    pub fn drop_link(&self, reason: &str) {
        self.script.borrow_mut().inbound.push_back(TransportEvent::closed(reason));
    }

    /// Fail the next `count` opens.
    pub fn fail_next_opens(&self, count: usize, reason: &str) {
        let mut script = self.script.borrow_mut();
        script.failing_opens.extend(std::iter::repeat_n(reason.to_owned(), count));
    }

    /// Refuse every open until [`Self::accept_opens`].
    pub fn refuse_opens(&self, reason: &str) {
        self.script.borrow_mut().refusing = Some(reason.to_owned());
    }

    /// Stop refusing opens.
    pub fn accept_opens(&self) {
        self.script.borrow_mut().refusing = None;
    }

    /// Swallow the authority's replies while `muted`.
    pub fn set_muted(&self, muted: bool) {
        self.script.borrow_mut().muted = muted;
    }

    /// Let the attached authority act and queue what it broadcasts.
    pub fn act_as_authority<F>(&self, act: F)
    where
        F: FnOnce(&mut ModelAuthority) -> Vec<InboundEvent>,
    {
        let mut script = self.script.borrow_mut();
        let events = script.authority.as_mut().map(act).unwrap_or_default();
        script.inbound.extend(events.into_iter().map(TransportEvent::Inbound));
    }

    /// Read the attached authority.
    pub fn authority<R>(&self, read: impl FnOnce(&ModelAuthority) -> R) -> Option<R> {
        self.script.borrow().authority.as_ref().map(read)
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.script.borrow().sent.clone()
    }

    /// True while the link is open.
    pub fn is_open(&self) -> bool {
        self.script.borrow().open
    }

    /// Number of open attempts.
    pub fn open_count(&self) -> usize {
        self.script.borrow().opens
    }

    /// Number of closes of an open link.
    pub fn close_count(&self) -> usize {
        self.script.borrow().closes
    }

    /// Events still queued.
    pub fn queued(&self) -> usize {
        self.script.borrow().inbound.len()
    }
}

impl Script {
    fn open_refusal(&mut self) -> Option<String> {
        if let Some(reason) = self.failing_opens.pop_front() {
            return Some(reason);
        }
        if let Some(reason) = &self.refusing {
            return Some(reason.clone());
        }
        let faults = self.faults.as_mut()?;
        faults.rng.gen_bool(faults.open_failure_rate).then(|| "injected fault".to_owned())
    }
}

impl Transport for ScriptedTransport {
    type Error = ScriptError;

    async fn open(&mut self) -> Result<(), ScriptError> {
        let mut script = self.script.borrow_mut();
        script.opens += 1;
        if let Some(reason) = script.open_refusal() {
            debug!(attempt = script.opens, %reason, "scripted open refused");
            return Err(ScriptError::Refused(reason));
        }
        script.open = true;
        Ok(())
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<(), ScriptError> {
        let mut script = self.script.borrow_mut();
        if !script.open {
            return Err(ScriptError::NotOpen);
        }
        script.sent.push(message.clone());
        trace!(message = message.name(), "scripted send");

        if script.muted {
            return Ok(());
        }
        let replies = script.authority.as_mut().map(|a| a.respond(message)).unwrap_or_default();
        script.inbound.extend(replies.into_iter().map(TransportEvent::Inbound));
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        poll_fn(|_| {
            let mut script = self.script.borrow_mut();
            if !script.open {
                return Poll::Ready(TransportEvent::closed("link not open"));
            }
            match script.inbound.pop_front() {
                Some(event) => {
                    if matches!(event, TransportEvent::Closed { .. }) {
                        script.open = false;
                    }
                    Poll::Ready(event)
                },
                None => Poll::Pending,
            }
        })
        .await
    }

    async fn close(&mut self) {
        let mut script = self.script.borrow_mut();
        if script.open {
            script.open = false;
            script.closes += 1;
        }
        script.inbound.clear();
    }
}

#[cfg(test)]
mod tests {
    use duelsync_proto::{GameError, Seat};

    use super::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
    }

    fn error(message: &str) -> InboundEvent {
        InboundEvent::GameError(GameError { message: message.to_owned() })
    }

    #[test]
    fn queued_events_arrive_in_order_then_drop_closes() {
        let mut transport = ScriptedTransport::new();
        let handle = transport.clone();

        block_on(async {
            transport.open().await.unwrap();
            handle.push_inbound(error("a"));
            handle.push_inbound(error("b"));
            handle.drop_link("reset");

            assert_eq!(transport.recv().await, TransportEvent::Inbound(error("a")));
            assert_eq!(transport.recv().await, TransportEvent::Inbound(error("b")));
            assert_eq!(transport.recv().await, TransportEvent::closed("reset"));
        });

        assert!(!handle.is_open());
    }

    #[test]
    fn scripted_failures_precede_refusal() {
        let mut transport = ScriptedTransport::new();
        transport.fail_next_opens(1, "first");

        block_on(async {
            assert_eq!(transport.open().await, Err(ScriptError::Refused("first".into())));
            assert_eq!(transport.open().await, Ok(()));
        });

        assert_eq!(transport.open_count(), 2);
    }

    #[test]
    fn send_requires_open_link() {
        let mut transport = ScriptedTransport::new();
        let leave = OutboundMessage::LeaveSession(duelsync_proto::LeaveSession {
            session_id: "g1".into(),
        });

        let result = block_on(transport.send(&leave));

        assert_eq!(result, Err(ScriptError::NotOpen));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn authority_answers_sends() {
        let authority = ModelAuthority::new("g1", ("p1", "alice"));
        let mut transport = ScriptedTransport::with_authority(authority);
        let join = OutboundMessage::JoinSession(duelsync_proto::JoinSession {
            session_id: "g1".into(),
            participant_id: "p1".into(),
        });

        block_on(async {
            transport.open().await.unwrap();
            transport.send(&join).await.unwrap();
            assert!(matches!(transport.recv().await, TransportEvent::Inbound(InboundEvent::RoomJoined(_))));
        });

        assert_eq!(transport.sent(), vec![join]);
    }

    #[test]
    fn close_discards_undelivered_events() {
        let mut transport = ScriptedTransport::with_authority(
            ModelAuthority::new("g1", ("p1", "alice")).with_joiner("p2", "bob"),
        );

        block_on(async {
            transport.open().await.unwrap();
            transport.act_as_authority(|a| a.opponent_joins(Seat::Second));
            assert_eq!(transport.queued(), 1);
            transport.close().await;
        });

        assert_eq!(transport.queued(), 0);
        assert_eq!(transport.close_count(), 1);
    }

    #[test]
    fn seeded_faults_are_reproducible() {
        let outcomes = |seed| {
            let mut transport = ScriptedTransport::new().with_open_faults(seed, 0.5);
            block_on(async {
                let mut results = Vec::new();
                for _ in 0..16 {
                    results.push(transport.open().await.is_ok());
                }
                results
            })
        };

        assert_eq!(outcomes(7), outcomes(7));
    }
}
