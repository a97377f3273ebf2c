//! Transport abstraction for the realtime link.
//!
//! A transport moves whole protocol messages. Framing, encoding and the
//! socket itself belong to the implementation; lifecycle decisions (when to
//! open, when to give up) belong to the core connection manager.

use std::future::Future;

use duelsync_proto::{InboundEvent, OutboundMessage};

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A decoded event from the authority.
    Inbound(InboundEvent),
    /// The link closed or failed.
    Closed {
        /// Human-readable cause.
        reason: String,
    },
}

impl TransportEvent {
    /// Closed event with the given reason.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed { reason: reason.into() }
    }
}

/// Bidirectional message transport to the remote authority.
///
/// Single-threaded: futures are not required to be `Send`.
///
/// # Cancellation
///
/// [`Transport::recv`] must be cancel-safe. The driver races it against
/// timers and drops it when a timer fires first; no message may be lost when
/// that happens.
pub trait Transport {
    /// Transport-specific error.
    type Error: std::error::Error + 'static;

    /// Open the link.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be established.
    fn open(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is not open or the write fails.
    fn send(&mut self, message: &OutboundMessage) -> impl Future<Output = Result<(), Self::Error>>;

    /// Wait for the next event. Returns [`TransportEvent::Closed`] once the
    /// link is gone.
    fn recv(&mut self) -> impl Future<Output = TransportEvent>;

    /// Close the link if open. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()>;
}
