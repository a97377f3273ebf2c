//! WebSocket transport.
//!
//! Each protocol message is one JSON text frame holding an
//! `{"event": ..., "data": ...}` envelope. Frames that fail to decode are
//! logged and skipped; control frames are handled by tungstenite.

use std::time::Duration;

use duelsync_proto::{InboundEvent, OutboundMessage, ProtoError};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport errors.
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// Handshake or TCP connect failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Connect did not complete in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Send attempted with no open link.
    #[error("link not open")]
    NotOpen,

    /// Write failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Message could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtoError),
}

/// Transport over a single WebSocket connection.
pub struct WebSocketTransport {
    url: String,
    connect_timeout: Duration,
    stream: Option<WsStream>,
}

impl WebSocketTransport {
    /// Transport for `url`; nothing is opened yet.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self { url: url.into(), connect_timeout, stream: None }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for WebSocketTransport {
    type Error = WebSocketError;

    async fn open(&mut self) -> Result<(), Self::Error> {
        if let Some(mut stale) = self.stream.take() {
            let _ = stale.close(None).await;
        }

        let connecting = connect_async(self.url.as_str());
        let (stream, _) = tokio::time::timeout(self.connect_timeout, connecting)
            .await
            .map_err(|_| WebSocketError::Timeout(self.connect_timeout))?
            .map_err(|e| WebSocketError::Connect(e.to_string()))?;

        info!(url = %self.url, "websocket open");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<(), Self::Error> {
        let text = message.encode()?;
        let stream = self.stream.as_mut().ok_or(WebSocketError::NotOpen)?;
        debug!(message = message.name(), "sending frame");
        stream.send(Message::text(text)).await.map_err(|e| WebSocketError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        let event = match self.stream.as_mut() {
            Some(stream) => next_event(stream).await,
            None => return TransportEvent::closed("link not open"),
        };
        if matches!(event, TransportEvent::Closed { .. }) {
            self.stream = None;
        }
        event
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!(error = %e, "close handshake failed");
            }
            info!(url = %self.url, "websocket closed");
        }
    }
}

async fn next_event(stream: &mut WsStream) -> TransportEvent {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match InboundEvent::decode(text.as_str()) {
                Ok(event) => return TransportEvent::Inbound(event),
                Err(e) => warn!(error = %e, "malformed frame skipped"),
            },
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.as_str().to_owned())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed by server".to_owned());
                return TransportEvent::closed(reason);
            },
            Some(Ok(Message::Binary(_))) => warn!("binary frame skipped"),
            Some(Ok(_)) => {},
            Some(Err(e)) => return TransportEvent::closed(e.to_string()),
            None => return TransportEvent::closed("stream ended"),
        }
    }
}
