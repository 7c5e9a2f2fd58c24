//! The transport abstraction a [`crate::Session`] runs over.
//!
//! Kept independent of any particular WebSocket library so the state
//! machine can be driven in tests over an in-memory channel pair instead
//! of a real socket. `relaycord-gateway` adapts an `axum` WebSocket into
//! this shape.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Sink, Stream};

use crate::error::SessionError;

/// A transport-agnostic WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close { code: u16, reason: String },
}

/// A duplex WebSocket-shaped byte transport. Blanket-implemented for
/// anything with the right `Stream`/`Sink` shape.
pub trait Transport:
    Stream<Item = Result<WireMessage, SessionError>> + Sink<WireMessage, Error = SessionError> + Unpin + Send
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<WireMessage, SessionError>> + Sink<WireMessage, Error = SessionError> + Unpin + Send
{
}

/// An in-memory loopback transport used by this crate's own tests: one
/// end the [`crate::Session`] under test runs over, the other end a test
/// plays the client against.
#[cfg(test)]
pub struct ChannelSocket {
    pub(crate) rx: tokio::sync::mpsc::UnboundedReceiver<WireMessage>,
    pub(crate) tx: tokio::sync::mpsc::UnboundedSender<WireMessage>,
}

#[cfg(test)]
pub struct ChannelSocketClient {
    pub(crate) rx: tokio::sync::mpsc::UnboundedReceiver<WireMessage>,
    pub(crate) tx: tokio::sync::mpsc::UnboundedSender<WireMessage>,
}

#[cfg(test)]
pub fn loopback() -> (ChannelSocket, ChannelSocketClient) {
    let (to_server_tx, to_server_rx) = tokio::sync::mpsc::unbounded_channel();
    let (to_client_tx, to_client_rx) = tokio::sync::mpsc::unbounded_channel();

    let server = ChannelSocket { rx: to_server_rx, tx: to_client_tx };
    let client = ChannelSocketClient { rx: to_client_rx, tx: to_server_tx };
    (server, client)
}

#[cfg(test)]
impl ChannelSocketClient {
    pub fn send(&self, message: WireMessage) {
        let _ = self.tx.send(message);
    }

    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.rx.recv().await
    }
}

#[cfg(test)]
impl Stream for ChannelSocket {
    type Item = Result<WireMessage, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|opt| opt.map(Ok))
    }
}

#[cfg(test)]
impl Sink<WireMessage> for ChannelSocket {
    type Error = SessionError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: WireMessage) -> Result<(), Self::Error> {
        self.tx.send(item).map_err(|_| SessionError::TransportClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
