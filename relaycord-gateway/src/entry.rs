//! Gateway Entry: the single WebSocket upgrade route.
//!
//! Parses and validates the accept-time query string, rejects bad
//! handshakes before the upgrade ever completes (spec §4.7), and hands
//! accepted sockets off to [`relaycord_session::Session::run`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use relaycord_codec::Encoding;
use relaycord_registry::Registry;
use relaycord_session::{HandshakeParams, Session, SessionError, WireMessage};
use relaycord_store::StoreAdapter;

use crate::error::HandshakeError;

/// The accepted gateway protocol version. Spec §4.7 currently names only
/// one.
const SUPPORTED_VERSION: u8 = 1;

/// Shared dependencies every accepted connection needs, injected once at
/// process startup (spec §9's Open Question resolution: `Registry` is
/// constructed once in `main` and shared via `Router::with_state`).
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn StoreAdapter>,
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct HandshakeQuery {
    v: u8,
    encoding: String,
    compress: Option<bool>,
}

impl HandshakeQuery {
    fn validate(self) -> Result<HandshakeParams, HandshakeError> {
        if self.v != SUPPORTED_VERSION {
            return Err(HandshakeError::UnsupportedVersion(self.v));
        }
        let encoding = match self.encoding.as_str() {
            "json" => Encoding::Json,
            "msgpack" => Encoding::MsgPack,
            other => return Err(HandshakeError::UnknownEncoding(other.to_string())),
        };
        Ok(HandshakeParams { version: self.v, encoding, compress: self.compress.unwrap_or(false) })
    }
}

/// Reject the upgrade outright on a malformed query string, matching
/// spec §4.7: since no WebSocket handshake has completed yet there is no
/// close frame to send, so the 4001 reason is carried as a plain HTTP
/// 400 body instead.
async fn upgrade(
    State(state): State<GatewayState>,
    query: Option<Query<HandshakeQuery>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(Query(query)) = query else {
        return (StatusCode::BAD_REQUEST, "invalid handshake parameter").into_response();
    };

    let params = match query.validate() {
        Ok(params) => params,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting handshake before upgrade");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| async move {
        Session::run(AxumTransport::new(socket), params, state.registry, state.store).await
    })
}

/// Adapts an `axum` WebSocket onto [`relaycord_session::Transport`].
struct AxumTransport {
    socket: WebSocket,
}

impl AxumTransport {
    fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Stream for AxumTransport {
    type Item = Result<WireMessage, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.socket).poll_next(cx) {
            Poll::Ready(Some(Ok(message))) => Poll::Ready(Some(Ok(from_axum_message(message)))),
            Poll::Ready(Some(Err(_))) => Poll::Ready(Some(Err(SessionError::TransportClosed))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Sink<WireMessage> for AxumTransport {
    type Error = SessionError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.socket).poll_ready(cx).map_err(|_| SessionError::TransportClosed)
    }

    fn start_send(mut self: Pin<&mut Self>, item: WireMessage) -> Result<(), Self::Error> {
        Pin::new(&mut self.socket)
            .start_send(to_axum_message(item))
            .map_err(|_| SessionError::TransportClosed)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.socket).poll_flush(cx).map_err(|_| SessionError::TransportClosed)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.socket).poll_close(cx).map_err(|_| SessionError::TransportClosed)
    }
}

fn from_axum_message(message: Message) -> WireMessage {
    match message {
        Message::Text(text) => WireMessage::Text(text.to_string()),
        Message::Binary(bytes) => WireMessage::Binary(bytes.to_vec()),
        Message::Ping(payload) => WireMessage::Ping(payload.to_vec()),
        Message::Pong(payload) => WireMessage::Pong(payload.to_vec()),
        Message::Close(frame) => {
            let (code, reason) = frame.map(|f| (f.code, f.reason.to_string())).unwrap_or((1000, String::new()));
            WireMessage::Close { code, reason }
        }
    }
}

fn to_axum_message(message: WireMessage) -> Message {
    match message {
        WireMessage::Text(text) => Message::Text(text.into()),
        WireMessage::Binary(bytes) => Message::Binary(bytes.into()),
        WireMessage::Ping(payload) => Message::Ping(payload.into()),
        WireMessage::Pong(payload) => Message::Pong(payload.into()),
        WireMessage::Close { code, reason } => {
            Message::Close(Some(CloseFrame { code, reason: reason.into() }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_json_without_compress() {
        let query = HandshakeQuery { v: 1, encoding: "json".to_string(), compress: None };
        let params = query.validate().unwrap();
        assert_eq!(params.version, 1);
        assert_eq!(params.encoding, Encoding::Json);
        assert!(!params.compress);
    }

    #[test]
    fn validate_accepts_msgpack_with_compress() {
        let query = HandshakeQuery { v: 1, encoding: "msgpack".to_string(), compress: Some(true) };
        let params = query.validate().unwrap();
        assert_eq!(params.encoding, Encoding::MsgPack);
        assert!(params.compress);
    }

    #[test]
    fn validate_rejects_unsupported_version() {
        let query = HandshakeQuery { v: 2, encoding: "json".to_string(), compress: None };
        assert!(matches!(query.validate(), Err(HandshakeError::UnsupportedVersion(2))));
    }

    #[test]
    fn validate_rejects_unknown_encoding() {
        let query = HandshakeQuery { v: 1, encoding: "etf".to_string(), compress: None };
        assert!(matches!(query.validate(), Err(HandshakeError::UnknownEncoding(_))));
    }
}
