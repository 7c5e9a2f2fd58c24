//! The per-connection protocol state machine.
//!
//! A [`Session`] drives one accepted WebSocket connection from handshake
//! through to teardown: `HANDSHAKE -> HELLO_SENT -> AWAIT_IDENTIFY ->
//! LOADING -> LIVE -> CLOSING`. It is transport-agnostic (see
//! [`transport::Transport`]) so the whole lifecycle can be driven in tests
//! over an in-memory channel pair; `relaycord-gateway` supplies the real
//! `axum` WebSocket adapter.
//!
//! Grounded in the teacher's `titanium_gateway::shard::Shard::run` /
//! `connect_and_run` — the same `tokio::select!` over an inbound stream, a
//! ping/pong timer, and a command channel, adapted from a client's
//! reconnect-forever loop to a server's accept-once loop.
#![deny(unsafe_code)]

pub mod error;
pub mod ready;
pub mod transport;

pub use error::SessionError;
pub use transport::{Transport, WireMessage};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use relaycord_codec::{Encoding, ZlibStreamEncoder};
use relaycord_model::{
    CloseCode, Event, Frame, HelloData, IdentifyPayload, Intents, OpCode, RawInboundFrame,
    ResumePayload, Snowflake,
};
use relaycord_registry::{Registry, SessionHandle, SessionId};
use relaycord_store::StoreAdapter;

use crate::ready::build_ready;

/// WebSocket ping/pong interval and timeout, per spec §5. One miss closes
/// the connection (resumable) on the assumption the peer went dark.
pub const WS_PING_INTERVAL: Duration = Duration::from_secs(32);

/// Default inbound-command rate limit advertised in HELLO. The gateway
/// does not itself enforce it (spec §1 Non-goals); it is advisory only.
pub const DEFAULT_RATE_LIMIT: u32 = 60;

/// Parameters fixed at handshake time (parsed from the accept query
/// string by `relaycord-gateway`'s Gateway Entry) and immutable for the
/// life of the connection, per spec §3's Session attributes.
#[derive(Debug, Clone)]
pub struct HandshakeParams {
    pub version: u8,
    pub encoding: Encoding,
    pub compress: bool,
}

/// What arrives on a session's mailbox: either an event the Registry wants
/// delivered, or an administrative close request.
enum Mailbox {
    Deliver(Event),
    ForceClose { resumable: bool },
}

/// The [`SessionHandle`] a bound [`Session`] hands the Registry. Deliver
/// and force-close calls are non-blocking sends into the session's own
/// mailbox so `Registry::dispatch` never waits on a slow socket.
struct MailboxHandle {
    tx: UnboundedSender<Mailbox>,
}

impl SessionHandle for MailboxHandle {
    fn deliver(&self, event: Event) {
        let _ = self.tx.send(Mailbox::Deliver(event));
    }

    fn force_close(&self, resumable: bool) {
        let _ = self.tx.send(Mailbox::ForceClose { resumable });
    }
}

/// One accepted WebSocket connection and its protocol state.
pub struct Session<T: Transport> {
    transport: T,
    params: HandshakeParams,
    registry: Arc<Registry>,
    store: Arc<dyn StoreAdapter>,
    compressor: Option<ZlibStreamEncoder>,
    sequence: u64,
    user_id: Option<Snowflake>,
    /// The bitfield bound to the connection at IDENTIFY (spec §3); `None`
    /// until then. The Registry fans out by guild/user membership, not by
    /// intent, so nothing reads this back yet — it is kept here for a
    /// future filtering pass, matching the original's `self.intents`.
    intents: Option<Intents>,
    session_id: Option<SessionId>,
    mailbox_rx: Option<UnboundedReceiver<Mailbox>>,
}

impl<T: Transport> Session<T> {
    /// Drive `transport` through its full lifecycle. Returns once the
    /// connection has been closed and any registry/presence cleanup has
    /// run; never propagates an error to the caller, since every failure
    /// this state machine can hit already has a close code to answer with.
    pub async fn run(
        transport: T,
        params: HandshakeParams,
        registry: Arc<Registry>,
        store: Arc<dyn StoreAdapter>,
    ) {
        let compressor = params.compress.then(ZlibStreamEncoder::new);
        let mut session = Session {
            transport,
            params,
            registry,
            store,
            compressor,
            sequence: 0,
            user_id: None,
            intents: None,
            session_id: None,
            mailbox_rx: None,
        };

        let outcome = session.drive().await;
        session.teardown(outcome).await;
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    async fn send_frame<D: Serialize>(&mut self, frame: &Frame<D>) -> Result<(), SessionError> {
        let compressed = self.compressor.is_some();
        let bytes = relaycord_codec::encode(frame, self.params.encoding, self.compressor.as_mut())?;
        let message = if compressed {
            WireMessage::Binary(bytes)
        } else {
            match self.params.encoding {
                Encoding::Json => WireMessage::Text(
                    String::from_utf8(bytes).map_err(|e| SessionError::Unknown(e.to_string()))?,
                ),
                Encoding::MsgPack => WireMessage::Binary(bytes),
            }
        };
        self.transport.send(message).await
    }

    async fn send_event(&mut self, event: Event) -> Result<(), SessionError> {
        let sequence = self.next_sequence();
        let frame = Frame::event(event.name, sequence, event.data);
        self.send_frame(&frame).await
    }

    async fn send_close(&mut self, code: CloseCode) {
        let _ = self
            .transport
            .send(WireMessage::Close { code: code.code(), reason: code.reason().to_string() })
            .await;
    }

    /// Read exactly one inbound frame, decoding it against the
    /// connection's fixed encoding. A decode failure is always `BadFrame`
    /// (spec §4.1), independent of which opcode was intended.
    async fn read_frame(&mut self) -> Result<FrameOutcome, SessionError> {
        loop {
            match self.transport.next().await {
                Some(Ok(WireMessage::Text(text))) => {
                    let frame = relaycord_codec::decode(text.as_bytes(), self.params.encoding)
                        .map_err(|e| SessionError::InvalidFrame(e.to_string()))?;
                    return Ok(FrameOutcome::Frame(frame));
                }
                Some(Ok(WireMessage::Binary(bytes))) => {
                    let frame = relaycord_codec::decode(&bytes, self.params.encoding)
                        .map_err(|e| SessionError::InvalidFrame(e.to_string()))?;
                    return Ok(FrameOutcome::Frame(frame));
                }
                Some(Ok(WireMessage::Ping(payload))) => {
                    self.transport.send(WireMessage::Pong(payload)).await?;
                }
                Some(Ok(WireMessage::Pong(_))) => {
                    // Only meaningful once LIVE; harmless before then.
                }
                Some(Ok(WireMessage::Close { .. })) => return Ok(FrameOutcome::ClientClosed),
                Some(Err(err)) => return Err(err),
                None => return Ok(FrameOutcome::StreamEnded),
            }
        }
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        tracing::debug!(version = self.params.version, "HANDSHAKE -> HELLO_SENT");
        self.send_frame(&Frame::hello(HelloData { rate_limit: DEFAULT_RATE_LIMIT })).await?;

        tracing::debug!("HELLO_SENT -> AWAIT_IDENTIFY");
        let raw = match self.read_frame().await? {
            FrameOutcome::Frame(frame) => frame,
            FrameOutcome::ClientClosed | FrameOutcome::StreamEnded => {
                return Err(SessionError::GracefulDisconnect)
            }
        };

        match raw.op_code() {
            Some(OpCode::Identify) => self.handle_identify(raw).await?,
            Some(OpCode::Resume) => self.handle_resume(raw).await?,
            _ => return Err(SessionError::InvalidOpcode),
        }

        tracing::debug!(session_id = ?self.session_id.as_ref().map(SessionId::as_str), "-> LIVE");
        self.live_loop().await
    }

    /// LOADING: validate IDENTIFY, materialize the snapshot, bind into the
    /// Registry, send READY + GUILD_CREATE, then drain whatever buffered
    /// while we were doing all of the above.
    async fn handle_identify(&mut self, raw: RawInboundFrame) -> Result<(), SessionError> {
        let payload: IdentifyPayload = serde_json::from_value(raw.d.unwrap_or(Value::Null))
            .map_err(|e| SessionError::InvalidPayload(e.to_string()))?;

        let user_id = validate_token(self.store.as_ref(), &payload.token).await?;

        if !self.store.session_limit_dec(user_id).await? {
            return Err(SessionError::QuotaExhausted);
        }

        let guild_ids = self.store.joined_guild_ids(user_id).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle: Arc<dyn SessionHandle> = Arc::new(MailboxHandle { tx });
        let session_id = self.registry.bind(handle, user_id, &guild_ids);
        self.mailbox_rx = Some(rx);
        self.user_id = Some(user_id);
        self.intents = Some(payload.intents);
        self.session_id = Some(session_id.clone());

        let ready = build_ready(self.store.as_ref(), user_id, session_id.as_str().to_string(), guild_ids.clone())
            .await?;
        let sequence = self.next_sequence();
        self.send_frame(&Frame::event("READY", sequence, ready)).await?;

        for guild_id in guild_ids {
            match ready::build_guild_create(self.store.as_ref(), guild_id).await? {
                Some(guild_create) => {
                    let sequence = self.next_sequence();
                    self.send_frame(&Frame::event("GUILD_CREATE", sequence, guild_create)).await?;
                }
                None => {
                    tracing::warn!(%guild_id, "membership with no backing guild record, skipping GUILD_CREATE");
                }
            }
        }

        let lossy = self.registry.open_floodgates(&session_id);
        if lossy {
            return Err(SessionError::Lossy);
        }

        Ok(())
    }

    /// Re-bind to a session still inside its resume-grace window instead
    /// of running a fresh IDENTIFY. Replays whatever buffered during the
    /// gap, continuing the sequence the client last observed.
    async fn handle_resume(&mut self, raw: RawInboundFrame) -> Result<(), SessionError> {
        let payload: ResumePayload = serde_json::from_value(raw.d.unwrap_or(Value::Null))
            .map_err(|e| SessionError::InvalidPayload(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle: Arc<dyn SessionHandle> = Arc::new(MailboxHandle { tx });
        let session_id = SessionId::from(payload.session_id.as_str());

        let Some(replay) = self.registry.resume(&session_id, handle) else {
            return Err(SessionError::ResumeFailed);
        };

        self.mailbox_rx = Some(rx);
        self.user_id = self.registry.user_of(&session_id);
        self.session_id = Some(session_id);
        self.sequence = payload.seq;

        for event in replay {
            self.send_event(event).await?;
        }

        Ok(())
    }

    /// LIVE: forward Registry deliveries to the socket, reject every
    /// inbound opcode (IDENTIFY is already spent; nothing else is legal
    /// post-snapshot), and keep the WebSocket ping/pong contract.
    async fn live_loop(&mut self) -> Result<(), SessionError> {
        let mut rx = self.mailbox_rx.take().expect("bound before entering LIVE");
        let mut ping_timer = tokio::time::interval(WS_PING_INTERVAL);
        ping_timer.tick().await; // the first tick fires immediately; consume it
        let mut awaiting_pong = false;

        let result = loop {
            tokio::select! {
                inbound = self.transport.next() => {
                    match inbound {
                        Some(Ok(WireMessage::Text(text))) => {
                            if let Err(e) = self.reject_live_frame(text.into_bytes()) {
                                break Err(e);
                            }
                        }
                        Some(Ok(WireMessage::Binary(bytes))) => {
                            if let Err(e) = self.reject_live_frame(bytes) {
                                break Err(e);
                            }
                        }
                        Some(Ok(WireMessage::Ping(payload))) => {
                            if let Err(e) = self.transport.send(WireMessage::Pong(payload)).await {
                                break Err(e);
                            }
                        }
                        Some(Ok(WireMessage::Pong(_))) => {
                            awaiting_pong = false;
                        }
                        Some(Ok(WireMessage::Close { .. })) => break Err(SessionError::GracefulDisconnect),
                        Some(Err(e)) => break Err(e),
                        None => break Err(SessionError::GracefulDisconnect),
                    }
                }
                mail = rx.recv() => {
                    match mail {
                        Some(Mailbox::Deliver(event)) => {
                            if let Err(e) = self.send_event(event).await {
                                break Err(e);
                            }
                        }
                        Some(Mailbox::ForceClose { resumable }) => {
                            break Err(if resumable {
                                SessionError::GracefulDisconnect
                            } else {
                                SessionError::Lossy
                            });
                        }
                        None => break Err(SessionError::Unknown("session mailbox dropped".into())),
                    }
                }
                _ = ping_timer.tick() => {
                    if awaiting_pong {
                        break Err(SessionError::PingTimeout);
                    }
                    if let Err(e) = self.transport.send(WireMessage::Ping(Vec::new())).await {
                        break Err(e);
                    }
                    awaiting_pong = true;
                }
            }
        };

        result
    }

    /// A frame arrived after floodgates opened. Only opcode matters: a
    /// second IDENTIFY is a distinct, resumable failure (4007); anything
    /// else is simply illegal here (4003).
    fn reject_live_frame(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        let frame = relaycord_codec::decode(&bytes, self.params.encoding)
            .map_err(|e| SessionError::InvalidFrame(e.to_string()))?;
        match frame.op_code() {
            Some(OpCode::Identify) => Err(SessionError::AlreadyIdentified),
            _ => Err(SessionError::InvalidOpcode),
        }
    }

    async fn teardown(&mut self, outcome: Result<(), SessionError>) {
        let code = match &outcome {
            Ok(()) => CloseCode::UnknownError,
            Err(err) => err.close_code(),
        };
        let resumable = match &outcome {
            Ok(()) => true,
            Err(err) => err.resumable(),
        };

        self.send_close(code).await;

        if let Some(session_id) = &self.session_id {
            self.registry.close(session_id, resumable);
        }

        if let Some(user_id) = self.user_id {
            if let Err(err) = self.store.presence_mark_invisible(user_id).await {
                tracing::warn!(%user_id, error = %err, "failed to mark presence invisible on close");
            }
        }
    }
}

enum FrameOutcome {
    Frame(RawInboundFrame),
    ClientClosed,
    StreamEnded,
}

/// Validate a bearer token end to end: parse its segments, look up the
/// signing user's password hash, and verify the signature against it in
/// constant time. Split out as a free function because it bridges two
/// crates (`relaycord-auth`'s pure parsing/verification and
/// `relaycord-store`'s key lookup) that otherwise have no reason to know
/// about one another.
async fn validate_token(
    store: &(impl StoreAdapter + ?Sized),
    token: &str,
) -> Result<Snowflake, SessionError> {
    let decoded = relaycord_auth::decode_token(token)?;
    let password_hash = store
        .user_password_hash(decoded.user_id())
        .await?
        .ok_or(relaycord_auth::AuthError::UnknownUser)?;
    relaycord_auth::verify_signature(&decoded, &password_hash)?;
    Ok(decoded.user_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback;
    use relaycord_store::memory::InMemoryStoreAdapter;
    use relaycord_store::models::{
        GuildRecord, SettingsRecord,
    };
    use serde_json::json;

    fn params() -> HandshakeParams {
        HandshakeParams { version: 1, encoding: Encoding::Json, compress: false }
    }

    fn seed_store() -> (Arc<InMemoryStoreAdapter>, Snowflake, String) {
        let store = Arc::new(InMemoryStoreAdapter::new());
        let user_id = Snowflake::new(1);
        let password_hash = b"test-hash".to_vec();
        store.seed_user(
            relaycord_store::models::UserRecord {
                id: user_id,
                username: "tester".into(),
                discriminator: "0001".into(),
                avatar: None,
                banner: None,
                flags: 0,
                bot: false,
                verified: Some(true),
            },
            password_hash.clone(),
        );
        store.settings.insert(
            user_id,
            SettingsRecord {
                locale: "en-US".into(),
                developer_mode: false,
                theme: "dark".into(),
                status: "online".into(),
                mfa_enabled: false,
                friend_requests_off: false,
            },
        );
        let guild_id = Snowflake::new(100);
        store.seed_membership(user_id, vec![guild_id]);
        store.seed_guild(GuildRecord {
            id: guild_id,
            name: "Test Guild".into(),
            icon: None,
            splash: None,
            discovery_splash: None,
            owner_id: user_id,
            default_permissions: 0,
            afk_channel_id: None,
            afk_timeout: 300,
            default_message_notification_level: 0,
            explicit_content_filter: 0,
            mfa_level: 0,
            system_channel_id: None,
            system_channel_flags: 0,
            rules_channel_id: None,
            max_presences: None,
            max_members: None,
            vanity_url_code: None,
            description: None,
            banner: None,
            preferred_locale: "en-US".into(),
            guild_updates_channel_id: None,
            nsfw_level: 0,
            verification_level: 0,
        });

        let token = sign_token(user_id.get(), &password_hash);
        (store, user_id, token)
    }

    fn sign_token(user_id: u64, password_hash: &[u8]) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let id_segment = URL_SAFE_NO_PAD.encode(user_id.to_string());
        let payload = "test-payload";
        let mut mac = Hmac::<Sha256>::new_from_slice(password_hash).unwrap();
        mac.update(format!("{id_segment}.{payload}").as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{id_segment}.{payload}.{sig}")
    }

    fn identify_frame(token: &str) -> serde_json::Value {
        json!({
            "op": 2,
            "d": {
                "token": token,
                "intents": 0,
                "properties": {"os": "linux", "browser": "test", "device": "relaycord-test"},
            }
        })
    }

    #[tokio::test]
    async fn happy_path_sends_hello_ready_and_guild_create_with_increasing_sequence() {
        let (store, _user_id, token) = seed_store();
        let registry = Arc::new(Registry::new());
        let (server, mut client) = loopback();

        let handle = tokio::spawn(Session::run(server, params(), registry, store));

        let hello = client.recv().await.unwrap();
        match hello {
            WireMessage::Text(text) => {
                let v: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(v["op"], 1);
                assert_eq!(v["d"]["rate_limit"], 60);
            }
            other => panic!("expected HELLO text frame, got {other:?}"),
        }

        client.send(WireMessage::Text(identify_frame(&token).to_string()));

        let ready = client.recv().await.unwrap();
        let ready_json = as_json(ready);
        assert_eq!(ready_json["op"], 0);
        assert_eq!(ready_json["t"], "READY");
        assert_eq!(ready_json["s"], 1);

        let guild_create = client.recv().await.unwrap();
        let gc_json = as_json(guild_create);
        assert_eq!(gc_json["t"], "GUILD_CREATE");
        assert_eq!(gc_json["s"], 2);

        client.send(WireMessage::Close { code: 1000, reason: String::new() });
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn unrecognized_opcode_after_hello_closes_4003() {
        let (store, _user_id, _token) = seed_store();
        let registry = Arc::new(Registry::new());
        let (server, mut client) = loopback();

        let handle = tokio::spawn(Session::run(server, params(), registry, store));
        let _hello = client.recv().await.unwrap();

        // op=99 names no defined opcode at all; it must still decode as a
        // frame (it's well-formed JSON) and only fail the opcode lookup.
        client.send(WireMessage::Text(json!({"op": 99, "d": {}}).to_string()));

        let close = client.recv().await.unwrap();
        match close {
            WireMessage::Close { code, .. } => assert_eq!(code, 4003),
            other => panic!("expected close frame, got {other:?}"),
        }
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn legal_but_out_of_place_opcode_after_hello_also_closes_4003() {
        let (store, _user_id, _token) = seed_store();
        let registry = Arc::new(Registry::new());
        let (server, mut client) = loopback();

        let handle = tokio::spawn(Session::run(server, params(), registry, store));
        let _hello = client.recv().await.unwrap();

        // op=0 (Dispatch) is a legal wire opcode, just not one a client may
        // send before IDENTIFY.
        client.send(WireMessage::Text(json!({"op": 0, "d": {}}).to_string()));

        let close = client.recv().await.unwrap();
        match close {
            WireMessage::Close { code, .. } => assert_eq!(code, 4003),
            other => panic!("expected close frame, got {other:?}"),
        }
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn quota_exhausted_closes_4006_without_ready() {
        let (store, user_id, token) = seed_store();
        store.seed_session_limit(user_id, 0);
        let registry = Arc::new(Registry::new());
        let (server, mut client) = loopback();

        let handle = tokio::spawn(Session::run(server, params(), registry, store));
        let _hello = client.recv().await.unwrap();

        client.send(WireMessage::Text(identify_frame(&token).to_string()));

        let close = client.recv().await.unwrap();
        match close {
            WireMessage::Close { code, .. } => assert_eq!(code, 4006),
            other => panic!("expected close frame, got {other:?}"),
        }
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn identify_binds_the_requested_intents_onto_the_session() {
        let (store, _user_id, token) = seed_store();
        let registry = Arc::new(Registry::new());
        let (server, _client) = loopback();

        let mut session = Session {
            transport: server,
            params: params(),
            registry,
            store,
            compressor: None,
            sequence: 0,
            user_id: None,
            intents: None,
            session_id: None,
            mailbox_rx: None,
        };
        assert_eq!(session.intents, None);

        let d = json!({
            "token": token,
            "intents": 5,
            "properties": {"os": "linux", "browser": "test", "device": "relaycord-test"},
        });
        let raw = RawInboundFrame { op: 2, d: Some(d) };
        session.handle_identify(raw).await.unwrap();

        assert_eq!(session.intents, Some(Intents::GUILDS | Intents::GUILD_PRESENCES));
    }

    fn as_json(message: WireMessage) -> serde_json::Value {
        match message {
            WireMessage::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}
