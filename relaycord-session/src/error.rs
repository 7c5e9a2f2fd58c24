//! Session error types using thiserror.
//!
//! Every variant maps to exactly one close code (spec §6/§7); no
//! `.unwrap()` calls are used outside the test harness.

use relaycord_model::CloseCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid op code for current state")]
    InvalidOpcode,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid data sent: {0}")]
    InvalidPayload(String),

    #[error("authentication failed: {0}")]
    InvalidToken(#[from] relaycord_auth::AuthError),

    #[error("connection limit reached")]
    QuotaExhausted,

    #[error("already identified")]
    AlreadyIdentified,

    #[error("transport closed")]
    TransportClosed,

    #[error("store error: {0}")]
    Store(#[from] relaycord_store::StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] relaycord_codec::CodecError),

    /// The client disconnected without a protocol-level error.
    #[error("client disconnected")]
    GracefulDisconnect,

    /// No heartbeat pong was seen within one ping interval.
    #[error("ping timeout")]
    PingTimeout,

    /// The session's pending queue overflowed before floodgates opened;
    /// the client missed events and must perform a full reconnect rather
    /// than RESUME.
    #[error("pending queue overflowed, buffered events were dropped")]
    Lossy,

    /// A RESUME referenced a session ID with no matching grace-window
    /// entry (never existed, or the 60s window already expired).
    #[error("no resumable session for that id")]
    ResumeFailed,

    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl SessionError {
    /// The close code sent to the client for this failure, per spec §6/§7.
    pub fn close_code(&self) -> CloseCode {
        match self {
            SessionError::InvalidOpcode => CloseCode::InvalidOpcode,
            SessionError::InvalidFrame(_) => CloseCode::InvalidJson,
            SessionError::InvalidPayload(_) => CloseCode::InvalidPayload,
            SessionError::InvalidToken(_) => CloseCode::InvalidToken,
            SessionError::QuotaExhausted => CloseCode::SessionLimitReached,
            SessionError::AlreadyIdentified => CloseCode::AlreadyIdentified,
            SessionError::TransportClosed
            | SessionError::Store(_)
            | SessionError::Codec(_)
            | SessionError::GracefulDisconnect
            | SessionError::PingTimeout
            | SessionError::Lossy
            | SessionError::ResumeFailed
            | SessionError::Unknown(_) => CloseCode::UnknownError,
        }
    }

    /// Whether the Registry should keep this session's pending queue alive
    /// for a later RESUME. Distinct from [`CloseCode::resumable`] because
    /// a lossy pending queue forces a full reconnect even though it shares
    /// [`CloseCode::UnknownError`]'s wire code with ordinary resumable
    /// failures.
    pub fn resumable(&self) -> bool {
        match self {
            SessionError::Lossy => false,
            _ => self.close_code().resumable(),
        }
    }
}
