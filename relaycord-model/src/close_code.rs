//! WebSocket close codes used when tearing down a session.

/// Close codes sent to clients when a session ends.
///
/// See the external interface table: every code in the 4000 range carries a
/// fixed resumability contract that the session state machine must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error, please reconnect.
    UnknownError = 4000,
    /// Invalid handshake parameter (bad `v`/`encoding`/`compress`).
    InvalidHandshake = 4001,
    /// Invalid JSON / MessagePack frame.
    InvalidJson = 4002,
    /// Invalid opcode for the current state.
    InvalidOpcode = 4003,
    /// Invalid IDENTIFY payload shape.
    InvalidPayload = 4004,
    /// Token failed validation.
    InvalidToken = 4005,
    /// Per-user session quota exhausted.
    SessionLimitReached = 4006,
    /// A second IDENTIFY was sent on an already-identified session.
    AlreadyIdentified = 4007,
}

impl CloseCode {
    /// Whether a client may reconnect with the same `session_id` and expect
    /// buffered events to still be retained.
    pub const fn resumable(self) -> bool {
        matches!(self, CloseCode::UnknownError | CloseCode::AlreadyIdentified)
    }

    /// Short human-readable reason sent alongside the close frame.
    pub const fn reason(self) -> &'static str {
        match self {
            CloseCode::UnknownError => "unknown error, please reconnect",
            CloseCode::InvalidHandshake => "invalid handshake parameter",
            CloseCode::InvalidJson => "invalid json object",
            CloseCode::InvalidOpcode => "invalid op code",
            CloseCode::InvalidPayload => "invalid data sent",
            CloseCode::InvalidToken => "authentication failed",
            CloseCode::SessionLimitReached => "connection limit reached",
            CloseCode::AlreadyIdentified => "already identified",
        }
    }

    /// The raw u16 value sent on the wire.
    pub const fn code(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumable_codes_match_spec_table() {
        assert!(CloseCode::UnknownError.resumable());
        assert!(CloseCode::AlreadyIdentified.resumable());
        assert!(!CloseCode::InvalidToken.resumable());
        assert!(!CloseCode::SessionLimitReached.resumable());
    }

    #[test]
    fn code_values() {
        assert_eq!(CloseCode::InvalidHandshake.code(), 4001);
        assert_eq!(CloseCode::AlreadyIdentified.code(), 4007);
    }
}
