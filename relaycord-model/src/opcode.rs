//! Gateway operation codes.
//!
//! Opcodes select the shape of the `d` field in a [`crate::frame::Frame`] and
//! whether a frame carries `t`/`s`.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Operation codes used on the gateway wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OpCode {
    /// Dispatch — a domain event, carries `t` and `s`.
    /// Direction: server -> client.
    Dispatch = 0,

    /// Hello — sent immediately after the socket accepts, carries `rate_limit`.
    /// Direction: server -> client.
    Hello = 1,

    /// Identify — authenticate the connection.
    /// Direction: client -> server.
    Identify = 2,

    /// Resume — re-bind to a session that is within its resume grace window.
    /// Direction: client -> server.
    Resume = 6,
}

impl OpCode {
    /// Whether the server ever sends this opcode.
    pub const fn is_outbound(self) -> bool {
        matches!(self, OpCode::Dispatch | OpCode::Hello)
    }

    /// Whether a client is allowed to send this opcode.
    pub const fn is_inbound(self) -> bool {
        matches!(self, OpCode::Identify | OpCode::Resume)
    }

    /// Look up the opcode a raw wire integer names, `None` if it matches
    /// none of the above. Used to validate an inbound frame's `op` after
    /// it has already decoded successfully as a plain integer, so an
    /// unrecognized-but-well-formed opcode is a protocol error (4003), not
    /// a decode failure (4002).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OpCode::Dispatch),
            1 => Some(OpCode::Hello),
            2 => Some(OpCode::Identify),
            6 => Some(OpCode::Resume),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_serializes_as_small_int() {
        assert_eq!(serde_json::to_string(&OpCode::Hello).unwrap(), "1");
        let op: OpCode = serde_json::from_str("2").unwrap();
        assert_eq!(op, OpCode::Identify);
    }

    #[test]
    fn opcode_direction() {
        assert!(OpCode::Dispatch.is_outbound());
        assert!(OpCode::Identify.is_inbound());
        assert!(!OpCode::Identify.is_outbound());
    }

    #[test]
    fn from_u8_resolves_known_codes_and_rejects_unknown() {
        assert_eq!(OpCode::from_u8(2), Some(OpCode::Identify));
        assert_eq!(OpCode::from_u8(6), Some(OpCode::Resume));
        assert_eq!(OpCode::from_u8(99), None);
    }
}
