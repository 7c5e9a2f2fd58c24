//! Wire frame shapes exchanged between the gateway and a connected client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intents::Intents;
use crate::opcode::OpCode;

/// A single wire frame, generic over the payload carried in `d`.
///
/// Event frames (`op=0`) carry `t`/`s`; every other opcode leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<D> {
    pub op: OpCode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub d: Option<D>,
}

impl<D> Frame<D> {
    pub fn hello(d: D) -> Self {
        Frame { op: OpCode::Hello, t: None, s: None, d: Some(d) }
    }

    pub fn event(name: impl Into<String>, sequence: u64, d: D) -> Self {
        Frame { op: OpCode::Dispatch, t: Some(name.into()), s: Some(sequence), d: Some(d) }
    }
}

/// An inbound frame before its opcode or `d` have been validated.
///
/// `op` is decoded as a plain integer rather than the typed [`OpCode`]
/// `Frame<D>` uses for outbound frames: a structurally valid frame naming an
/// opcode nobody defined (e.g. `{"op":99,"d":{}}`) must still decode
/// successfully, so the caller can reject it as `InvalidOpcode` (4003)
/// rather than have the unknown discriminant fail frame decode itself and
/// surface as `InvalidJson` (4002). The gateway reads this first, resolves
/// `op` via [`OpCode::from_u8`], then re-parses `d` into `IdentifyPayload`
/// or `ResumePayload` once the opcode is known to be legal.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInboundFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
}

impl RawInboundFrame {
    /// The opcode this frame names, `None` if `op` matches no defined
    /// opcode.
    pub fn op_code(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }
}

/// `HELLO` payload: `{rate_limit: int}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HelloData {
    pub rate_limit: u32,
}

/// Operating systems a client may report in `ConnectionProperties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientOs {
    Linux,
    Darwin,
    Windows,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: ClientOs,
    pub browser: String,
    pub device: String,
}

/// `IDENTIFY` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    #[serde(default)]
    pub intents: Intents,
    pub properties: ConnectionProperties,
}

/// `RESUME` payload — re-bind to a session within its grace window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub session_id: String,
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_frame_omits_t_and_s() {
        let frame = Frame::hello(HelloData { rate_limit: 60 });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["op"], 1);
        assert!(json.get("t").is_none());
        assert!(json.get("s").is_none());
        assert_eq!(json["d"]["rate_limit"], 60);
    }

    #[test]
    fn event_frame_carries_t_and_s() {
        let frame = Frame::event("READY", 1, serde_json::json!({"ok": true}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["op"], 0);
        assert_eq!(json["t"], "READY");
        assert_eq!(json["s"], 1);
    }

    #[test]
    fn identify_payload_parses_properties() {
        let raw = r#"{
            "token": "abc.def.ghi",
            "intents": 5,
            "properties": {"os": "linux", "browser": "x", "device": "relaycord test"}
        }"#;
        let payload: IdentifyPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.intents, Intents::GUILDS | Intents::GUILD_PRESENCES);
        assert_eq!(payload.properties.os, ClientOs::Linux);
    }
}
