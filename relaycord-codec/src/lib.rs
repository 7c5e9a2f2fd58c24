//! Frame encoding/decoding, integer normalization, and zlib-stream
//! compression for the relaycord gateway wire protocol.
#![deny(unsafe_code)]

pub mod compression;
pub mod error;
pub mod normalize;

pub use compression::ZlibStreamEncoder;
pub use error::CodecError;
pub use normalize::normalize_integers;

use relaycord_model::RawInboundFrame;
use serde::Serialize;

/// Wire encoding selected by a connection's query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    MsgPack,
}

/// Serialize `frame` for a connection with the given encoding and, if
/// `compressor` is `Some`, run the serialized bytes through the shared
/// zlib-stream context. Integer normalization is applied before either
/// serialization path sees the value, so both JSON and MessagePack clients
/// observe the same stringified large integers.
pub fn encode<D: Serialize>(
    frame: &D,
    encoding: Encoding,
    compressor: Option<&mut ZlibStreamEncoder>,
) -> Result<Vec<u8>, CodecError> {
    let mut value = serde_json::to_value(frame)?;
    normalize_integers(&mut value);

    let raw = match encoding {
        Encoding::Json => serde_json::to_vec(&value)?,
        Encoding::MsgPack => rmp_serde::to_vec_named(&value)
            .map_err(|e| CodecError::BadFrame(e.to_string()))?,
    };

    match compressor {
        Some(c) => Ok(c.compress(&raw)?),
        None => Ok(raw),
    }
}

/// Decode an inbound client frame. Decompression of inbound frames is not
/// part of this protocol (clients only ever send small, uncompressed
/// IDENTIFY/RESUME frames) — `bytes` is the raw WebSocket message payload.
pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<RawInboundFrame, CodecError> {
    match encoding {
        Encoding::Json => Ok(serde_json::from_slice(bytes)?),
        Encoding::MsgPack => Ok(rmp_serde::from_slice(bytes)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycord_model::{Frame, HelloData};

    #[test]
    fn json_round_trip_without_compression() {
        let frame = Frame::hello(HelloData { rate_limit: 60 });
        let bytes = encode(&frame, Encoding::Json, None).unwrap();
        let decoded = decode(&bytes, Encoding::Json).unwrap();
        assert_eq!(decoded.d.unwrap()["rate_limit"], 60);
    }

    #[test]
    fn msgpack_round_trip_without_compression() {
        let frame = Frame::hello(HelloData { rate_limit: 60 });
        let bytes = encode(&frame, Encoding::MsgPack, None).unwrap();
        let decoded = decode(&bytes, Encoding::MsgPack).unwrap();
        assert_eq!(decoded.d.unwrap()["rate_limit"], 60);
    }

    #[test]
    fn large_integers_in_event_data_are_stringified() {
        let frame = Frame::event("TEST", 1, serde_json::json!({"id": 9007199254740993u64}));
        let bytes = encode(&frame, Encoding::Json, None).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"9007199254740993\""));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode(b"not json", Encoding::Json);
        assert!(result.is_err());
    }
}
