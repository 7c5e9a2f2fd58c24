//! Codec error type.

use thiserror::Error;

/// Errors raised while decoding an inbound frame.
///
/// The only variant the rest of the workspace cares about is `BadFrame`: a
/// decode failure always closes the session with 4002, so the codec does
/// not need a richer taxonomy than "this wasn't a valid frame".
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid frame: {0}")]
    BadFrame(String),

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::BadFrame(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CodecError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CodecError::BadFrame(err.to_string())
    }
}
