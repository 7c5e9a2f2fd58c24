//! Token validation error type.

use thiserror::Error;

/// Errors produced while validating a bearer token.
///
/// Every variant maps to the same close code at the protocol boundary
/// (4005, per spec), but they are kept distinct here for logging and
/// testing purposes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token is not in `id.payload.signature` shape")]
    Malformed,

    #[error("token's id segment is not valid base64")]
    BadUserIdEncoding,

    #[error("token's signature segment is not valid base64")]
    BadSignatureEncoding,

    #[error("no user exists for the token's id segment")]
    UnknownUser,

    #[error("signature does not match")]
    BadSignature,
}
