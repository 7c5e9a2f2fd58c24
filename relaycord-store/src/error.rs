//! Store adapter error type.

use thiserror::Error;

/// Errors raised by a [`crate::StoreAdapter`] implementation.
///
/// `NotFound` is deliberately absent: per spec, a missing optional record
/// (presence, session-limit counter) is not an error at this boundary, it
/// is modeled as `Option::None` and synthesized with defaults by the
/// caller. This enum only covers failures the session layer cannot recover
/// from on its own.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(#[from] scylla::transport::errors::QueryError),

    #[error("store connection failed: {0}")]
    Connect(#[from] scylla::transport::errors::NewSessionError),

    #[error("store row decode failed: {0}")]
    RowDecode(String),

    #[error("referenced record is missing: {0}")]
    Inconsistent(String),
}
