//! Gateway-entry-level error types.
//!
//! Distinct from [`relaycord_session::SessionError`]: everything here
//! happens before a [`relaycord_session::Session`] exists, so there is no
//! close code to send — only an HTTP response rejecting the upgrade.

use thiserror::Error;

use crate::config::ConfigError;

/// Why an accept-time handshake was rejected, before the WebSocket upgrade
/// ever completes. Every variant corresponds to spec's 4001 *Invalid
/// handshake parameter*, carried as the HTTP response body since no
/// close frame can be sent yet.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("unsupported gateway version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown encoding {0:?}, expected \"json\" or \"msgpack\"")]
    UnknownEncoding(String),
}

/// Failures that can occur during process bootstrap, before the HTTP
/// server starts accepting connections.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store connection failed: {0}")]
    Store(#[from] relaycord_store::StoreError),

    #[error("bus connection failed: {0}")]
    Bus(#[from] relaycord_bus::BusError),

    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
}
