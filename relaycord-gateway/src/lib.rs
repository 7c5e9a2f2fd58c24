//! Gateway Entry: the WebSocket accept point and process bootstrap for the
//! relaycord gateway.
//!
//! Wires the rest of the workspace together — the Registry, the Store
//! adapter, the Bus consumer, and the Session state machine — behind a
//! single `axum` upgrade route.

pub mod config;
pub mod entry;
pub mod error;

pub use entry::{router, GatewayState};

#[cfg(feature = "performance")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
