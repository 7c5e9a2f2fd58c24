//! Wire models and shared types for the relaycord gateway.
//!
//! This crate has no I/O of its own: it defines the opcodes, close codes,
//! intents bitfield, frame shapes, and the upstream event envelope that the
//! rest of the workspace builds on.
#![deny(unsafe_code)]

pub mod close_code;
pub mod event;
pub mod frame;
pub mod intents;
pub mod opcode;
pub mod snowflake;

pub use close_code::CloseCode;
pub use event::{Event, RouteKind};
pub use frame::{
    ClientOs, ConnectionProperties, Frame, HelloData, IdentifyPayload, RawInboundFrame,
    ResumePayload,
};
pub use intents::Intents;
pub use opcode::OpCode;
pub use snowflake::Snowflake;
