//! The event-bus consumer.
//!
//! Subscribes to a fixed set of upstream topics and hands every decoded
//! [`Event`] straight to the [`Registry`], performing no routing or
//! business logic of its own — that all lives in the Registry's fan-out
//! rules. A message whose payload doesn't decode as an `Event` is logged
//! and dropped; the consumer loop never panics on bad input.
#![deny(unsafe_code)]

pub mod error;

pub use error::BusError;

use std::sync::Arc;

use futures_util::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use relaycord_model::Event;
use relaycord_registry::Registry;

/// The fixed set of upstream topics every gateway process subscribes to.
pub const TOPICS: &[&str] = &[
    "guilds",
    "channels",
    "direct_messages",
    "messages",
    "reactions",
    "roles",
    "users",
    "security",
    "presences",
    "members",
    "relationships",
];

pub struct BusConsumer {
    consumer: StreamConsumer,
}

impl BusConsumer {
    /// Connect to the bus and subscribe to [`TOPICS`]. `bootstrap_servers`
    /// is a comma-separated host:port list, matching `get_hosts()` in the
    /// original configuration loader.
    pub fn connect(bootstrap_servers: &str, group_id: &str) -> Result<Self, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()?;

        consumer.subscribe(TOPICS)?;
        Ok(Self { consumer })
    }

    /// Drive the consumer loop to completion (it does not return on its
    /// own — intended to be spawned as its own `tokio::task`).
    pub async fn run(self, registry: Arc<Registry>) {
        let mut stream = self.consumer.stream();
        while let Some(message) = stream.next().await {
            let borrowed = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "bus consumer stream error, continuing");
                    continue;
                }
            };

            let Some(payload) = borrowed.payload() else {
                tracing::warn!(topic = borrowed.topic(), "bus message with no payload, skipping");
                continue;
            };

            match decode_event(payload) {
                Ok(event) => registry.dispatch(event),
                Err(err) => {
                    tracing::warn!(
                        topic = borrowed.topic(),
                        error = %err,
                        "dropping bus message with undecodable payload",
                    );
                }
            }
        }
    }
}

fn decode_event(payload: &[u8]) -> Result<Event, rmp_serde::decode::Error> {
    rmp_serde::from_slice(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_well_formed_event() {
        let event = Event {
            name: "MESSAGE_CREATE".into(),
            data: json!({"content": "hi"}),
            guild_id: Some(relaycord_model::Snowflake::new(1)),
            guild_ids: None,
            user_id: None,
            user_ids: None,
        };
        let bytes = rmp_serde::to_vec_named(&event).unwrap();
        let decoded = decode_event(&bytes).unwrap();
        assert_eq!(decoded.name, "MESSAGE_CREATE");
        assert_eq!(decoded.guild_id, Some(relaycord_model::Snowflake::new(1)));
    }

    #[test]
    fn garbage_payload_fails_to_decode_without_panicking() {
        assert!(decode_event(b"not msgpack at all").is_err());
    }
}
