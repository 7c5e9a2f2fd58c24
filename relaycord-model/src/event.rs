//! The upstream domain event envelope.
//!
//! This is the shape the bus consumer decodes from MessagePack and the
//! Registry routes. It is deliberately opaque in `data` — the gateway does
//! not interpret event bodies, only their addressing fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snowflake::Snowflake;

/// An upstream domain event, as produced onto the bus by other services.
///
/// Exactly one of the four addressing fields is expected to be set by the
/// producer; if more than one is set, routing priority is
/// `guild_id > guild_ids > user_id > user_ids` (see [`Event::route_kind`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub guild_ids: Option<Vec<Snowflake>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_ids: Option<Vec<Snowflake>>,
}

/// Which addressing field is authoritative for a given event, per the
/// `guild_id > guild_ids > user_id > user_ids` tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    Guild(Snowflake),
    Guilds(Vec<Snowflake>),
    User(Snowflake),
    Users(Vec<Snowflake>),
    /// None of the four addressing fields were set; nothing to route.
    Unaddressed,
}

impl Event {
    pub fn route_kind(&self) -> RouteKind {
        if let Some(g) = self.guild_id {
            RouteKind::Guild(g)
        } else if let Some(gs) = &self.guild_ids {
            RouteKind::Guilds(gs.clone())
        } else if let Some(u) = self.user_id {
            RouteKind::User(u)
        } else if let Some(us) = &self.user_ids {
            RouteKind::Users(us.clone())
        } else {
            RouteKind::Unaddressed
        }
    }

    /// A copy of this event addressed to a single guild, used when fanning
    /// `guild_ids` out into per-guild deliveries.
    pub fn for_guild(&self, guild_id: Snowflake) -> Event {
        Event {
            name: self.name.clone(),
            data: self.data.clone(),
            guild_id: Some(guild_id),
            guild_ids: None,
            user_id: None,
            user_ids: None,
        }
    }

    /// A copy of this event addressed to a single user, used when fanning
    /// `user_ids` out into per-user deliveries.
    pub fn for_user(&self, user_id: Snowflake) -> Event {
        Event {
            name: self.name.clone(),
            data: self.data.clone(),
            guild_id: None,
            guild_ids: None,
            user_id: Some(user_id),
            user_ids: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_id_wins_over_every_other_field() {
        let event = Event {
            name: "TEST".into(),
            data: Value::Null,
            guild_id: Some(Snowflake::new(1)),
            guild_ids: Some(vec![Snowflake::new(2)]),
            user_id: Some(Snowflake::new(3)),
            user_ids: None,
        };
        assert_eq!(event.route_kind(), RouteKind::Guild(Snowflake::new(1)));
    }

    #[test]
    fn guild_ids_wins_over_user_fields() {
        let event = Event {
            name: "TEST".into(),
            data: Value::Null,
            guild_id: None,
            guild_ids: Some(vec![Snowflake::new(2)]),
            user_id: Some(Snowflake::new(3)),
            user_ids: None,
        };
        assert_eq!(event.route_kind(), RouteKind::Guilds(vec![Snowflake::new(2)]));
    }

    #[test]
    fn unaddressed_when_nothing_set() {
        let event = Event { name: "TEST".into(), data: Value::Null, guild_id: None, guild_ids: None, user_id: None, user_ids: None };
        assert_eq!(event.route_kind(), RouteKind::Unaddressed);
    }
}
