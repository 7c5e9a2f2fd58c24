//! Gateway intents.
//!
//! Intents are a bitfield a client sets at IDENTIFY. The gateway does not
//! currently filter dispatch by intent (the Registry fans out by guild/user
//! membership, not by intent), but the bitfield is validated and stored on
//! the session so a future filtering pass has somewhere to read it from.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        const GUILDS = 1 << 0;
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_PRESENCES = 1 << 2;
        const GUILD_MESSAGES = 1 << 3;
        const DIRECT_MESSAGES = 1 << 4;
        const RELATIONSHIPS = 1 << 5;

        const NON_PRIVILEGED = Self::GUILDS.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::DIRECT_MESSAGES.bits()
            | Self::RELATIONSHIPS.bits();

        const PRIVILEGED = Self::GUILD_MEMBERS.bits() | Self::GUILD_PRESENCES.bits();

        const ALL = Self::NON_PRIVILEGED.bits() | Self::PRIVILEGED.bits();
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::NON_PRIVILEGED
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Intents::from_bits_truncate(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_union() {
        let intents = Intents::GUILDS | Intents::GUILD_MESSAGES;
        assert!(intents.contains(Intents::GUILDS));
        assert!(!intents.contains(Intents::GUILD_MEMBERS));
    }

    #[test]
    fn round_trips_through_json() {
        let intents = Intents::GUILDS | Intents::DIRECT_MESSAGES;
        let json = serde_json::to_string(&intents).unwrap();
        let back: Intents = serde_json::from_str(&json).unwrap();
        assert_eq!(intents, back);
    }
}
