//! Read-only selectors over the wide-column store backing the relaycord
//! gateway, plus the two write paths the Session state machine needs
//! during IDENTIFY/CLOSING: the per-user session quota counter and
//! presence upsert/invisibility.
//!
//! The gateway treats the actual database as an external collaborator
//! (spec §6): this crate exposes a narrow [`StoreAdapter`] trait and one
//! concrete implementation, [`ScyllaStoreAdapter`], backed by the `scylla`
//! driver. A second, in-memory implementation lives behind `cfg(test)` in
//! [`memory`] and is what the session state-machine tests in
//! `relaycord-session` are built against.
#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod models;
pub mod scylla_store;

pub use error::StoreError;
pub use memory::InMemoryStoreAdapter;
pub use scylla_store::ScyllaStoreAdapter;

use async_trait::async_trait;
use relaycord_model::Snowflake;
use models::{
    ChannelRecord, DirectChannelRecord, GroupDirectChannelRecord, GuildRecord, PresenceRecord,
    ReadStateRecord, RelationshipRecord, RoleRecord, SettingsRecord, UserRecord,
};

/// Default per-user gateway session quota, re-issued every `SESSION_LIMIT_TTL`.
pub const DEFAULT_SESSION_LIMIT: i32 = 1000;

/// TTL of a session-limit counter row, matching the original's
/// `GatewaySessionLimit.__options__['default_time_to_live'] = 43200` (12h).
pub const SESSION_LIMIT_TTL_SECS: u64 = 43_200;

/// A preferred presence status, as stored in a user's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Invisible,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Idle => "idle",
            PresenceStatus::Dnd => "dnd",
            PresenceStatus::Invisible => "invisible",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "idle" => PresenceStatus::Idle,
            "dnd" => PresenceStatus::Dnd,
            "invisible" => PresenceStatus::Invisible,
            _ => PresenceStatus::Online,
        }
    }
}

/// Read-only (plus two narrow write paths) selectors the Session state
/// machine needs. Every method may suspend (network I/O against the
/// store); per spec §5 these must never block the reactor thread — the
/// `scylla` driver's own async I/O satisfies that without a separate
/// blocking-pool dispatch (see DESIGN.md).
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// The opaque secret used as the HMAC key for token verification.
    /// `None` if no such user exists.
    async fn user_password_hash(&self, user_id: Snowflake) -> Result<Option<Vec<u8>>, StoreError>;

    async fn user_by_id(&self, user_id: Snowflake) -> Result<Option<UserRecord>, StoreError>;

    async fn joined_guild_ids(&self, user_id: Snowflake) -> Result<Vec<Snowflake>, StoreError>;

    async fn guild(&self, guild_id: Snowflake) -> Result<Option<GuildRecord>, StoreError>;

    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<ChannelRecord>, StoreError>;

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<RoleRecord>, StoreError>;

    async fn guild_features(&self, guild_id: Snowflake) -> Result<Vec<String>, StoreError>;

    /// Relationships for `user_id`, each carrying an embedded, redacted
    /// `user`. Returns `(relationships, friend_presences)` where the
    /// second element holds the presence (with activities) of every
    /// `type == friend` relationship target that currently has one,
    /// matching the original's combined selector.
    async fn relationships(
        &self,
        user_id: Snowflake,
    ) -> Result<(Vec<RelationshipRecord>, Vec<PresenceRecord>), StoreError>;

    async fn presence(&self, user_id: Snowflake) -> Result<Option<PresenceRecord>, StoreError>;

    async fn read_states(&self, user_id: Snowflake) -> Result<Vec<ReadStateRecord>, StoreError>;

    /// Settings with `mfa_code` never read, matching the original's
    /// `.defer(['mfa_code'])` projection.
    async fn settings(&self, user_id: Snowflake) -> Result<SettingsRecord, StoreError>;

    /// `(direct, grouped)` DM channels the user is a recipient of.
    async fn user_dm_channels(
        &self,
        user_id: Snowflake,
    ) -> Result<(Vec<DirectChannelRecord>, Vec<GroupDirectChannelRecord>), StoreError>;

    /// Atomically decrement the user's remaining gateway session quota.
    /// Returns `false` if the quota was already exhausted. Creates a
    /// fresh counter row with [`DEFAULT_SESSION_LIMIT`] on first use for
    /// this user.
    async fn session_limit_dec(&self, user_id: Snowflake) -> Result<bool, StoreError>;

    /// Upsert the user's presence row to `status`/`client`, creating it if
    /// absent.
    async fn presence_upsert(
        &self,
        user_id: Snowflake,
        status: PresenceStatus,
        client: &str,
    ) -> Result<(), StoreError>;

    /// Set presence to `invisible`, unless the user's preferred status
    /// (from settings) is already `invisible`, in which case this is a
    /// no-op — matching the original's `_delete_presence`.
    async fn presence_mark_invisible(&self, user_id: Snowflake) -> Result<(), StoreError>;
}
