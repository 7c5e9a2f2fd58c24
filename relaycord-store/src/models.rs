//! Read-only projections of domain entities used while building a Ready
//! snapshot. These mirror the wide-column schema in the backing store
//! (`users`, `guilds`, `channels`, `members`, `roles`, ...) without
//! depending on any particular driver's row type — [`crate::StoreAdapter`]
//! implementations map their own row types onto these.

use relaycord_model::Snowflake;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub flags: i32,
    pub bot: bool,
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildRecord {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub splash: Option<String>,
    pub discovery_splash: Option<String>,
    pub owner_id: Snowflake,
    pub default_permissions: i64,
    pub afk_channel_id: Option<Snowflake>,
    pub afk_timeout: i32,
    pub default_message_notification_level: i32,
    pub explicit_content_filter: i32,
    pub mfa_level: i32,
    pub system_channel_id: Option<Snowflake>,
    pub system_channel_flags: i32,
    pub rules_channel_id: Option<Snowflake>,
    pub max_presences: Option<i32>,
    pub max_members: Option<i32>,
    pub vanity_url_code: Option<String>,
    pub description: Option<String>,
    pub banner: Option<String>,
    pub preferred_locale: String,
    pub guild_updates_channel_id: Option<Snowflake>,
    pub nsfw_level: i32,
    pub verification_level: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelRecord {
    Category(CategoryChannel),
    GuildText(GuildTextChannel),
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryChannel {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub position: i32,
    pub parent_id: Option<Snowflake>,
    pub nsfw: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildTextChannel {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub position: i32,
    pub parent_id: Option<Snowflake>,
    pub nsfw: bool,
    pub rate_limit_per_user: i32,
    pub topic: Option<String>,
    pub last_message_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleRecord {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub color: i32,
    pub viewable: bool,
    pub icon: Option<String>,
    pub unicode_emoji: Option<String>,
    pub position: i32,
    pub permissions: i64,
    pub mentionable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipRecord {
    pub target_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: i32,
    pub user: UserRecordRedacted,
}

/// A [`UserRecord`] with `password`/`email` fields never having existed in
/// the first place — the store adapter's `relationships` selector never
/// reads those columns, matching the `.defer(['password', 'email'])`
/// projection in the original.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecordRedacted {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub flags: i32,
    pub bot: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceRecord {
    pub user_id: Snowflake,
    pub status: String,
    pub client_status: String,
    pub activities: Vec<ActivityRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub user_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: i32,
    pub created_at: String,
    pub content: Option<String>,
    pub stream_url: Option<String>,
    pub emoji_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadStateRecord {
    pub channel_id: Snowflake,
    pub last_read_message_id: Option<Snowflake>,
    pub mention_count: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsRecord {
    pub locale: String,
    pub developer_mode: bool,
    pub theme: String,
    pub status: String,
    pub mfa_enabled: bool,
    pub friend_requests_off: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectChannelRecord {
    pub id: Snowflake,
    pub last_message_id: Option<Snowflake>,
    pub recipients: Vec<UserRecordRedacted>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDirectChannelRecord {
    pub id: Snowflake,
    pub last_message_id: Option<Snowflake>,
    pub owner_id: Snowflake,
    pub icon: Option<String>,
    pub recipients: Vec<UserRecordRedacted>,
}
