//! Building the READY and GUILD_CREATE event bodies from the store
//! adapter's selectors, per spec §6.

use relaycord_model::Snowflake;
use relaycord_store::models::{
    ChannelRecord, DirectChannelRecord, GroupDirectChannelRecord, PresenceRecord, ReadStateRecord,
    RelationshipRecord, RoleRecord, SettingsRecord,
};
use relaycord_store::StoreAdapter;
use serde::Serialize;

use crate::error::SessionError;

#[derive(Debug, Serialize)]
pub struct DirectMessagesData {
    pub single: Vec<DirectChannelRecord>,
    pub grouped: Vec<GroupDirectChannelRecord>,
}

/// The `d` field of the READY event. Carries `session_id` so the client
/// has something to echo back in a later RESUME.
#[derive(Debug, Serialize)]
pub struct ReadyData {
    pub session_id: String,
    pub settings: SettingsRecord,
    pub read_states: Vec<ReadStateRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub friend_presences: Vec<PresenceRecord>,
    pub guilds: Vec<Snowflake>,
    pub direct_messages: DirectMessagesData,
}

/// The `d` field of a GUILD_CREATE event: the guild record plus its
/// embedded channels, roles and features.
#[derive(Debug, Serialize)]
pub struct GuildCreateData {
    #[serde(flatten)]
    pub guild: relaycord_store::models::GuildRecord,
    pub channels: Vec<ChannelRecord>,
    pub roles: Vec<RoleRecord>,
    pub features: Vec<String>,
}

pub async fn build_ready(
    store: &(impl StoreAdapter + ?Sized),
    user_id: Snowflake,
    session_id: String,
    guild_ids: Vec<Snowflake>,
) -> Result<ReadyData, SessionError> {
    let settings = store.settings(user_id).await?;
    let read_states = store.read_states(user_id).await?;
    let (relationships, friend_presences) = store.relationships(user_id).await?;
    let (single, grouped) = store.user_dm_channels(user_id).await?;

    Ok(ReadyData {
        session_id,
        settings,
        read_states,
        relationships,
        friend_presences,
        guilds: guild_ids,
        direct_messages: DirectMessagesData { single, grouped },
    })
}

/// Build a single GUILD_CREATE body. Returns `Ok(None)` if the guild no
/// longer exists in the store — a membership row without a backing
/// guild is a data inconsistency, not a protocol error, so the caller
/// logs and skips it rather than failing the whole snapshot.
pub async fn build_guild_create(
    store: &(impl StoreAdapter + ?Sized),
    guild_id: Snowflake,
) -> Result<Option<GuildCreateData>, SessionError> {
    let Some(guild) = store.guild(guild_id).await? else { return Ok(None) };
    let channels = store.guild_channels(guild_id).await?;
    let roles = store.guild_roles(guild_id).await?;
    let features = store.guild_features(guild_id).await?;

    Ok(Some(GuildCreateData { guild, channels, roles, features }))
}
