//! An in-memory [`StoreAdapter`], used by the session state-machine test
//! suite in `relaycord-session` and by this crate's own unit tests.
//! Grounded in the teacher's `InMemoryCache` shape (a `DashMap` per entity
//! kind), generalized from a TTL read cache to a small seedable fixture.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use relaycord_model::Snowflake;

use crate::models::{
    ChannelRecord, DirectChannelRecord, GroupDirectChannelRecord, GuildRecord, PresenceRecord,
    ReadStateRecord, RelationshipRecord, RoleRecord, SettingsRecord, UserRecord,
};
use crate::{PresenceStatus, StoreAdapter, StoreError, DEFAULT_SESSION_LIMIT};

#[derive(Default)]
pub struct InMemoryStoreAdapter {
    pub users: DashMap<Snowflake, UserRecord>,
    pub password_hashes: DashMap<Snowflake, Vec<u8>>,
    pub memberships: DashMap<Snowflake, Vec<Snowflake>>,
    pub guilds: DashMap<Snowflake, GuildRecord>,
    pub channels: DashMap<Snowflake, Vec<ChannelRecord>>,
    pub roles: DashMap<Snowflake, Vec<RoleRecord>>,
    pub features: DashMap<Snowflake, Vec<String>>,
    pub relationships: DashMap<Snowflake, Vec<RelationshipRecord>>,
    pub presences: DashMap<Snowflake, Mutex<PresenceRecord>>,
    pub read_states: DashMap<Snowflake, Vec<ReadStateRecord>>,
    pub settings: DashMap<Snowflake, SettingsRecord>,
    pub direct_channels: DashMap<Snowflake, (Vec<DirectChannelRecord>, Vec<GroupDirectChannelRecord>)>,
    pub session_limits: DashMap<Snowflake, AtomicI32>,
}

impl InMemoryStoreAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user with a password hash used directly as the HMAC key —
    /// tests build tokens against this same value.
    pub fn seed_user(&self, user: UserRecord, password_hash: impl Into<Vec<u8>>) {
        self.password_hashes.insert(user.id, password_hash.into());
        self.users.insert(user.id, user);
    }

    pub fn seed_membership(&self, user_id: Snowflake, guild_ids: Vec<Snowflake>) {
        self.memberships.insert(user_id, guild_ids);
    }

    pub fn seed_guild(&self, guild: GuildRecord) {
        self.guilds.insert(guild.id, guild);
    }

    pub fn seed_session_limit(&self, user_id: Snowflake, remaining: i32) {
        self.session_limits.insert(user_id, AtomicI32::new(remaining));
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStoreAdapter {
    async fn user_password_hash(&self, user_id: Snowflake) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.password_hashes.get(&user_id).map(|v| v.clone()))
    }

    async fn user_by_id(&self, user_id: Snowflake) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(&user_id).map(|v| v.clone()))
    }

    async fn joined_guild_ids(&self, user_id: Snowflake) -> Result<Vec<Snowflake>, StoreError> {
        Ok(self.memberships.get(&user_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn guild(&self, guild_id: Snowflake) -> Result<Option<GuildRecord>, StoreError> {
        Ok(self.guilds.get(&guild_id).map(|v| v.clone()))
    }

    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<ChannelRecord>, StoreError> {
        Ok(self.channels.get(&guild_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<RoleRecord>, StoreError> {
        Ok(self.roles.get(&guild_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn guild_features(&self, guild_id: Snowflake) -> Result<Vec<String>, StoreError> {
        Ok(self.features.get(&guild_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn relationships(
        &self,
        user_id: Snowflake,
    ) -> Result<(Vec<RelationshipRecord>, Vec<PresenceRecord>), StoreError> {
        let rels = self.relationships.get(&user_id).map(|v| v.clone()).unwrap_or_default();
        let mut friend_presences = Vec::new();
        for rel in &rels {
            if rel.kind == 0 {
                if let Some(p) = self.presences.get(&rel.target_id) {
                    friend_presences.push(p.lock().clone());
                }
            }
        }
        Ok((rels, friend_presences))
    }

    async fn presence(&self, user_id: Snowflake) -> Result<Option<PresenceRecord>, StoreError> {
        Ok(self.presences.get(&user_id).map(|p| p.lock().clone()))
    }

    async fn read_states(&self, user_id: Snowflake) -> Result<Vec<ReadStateRecord>, StoreError> {
        Ok(self.read_states.get(&user_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn settings(&self, user_id: Snowflake) -> Result<SettingsRecord, StoreError> {
        self.settings
            .get(&user_id)
            .map(|v| v.clone())
            .ok_or_else(|| StoreError::Inconsistent(format!("no settings row for user {user_id}")))
    }

    async fn user_dm_channels(
        &self,
        user_id: Snowflake,
    ) -> Result<(Vec<DirectChannelRecord>, Vec<GroupDirectChannelRecord>), StoreError> {
        Ok(self.direct_channels.get(&user_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn session_limit_dec(&self, user_id: Snowflake) -> Result<bool, StoreError> {
        let counter = self
            .session_limits
            .entry(user_id)
            .or_insert_with(|| AtomicI32::new(DEFAULT_SESSION_LIMIT));

        loop {
            let current = counter.load(Ordering::SeqCst);
            if current <= 0 {
                return Ok(false);
            }
            if counter
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(true);
            }
        }
    }

    async fn presence_upsert(
        &self,
        user_id: Snowflake,
        status: PresenceStatus,
        client: &str,
    ) -> Result<(), StoreError> {
        let activities = self.presences.get(&user_id).map(|p| p.lock().activities.clone()).unwrap_or_default();
        self.presences.insert(
            user_id,
            Mutex::new(PresenceRecord {
                user_id,
                status: status.as_str().to_string(),
                client_status: client.to_string(),
                activities,
            }),
        );
        Ok(())
    }

    async fn presence_mark_invisible(&self, user_id: Snowflake) -> Result<(), StoreError> {
        let preferred = self.settings(user_id).await?.status;
        if preferred == "invisible" {
            return Ok(());
        }
        if let Some(presence) = self.presences.get(&user_id) {
            presence.lock().status = "invisible".to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> UserRecord {
        UserRecord {
            id: Snowflake::new(id),
            username: "tester".into(),
            discriminator: "0001".into(),
            avatar: None,
            banner: None,
            flags: 0,
            bot: false,
            verified: Some(true),
        }
    }

    #[tokio::test]
    async fn session_limit_dec_reaches_exhaustion() {
        let store = InMemoryStoreAdapter::new();
        store.seed_user(user(1), b"hash".to_vec());
        store.seed_session_limit(Snowflake::new(1), 2);

        assert!(store.session_limit_dec(Snowflake::new(1)).await.unwrap());
        assert!(store.session_limit_dec(Snowflake::new(1)).await.unwrap());
        assert!(!store.session_limit_dec(Snowflake::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn session_limit_dec_creates_default_quota_on_first_use() {
        let store = InMemoryStoreAdapter::new();
        assert!(store.session_limit_dec(Snowflake::new(99)).await.unwrap());
    }

    #[tokio::test]
    async fn presence_mark_invisible_is_noop_when_already_invisible() {
        let store = InMemoryStoreAdapter::new();
        store.settings.insert(
            Snowflake::new(1),
            SettingsRecord {
                locale: "en-US".into(),
                developer_mode: false,
                theme: "dark".into(),
                status: "invisible".into(),
                mfa_enabled: false,
                friend_requests_off: false,
            },
        );
        store.presence_upsert(Snowflake::new(1), PresenceStatus::Online, "web").await.unwrap();
        store.presence_mark_invisible(Snowflake::new(1)).await.unwrap();
        // preferred status was invisible, so the online upsert above stands untouched
        let presence = store.presence(Snowflake::new(1)).await.unwrap().unwrap();
        assert_eq!(presence.status, "online");
    }
}
