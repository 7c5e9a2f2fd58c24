//! [`StoreAdapter`] implementation backed by the `scylla` driver.
//!
//! Table names and columns mirror the `cassandra.cqlengine` models the
//! upstream Python service defines (`users`, `members`, `guilds`,
//! `features`, `channels` + `category_channels`/`guild_text_channels`,
//! `dm_channels`, `group_dm_channels`, `recipients`, `relationships`,
//! `roles`, `presences`, `activities`, `settings`, `channel_readstates`,
//! `gateway_session_limit`) — this adapter only reads/writes through CQL,
//! it does not own schema migrations.

use std::sync::Arc;

use async_trait::async_trait;
use relaycord_model::Snowflake;
use scylla::transport::session::Session;
use scylla::{DeserializeRow, SessionBuilder};

use crate::models::{
    ActivityRecord, CategoryChannel, ChannelRecord, DirectChannelRecord, GroupDirectChannelRecord,
    GuildRecord, GuildTextChannel, PresenceRecord, ReadStateRecord,
    RelationshipRecord, RoleRecord, SettingsRecord, UserRecord, UserRecordRedacted,
};
use crate::{PresenceStatus, StoreAdapter, StoreError, DEFAULT_SESSION_LIMIT, SESSION_LIMIT_TTL_SECS};

/// Scratch row shape for `group_dm_channels`, not part of the public
/// model surface since it is immediately folded into
/// [`GroupDirectChannelRecord`] alongside the recipients query.
struct GroupDmChannelRow {
    last_message_id: Option<Snowflake>,
    owner_id: Snowflake,
    icon: Option<String>,
}

pub struct ScyllaStoreAdapter {
    session: Arc<Session>,
}

impl ScyllaStoreAdapter {
    /// Connect to the cluster at `hosts` (comma-split `SCYLLA_HOSTS`) using
    /// `user`/`password` plaintext auth, matching the original's
    /// `PlainTextAuthProvider` + `connection.setup(..., retry_connect=True)`.
    pub async fn connect(
        hosts: &[String],
        user: &str,
        password: &str,
    ) -> Result<Self, StoreError> {
        let session = SessionBuilder::new()
            .known_nodes(hosts)
            .user(user, password)
            .use_keyspace("derailed", false)
            .build()
            .await?;
        tracing::info!(nodes = hosts.len(), "connected to scylla cluster");
        Ok(Self { session: Arc::new(session) })
    }
}

type UserRow = (i64, String, String, Option<String>, Option<String>, i32, bool, Option<bool>);

fn user_row_to_record(r: UserRow) -> UserRecord {
    UserRecord {
        id: Snowflake::new(r.0 as u64),
        username: r.1,
        discriminator: r.2,
        avatar: r.3,
        banner: r.4,
        flags: r.5,
        bot: r.6,
        verified: r.7,
    }
}

#[derive(DeserializeRow)]
struct GuildRow {
    id: i64,
    name: String,
    icon: Option<String>,
    splash: Option<String>,
    discovery_splash: Option<String>,
    owner_id: i64,
    default_permissions: i64,
    afk_channel_id: Option<i64>,
    afk_timeout: i32,
    default_message_notification_level: i32,
    explicit_content_filter: i32,
    mfa_level: i32,
    system_channel_id: Option<i64>,
    system_channel_flags: i32,
    rules_channel_id: Option<i64>,
    max_presences: Option<i32>,
    max_members: Option<i32>,
    vanity_url_code: Option<String>,
    description: Option<String>,
    banner: Option<String>,
    preferred_locale: String,
    guild_updates_channel_id: Option<i64>,
    nsfw_level: i32,
    verification_level: i32,
}

#[async_trait]
impl StoreAdapter for ScyllaStoreAdapter {
    async fn user_password_hash(&self, user_id: Snowflake) -> Result<Option<Vec<u8>>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT password FROM users WHERE id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let row = rows
            .rows::<(String,)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .next();
        match row {
            Some(Ok((password,))) => Ok(Some(password.into_bytes())),
            Some(Err(e)) => Err(StoreError::RowDecode(e.to_string())),
            None => Ok(None),
        }
    }

    async fn user_by_id(&self, user_id: Snowflake) -> Result<Option<UserRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id, username, discriminator, avatar, banner, flags, bot, verified \
                 FROM users WHERE id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let row = rows
            .rows::<UserRow>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .next();
        match row {
            Some(Ok(r)) => Ok(Some(user_row_to_record(r))),
            Some(Err(e)) => Err(StoreError::RowDecode(e.to_string())),
            None => Ok(None),
        }
    }

    async fn joined_guild_ids(&self, user_id: Snowflake) -> Result<Vec<Snowflake>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT guild_id FROM members WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        rows.rows::<(i64,)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| r.map(|(id,)| Snowflake::new(id as u64)).map_err(|e| StoreError::RowDecode(e.to_string())))
            .collect()
    }

    async fn guild(&self, guild_id: Snowflake) -> Result<Option<GuildRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id, name, icon, splash, discovery_splash, owner_id, \
                 default_permissions, afk_channel_id, afk_timeout, \
                 default_message_notification_level, explicit_content_filter, mfa_level, \
                 system_channel_id, system_channel_flags, rules_channel_id, max_presences, \
                 max_members, vanity_url_code, description, banner, preferred_locale, \
                 guild_updates_channel_id, nsfw_level, verification_level \
                 FROM guilds WHERE id = ?",
                (guild_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let row = rows.rows::<GuildRow>().map_err(|e| StoreError::RowDecode(e.to_string()))?.next();
        let row = match row {
            Some(Ok(r)) => r,
            Some(Err(e)) => return Err(StoreError::RowDecode(e.to_string())),
            None => return Ok(None),
        };
        Ok(Some(GuildRecord {
            id: Snowflake::new(row.id as u64),
            name: row.name,
            icon: row.icon,
            splash: row.splash,
            discovery_splash: row.discovery_splash,
            owner_id: Snowflake::new(row.owner_id as u64),
            default_permissions: row.default_permissions,
            afk_channel_id: row.afk_channel_id.map(|v| Snowflake::new(v as u64)),
            afk_timeout: row.afk_timeout,
            default_message_notification_level: row.default_message_notification_level,
            explicit_content_filter: row.explicit_content_filter,
            mfa_level: row.mfa_level,
            system_channel_id: row.system_channel_id.map(|v| Snowflake::new(v as u64)),
            system_channel_flags: row.system_channel_flags,
            rules_channel_id: row.rules_channel_id.map(|v| Snowflake::new(v as u64)),
            max_presences: row.max_presences,
            max_members: row.max_members,
            vanity_url_code: row.vanity_url_code,
            description: row.description,
            banner: row.banner,
            preferred_locale: row.preferred_locale,
            guild_updates_channel_id: row.guild_updates_channel_id.map(|v| Snowflake::new(v as u64)),
            nsfw_level: row.nsfw_level,
            verification_level: row.verification_level,
        }))
    }

    async fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<ChannelRecord>, StoreError> {
        let gid = guild_id.get() as i64;

        let cat_result = self
            .session
            .query_unpaged(
                "SELECT channel_id, guild_id, position, parent_id, nsfw \
                 FROM category_channels WHERE guild_id = ?",
                (gid,),
            )
            .await?;
        let cat_rows = cat_result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let categories: Vec<ChannelRecord> = cat_rows
            .rows::<(i64, i64, i32, Option<i64>, bool)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| {
                r.map(|(id, guild_id, position, parent_id, nsfw)| {
                    ChannelRecord::Category(CategoryChannel {
                        id: Snowflake::new(id as u64),
                        guild_id: Snowflake::new(guild_id as u64),
                        name: String::new(),
                        position,
                        parent_id: parent_id.map(|v| Snowflake::new(v as u64)),
                        nsfw,
                    })
                })
                .map_err(|e| StoreError::RowDecode(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        let text_result = self
            .session
            .query_unpaged(
                "SELECT channel_id, guild_id, position, parent_id, nsfw, \
                 rate_limit_per_user, topic, last_message_id \
                 FROM guild_text_channels WHERE guild_id = ?",
                (gid,),
            )
            .await?;
        let text_rows = text_result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let texts: Vec<ChannelRecord> = text_rows
            .rows::<(i64, i64, i32, Option<i64>, bool, i32, Option<String>, Option<i64>)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| {
                r.map(|(id, guild_id, position, parent_id, nsfw, rl, topic, last_msg)| {
                    ChannelRecord::GuildText(GuildTextChannel {
                        id: Snowflake::new(id as u64),
                        guild_id: Snowflake::new(guild_id as u64),
                        name: String::new(),
                        position,
                        parent_id: parent_id.map(|v| Snowflake::new(v as u64)),
                        nsfw,
                        rate_limit_per_user: rl,
                        topic,
                        last_message_id: last_msg.map(|v| Snowflake::new(v as u64)),
                    })
                })
                .map_err(|e| StoreError::RowDecode(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        Ok(categories.into_iter().chain(texts).collect())
    }

    async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<RoleRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id, guild_id, name, color, viewable, icon, unicode_emoji, position, \
                 permissions, mentionable FROM roles WHERE guild_id = ?",
                (guild_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        rows.rows::<(i64, i64, String, i32, bool, Option<String>, Option<String>, i32, i64, bool)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| {
                r.map(|(id, guild_id, name, color, viewable, icon, emoji, position, perms, mentionable)| {
                    RoleRecord {
                        id: Snowflake::new(id as u64),
                        guild_id: Snowflake::new(guild_id as u64),
                        name,
                        color,
                        viewable,
                        icon,
                        unicode_emoji: emoji,
                        position,
                        permissions: perms,
                        mentionable,
                    }
                })
                .map_err(|e| StoreError::RowDecode(e.to_string()))
            })
            .collect()
    }

    async fn guild_features(&self, guild_id: Snowflake) -> Result<Vec<String>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT value FROM features WHERE guild_id = ?",
                (guild_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        rows.rows::<(String,)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| r.map(|(v,)| v).map_err(|e| StoreError::RowDecode(e.to_string())))
            .collect()
    }

    async fn relationships(
        &self,
        user_id: Snowflake,
    ) -> Result<(Vec<RelationshipRecord>, Vec<PresenceRecord>), StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT target_id, type FROM relationships WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let targets: Vec<(i64, i32)> = rows
            .rows::<(i64, i32)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?;

        let mut relationships = Vec::with_capacity(targets.len());
        let mut friend_presences = Vec::new();

        for (target_id, kind) in targets {
            let target = Snowflake::new(target_id as u64);
            let user = self
                .user_by_id(target)
                .await?
                .ok_or_else(|| StoreError::Inconsistent(format!("relationship target {target} missing")))?;

            relationships.push(RelationshipRecord {
                target_id: target,
                kind,
                user: UserRecordRedacted {
                    id: user.id,
                    username: user.username,
                    discriminator: user.discriminator,
                    avatar: user.avatar,
                    banner: user.banner,
                    flags: user.flags,
                    bot: user.bot,
                },
            });

            // type 0 == friend in the original's relationship encoding.
            if kind == 0 {
                if let Some(presence) = self.presence(target).await? {
                    friend_presences.push(presence);
                }
            }
        }

        Ok((relationships, friend_presences))
    }

    async fn presence(&self, user_id: Snowflake) -> Result<Option<PresenceRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT status, client_status FROM presences WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let row = rows
            .rows::<(String, String)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .next();
        let (status, client_status) = match row {
            Some(Ok(r)) => r,
            Some(Err(e)) => return Err(StoreError::RowDecode(e.to_string())),
            None => return Ok(None),
        };

        let activities = self.activities(user_id).await?;
        Ok(Some(PresenceRecord { user_id, status, client_status, activities }))
    }

    async fn read_states(&self, user_id: Snowflake) -> Result<Vec<ReadStateRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT channel_id, last_read_message_id, mention_count \
                 FROM channel_readstates WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        rows.rows::<(i64, Option<i64>, i32)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| {
                r.map(|(channel_id, last_read, mentions)| ReadStateRecord {
                    channel_id: Snowflake::new(channel_id as u64),
                    last_read_message_id: last_read.map(|v| Snowflake::new(v as u64)),
                    mention_count: mentions,
                })
                .map_err(|e| StoreError::RowDecode(e.to_string()))
            })
            .collect()
    }

    async fn settings(&self, user_id: Snowflake) -> Result<SettingsRecord, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT locale, developer_mode, theme, status, mfa_enabled, \
                 friend_requests_off FROM settings WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let row = rows
            .rows::<(String, bool, String, String, bool, bool)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .next();
        match row {
            Some(Ok((locale, developer_mode, theme, status, mfa_enabled, friend_requests_off))) => {
                Ok(SettingsRecord { locale, developer_mode, theme, status, mfa_enabled, friend_requests_off })
            }
            Some(Err(e)) => Err(StoreError::RowDecode(e.to_string())),
            None => Err(StoreError::Inconsistent(format!("no settings row for user {user_id}"))),
        }
    }

    async fn user_dm_channels(
        &self,
        user_id: Snowflake,
    ) -> Result<(Vec<DirectChannelRecord>, Vec<GroupDirectChannelRecord>), StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT channel_id FROM recipients WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let channel_ids: Vec<i64> = rows
            .rows::<(i64,)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| r.map(|(v,)| v))
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?;

        let mut direct = Vec::new();
        let mut grouped = Vec::new();

        for channel_id in channel_ids {
            let chan_type: Option<(i32,)> = {
                let res = self
                    .session
                    .query_unpaged("SELECT type FROM channels WHERE id = ?", (channel_id,))
                    .await?;
                res.into_rows_result()
                    .map_err(|e| StoreError::RowDecode(e.to_string()))?
                    .rows::<(i32,)>()
                    .map_err(|e| StoreError::RowDecode(e.to_string()))?
                    .next()
                    .transpose()
                    .map_err(|e| StoreError::RowDecode(e.to_string()))?
            };
            let Some((kind,)) = chan_type else { continue };

            let recipients = self.channel_recipients(channel_id, user_id).await?;

            if kind == 1 {
                let last_message_id = self.dm_channel_last_message(channel_id).await?;
                direct.push(DirectChannelRecord {
                    id: Snowflake::new(channel_id as u64),
                    last_message_id,
                    recipients,
                });
            } else if kind == 2 {
                let row = self.group_dm_channel_row(channel_id).await?;
                if let Some(GroupDmChannelRow { last_message_id, owner_id, icon }) = row {
                    grouped.push(GroupDirectChannelRecord {
                        id: Snowflake::new(channel_id as u64),
                        last_message_id,
                        owner_id,
                        icon,
                        recipients,
                    });
                }
            }
        }

        Ok((direct, grouped))
    }

    async fn session_limit_dec(&self, user_id: Snowflake) -> Result<bool, StoreError> {
        // Lightweight-transaction UPDATE: applies only if `remaining > 0`,
        // so two concurrent IDENTIFYs racing for the last slot can never
        // both succeed (Testable Property 7) — unlike the original's
        // read-then-write `_decrease_connection_count`, which can.
        let result = self
            .session
            .query_unpaged(
                "UPDATE gateway_session_limit USING TTL ? SET remaining = remaining - 1 \
                 WHERE user_id = ? IF remaining > 0",
                (SESSION_LIMIT_TTL_SECS as i32, user_id.get() as i64),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let applied = rows
            .rows::<(bool,)>()
            .ok()
            .and_then(|mut it| it.next())
            .and_then(|r| r.ok())
            .map(|(applied,)| applied)
            .unwrap_or(false);

        if applied {
            return Ok(true);
        }

        // No row existed yet (LWT reported not-applied because the
        // partition is empty, not because the counter is exhausted):
        // create one with the default quota, already decremented by one
        // for this connection.
        let insert_result = self
            .session
            .query_unpaged(
                "INSERT INTO gateway_session_limit (user_id, total, remaining, max_concurrency) \
                 VALUES (?, ?, ?, 16) USING TTL ? IF NOT EXISTS",
                (
                    user_id.get() as i64,
                    DEFAULT_SESSION_LIMIT,
                    DEFAULT_SESSION_LIMIT - 1,
                    SESSION_LIMIT_TTL_SECS as i32,
                ),
            )
            .await?;
        let inserted = insert_result
            .into_rows_result()
            .ok()
            .and_then(|r| r.rows::<(bool,)>().ok())
            .and_then(|mut it| it.next())
            .and_then(|r| r.ok())
            .map(|(applied,)| applied)
            .unwrap_or(true);

        Ok(inserted)
    }

    async fn presence_upsert(
        &self,
        user_id: Snowflake,
        status: PresenceStatus,
        client: &str,
    ) -> Result<(), StoreError> {
        self.session
            .query_unpaged(
                "INSERT INTO presences (user_id, status, client_status) VALUES (?, ?, ?)",
                (user_id.get() as i64, status.as_str(), client),
            )
            .await?;
        Ok(())
    }

    async fn presence_mark_invisible(&self, user_id: Snowflake) -> Result<(), StoreError> {
        let preferred = self.settings(user_id).await?.status;
        if preferred == "invisible" {
            return Ok(());
        }
        self.session
            .query_unpaged(
                "UPDATE presences SET status = 'invisible' WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        Ok(())
    }
}

impl ScyllaStoreAdapter {
    async fn activities(&self, user_id: Snowflake) -> Result<Vec<ActivityRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT type, created_at, content, stream_url, emoji_id \
                 FROM activities WHERE user_id = ?",
                (user_id.get() as i64,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        rows.rows::<(i32, String, Option<String>, Option<String>, Option<i64>)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| {
                r.map(|(kind, created_at, content, stream_url, emoji_id)| ActivityRecord {
                    user_id,
                    kind,
                    created_at,
                    content,
                    stream_url,
                    emoji_id: emoji_id.map(|v| Snowflake::new(v as u64)),
                })
                .map_err(|e| StoreError::RowDecode(e.to_string()))
            })
            .collect()
    }

    async fn channel_recipients(
        &self,
        channel_id: i64,
        exclude_user_id: Snowflake,
    ) -> Result<Vec<UserRecordRedacted>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT user_id FROM recipients WHERE channel_id = ?",
                (channel_id,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let ids: Vec<i64> = rows
            .rows::<(i64,)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .map(|r| r.map(|(v,)| v))
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?;

        let mut out = Vec::new();
        for id in ids {
            let id = Snowflake::new(id as u64);
            if id == exclude_user_id {
                continue;
            }
            if let Some(user) = self.user_by_id(id).await? {
                out.push(UserRecordRedacted {
                    id: user.id,
                    username: user.username,
                    discriminator: user.discriminator,
                    avatar: user.avatar,
                    banner: user.banner,
                    flags: user.flags,
                    bot: user.bot,
                });
            }
        }
        Ok(out)
    }

    async fn dm_channel_last_message(&self, channel_id: i64) -> Result<Option<Snowflake>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT last_message_id FROM dm_channels WHERE channel_id = ?",
                (channel_id,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        Ok(rows
            .rows::<(Option<i64>,)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .next()
            .transpose()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .and_then(|(v,)| v)
            .map(|v| Snowflake::new(v as u64)))
    }

    async fn group_dm_channel_row(&self, channel_id: i64) -> Result<Option<GroupDmChannelRow>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT last_message_id, owner_id, icon FROM group_dm_channels WHERE channel_id = ?",
                (channel_id,),
            )
            .await?;
        let rows = result.into_rows_result().map_err(|e| StoreError::RowDecode(e.to_string()))?;
        let row = rows
            .rows::<(Option<i64>, i64, Option<String>)>()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?
            .next()
            .transpose()
            .map_err(|e| StoreError::RowDecode(e.to_string()))?;
        Ok(row.map(|(last_message_id, owner_id, icon)| GroupDmChannelRow {
            last_message_id: last_message_id.map(|v| Snowflake::new(v as u64)),
            owner_id: Snowflake::new(owner_id as u64),
            icon,
        }))
    }
}
