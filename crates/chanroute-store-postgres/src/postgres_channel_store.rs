//! PostgresChannelStore - ChannelStore trait implementation for PostgreSQL

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, warn};

use chanroute_core::{
    Ability, Channel, ChannelId, ChannelStatus, ChannelStore, ChannelType, Error, Result,
    channel::{join_list, split_list},
};

/// PostgreSQL-backed channel store
///
/// Allowed channel types are passed as an `INTEGER[]` and matched with
/// `= ANY(...)`, so every query has a fixed text.
#[derive(Clone)]
pub struct PostgresChannelStore {
    /// PostgreSQL connection pool
    pool: Arc<PgPool>,
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: i64,
    name: String,
    #[sqlx(rename = "type")]
    channel_type: i32,
    status: i32,
    priority: i64,
    weight: i64,
    #[sqlx(rename = "group")]
    groups: String,
    models: String,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = Error;

    fn try_from(row: ChannelRow) -> Result<Self> {
        Ok(Channel {
            id: row.id,
            name: row.name,
            channel_type: ChannelType(row.channel_type),
            status: ChannelStatus::from_i32(row.status)?,
            priority: row.priority,
            weight: decode_weight(row.weight)?,
            groups: split_list(&row.groups),
            models: split_list(&row.models),
        })
    }
}

#[derive(sqlx::FromRow)]
struct AbilityRow {
    group: String,
    model: String,
    channel_id: i64,
    enabled: bool,
    priority: i64,
    weight: i64,
}

impl TryFrom<AbilityRow> for Ability {
    type Error = Error;

    fn try_from(row: AbilityRow) -> Result<Self> {
        Ok(Ability {
            channel_id: row.channel_id,
            group: row.group,
            model: row.model,
            enabled: row.enabled,
            priority: row.priority,
            weight: decode_weight(row.weight)?,
        })
    }
}

/// Decode channel rows; rows that fail to decode are logged and left out
fn decode_channels(rows: Vec<ChannelRow>) -> Vec<Channel> {
    let mut channels = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id;
        match Channel::try_from(row) {
            Ok(channel) => channels.push(channel),
            Err(e) => warn!(channel_id = id, error = %e, "Skipping undecodable channel row"),
        }
    }
    channels
}

fn decode_weight(weight: i64) -> Result<u32> {
    u32::try_from(weight)
        .map_err(|_| Error::InvalidChannel(format!("Weight out of range: {}", weight)))
}

fn type_codes(allowed_types: &[ChannelType]) -> Vec<i32> {
    allowed_types.iter().map(|t| t.as_i32()).collect()
}

impl PostgresChannelStore {
    /// Connect to PostgreSQL and run schema migrations
    ///
    /// # Errors
    /// - `Error::Database` if connection fails or schema migration fails
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create from an existing pool; the schema must already exist
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                id BIGINT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                type INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                priority BIGINT NOT NULL DEFAULT 0,
                weight BIGINT NOT NULL DEFAULT 0,
                "group" TEXT NOT NULL DEFAULT 'default',
                models TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create channels table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS abilities (
                "group" TEXT NOT NULL,
                model TEXT NOT NULL,
                channel_id BIGINT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                priority BIGINT NOT NULL DEFAULT 0,
                weight BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY ("group", model, channel_id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create abilities table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_abilities_channel
            ON abilities(channel_id)
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    /// Change a channel's status and the enabled flag of its abilities
    ///
    /// Returns `false` when no such channel exists.
    pub async fn set_status(&self, id: ChannelId, status: ChannelStatus) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let updated = sqlx::query("UPDATE channels SET status = $1 WHERE id = $2")
            .bind(status.as_i32())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to update channel status: {}", e)))?
            .rows_affected();

        sqlx::query("UPDATE abilities SET enabled = $1 WHERE channel_id = $2")
            .bind(status.is_enabled())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to update abilities: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(updated > 0)
    }

    /// Delete a channel and its abilities; returns `false` if it did not exist
    pub async fn delete_channel(&self, id: ChannelId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM abilities WHERE channel_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete abilities: {}", e)))?;

        let deleted = sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete channel: {}", e)))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(deleted > 0)
    }
}

#[async_trait]
impl ChannelStore for PostgresChannelStore {
    async fn list_priorities(
        &self,
        group: &str,
        model: &str,
        allowed_types: &[ChannelType],
    ) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT abilities.priority
            FROM abilities
            JOIN channels ON channels.id = abilities.channel_id
            WHERE abilities."group" = $1
              AND abilities.model = $2
              AND abilities.enabled = TRUE
              AND channels.status = $3
              AND channels.type = ANY($4)
            ORDER BY abilities.priority DESC
            "#,
        )
        .bind(group)
        .bind(model)
        .bind(ChannelStatus::Enabled.as_i32())
        .bind(type_codes(allowed_types))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to query priorities: {}", e)))
    }

    async fn list_abilities(
        &self,
        group: &str,
        model: &str,
        priority: i64,
        allowed_types: &[ChannelType],
    ) -> Result<Vec<Ability>> {
        let rows = sqlx::query_as::<_, AbilityRow>(
            r#"
            SELECT abilities."group", abilities.model, abilities.channel_id,
                   abilities.enabled, abilities.priority, abilities.weight
            FROM abilities
            JOIN channels ON channels.id = abilities.channel_id
            WHERE abilities."group" = $1
              AND abilities.model = $2
              AND abilities.priority = $3
              AND abilities.enabled = TRUE
              AND channels.status = $4
              AND channels.type = ANY($5)
            ORDER BY abilities.weight DESC, abilities.channel_id ASC
            "#,
        )
        .bind(group)
        .bind(model)
        .bind(priority)
        .bind(ChannelStatus::Enabled.as_i32())
        .bind(type_codes(allowed_types))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to query abilities: {}", e)))?;

        rows.into_iter().map(Ability::try_from).collect()
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, name, type, status, priority, weight, "group", models
            FROM channels
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to fetch channel #{}: {}", id, e)))?;

        row.map(Channel::try_from).transpose()
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, name, type, status, priority, weight, "group", models
            FROM channels
            ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list channels: {}", e)))?;

        Ok(decode_channels(rows))
    }

    async fn upsert_channel(&self, channel: &Channel) -> Result<()> {
        channel.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO channels (id, name, type, status, priority, weight, "group", models)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                type = EXCLUDED.type,
                status = EXCLUDED.status,
                priority = EXCLUDED.priority,
                weight = EXCLUDED.weight,
                "group" = EXCLUDED."group",
                models = EXCLUDED.models
            "#,
        )
        .bind(channel.id)
        .bind(&channel.name)
        .bind(channel.channel_type.as_i32())
        .bind(channel.status.as_i32())
        .bind(channel.priority)
        .bind(i64::from(channel.weight))
        .bind(join_list(&channel.groups))
        .bind(join_list(&channel.models))
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to upsert channel #{}: {}", channel.id, e)))?;

        sqlx::query("DELETE FROM abilities WHERE channel_id = $1")
            .bind(channel.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to clear abilities: {}", e)))?;

        let abilities = channel.abilities();
        for ability in &abilities {
            sqlx::query(
                r#"
                INSERT INTO abilities ("group", model, channel_id, enabled, priority, weight)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&ability.group)
            .bind(&ability.model)
            .bind(ability.channel_id)
            .bind(ability.enabled)
            .bind(ability.priority)
            .bind(i64::from(ability.weight))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to insert ability: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        debug!(
            channel_id = channel.id,
            abilities = abilities.len(),
            "Channel upserted"
        );
        Ok(())
    }
}
