//! SqliteChannelStore - ChannelStore trait implementation for SQLite

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite};
use std::path::Path;
use tracing::{debug, warn};

use chanroute_core::{
    Ability, Channel, ChannelId, ChannelStatus, ChannelStore, ChannelType, Error, Result,
    channel::{join_list, split_list},
};

/// SQLite-backed channel store
///
/// Abilities are derived from channels on every upsert, so the two tables
/// never disagree about group, model, weight or priority.
#[derive(Clone)]
pub struct SqliteChannelStore {
    pool: SqlitePool,
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
    #[sqlx(rename = "group")]
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

/// Append `AND channels.type IN (...)` for a non-empty type set
fn push_type_filter(builder: &mut QueryBuilder<'_, Sqlite>, allowed_types: &[ChannelType]) {
    builder.push(" AND channels.type IN (");
    let mut separated = builder.separated(", ");
    for channel_type in allowed_types {
        separated.push_bind(channel_type.as_i32());
    }
    separated.push_unseparated(")");
}

impl SqliteChannelStore {
    /// Open (or create) a SQLite database file and run migrations
    ///
    /// # Errors
    /// - `Error::Io` if the parent directory cannot be created
    /// - `Error::Database` if connection or migration fails
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(db_path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
            )
            .await
            .map_err(|e| Error::Database(format!("Failed to open SQLite database: {}", e)))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create from an existing pool; the schema must already exist
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                type INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                weight INTEGER NOT NULL DEFAULT 0,
                "group" TEXT NOT NULL DEFAULT 'default',
                models TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create channels table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS abilities (
                "group" TEXT NOT NULL,
                model TEXT NOT NULL,
                channel_id INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 0,
                weight INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY ("group", model, channel_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create abilities table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_abilities_channel ON abilities(channel_id)")
            .execute(&self.pool)
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

        let updated = sqlx::query("UPDATE channels SET status = ? WHERE id = ?")
            .bind(status.as_i32())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to update channel status: {}", e)))?
            .rows_affected();

        sqlx::query("UPDATE abilities SET enabled = ? WHERE channel_id = ?")
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

        sqlx::query("DELETE FROM abilities WHERE channel_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete abilities: {}", e)))?;

        let deleted = sqlx::query("DELETE FROM channels WHERE id = ?")
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
impl ChannelStore for SqliteChannelStore {
    async fn list_priorities(
        &self,
        group: &str,
        model: &str,
        allowed_types: &[ChannelType],
    ) -> Result<Vec<i64>> {
        if allowed_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"SELECT DISTINCT abilities.priority FROM abilities
            JOIN channels ON channels.id = abilities.channel_id
            WHERE abilities."group" = "#,
        );
        builder.push_bind(group);
        builder.push(" AND abilities.model = ");
        builder.push_bind(model);
        builder.push(" AND abilities.enabled = 1 AND channels.status = ");
        builder.push_bind(ChannelStatus::Enabled.as_i32());
        push_type_filter(&mut builder, allowed_types);
        builder.push(" ORDER BY abilities.priority DESC");

        builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
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
        if allowed_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"SELECT abilities."group", abilities.model, abilities.channel_id,
                abilities.enabled, abilities.priority, abilities.weight
            FROM abilities
            JOIN channels ON channels.id = abilities.channel_id
            WHERE abilities."group" = "#,
        );
        builder.push_bind(group);
        builder.push(" AND abilities.model = ");
        builder.push_bind(model);
        builder.push(" AND abilities.priority = ");
        builder.push_bind(priority);
        builder.push(" AND abilities.enabled = 1 AND channels.status = ");
        builder.push_bind(ChannelStatus::Enabled.as_i32());
        push_type_filter(&mut builder, allowed_types);
        builder.push(" ORDER BY abilities.weight DESC, abilities.channel_id ASC");

        let rows = builder
            .build_query_as::<AbilityRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to query abilities: {}", e)))?;

        rows.into_iter().map(Ability::try_from).collect()
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"SELECT id, name, type, status, priority, weight, "group", models
            FROM channels WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to fetch channel #{}: {}", id, e)))?;

        row.map(Channel::try_from).transpose()
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"SELECT id, name, type, status, priority, weight, "group", models
            FROM channels ORDER BY id"#,
        )
        .fetch_all(&self.pool)
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
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                type = excluded.type,
                status = excluded.status,
                priority = excluded.priority,
                weight = excluded.weight,
                "group" = excluded."group",
                models = excluded.models
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

        sqlx::query("DELETE FROM abilities WHERE channel_id = ?")
            .bind(channel.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to clear abilities: {}", e)))?;

        let abilities = channel.abilities();
        for ability in &abilities {
            sqlx::query(
                r#"
                INSERT INTO abilities ("group", model, channel_id, enabled, priority, weight)
                VALUES (?, ?, ?, ?, ?, ?)
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

#[cfg(test)]
mod tests {
    use super::*;
    use chanroute_routing::ChannelRegistry;
    use tempfile::{TempDir, tempdir};

    async fn create_test_store() -> (TempDir, SqliteChannelStore) {
        let dir = tempdir().unwrap();
        let store = SqliteChannelStore::new(dir.path().join("channels.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn channel(id: ChannelId, channel_type: ChannelType, priority: i64, weight: u32) -> Channel {
        Channel::new(id, channel_type)
            .with_models(["gpt-4", "gpt-4o"])
            .with_priority(priority)
            .with_weight(weight)
    }

    async fn seed(store: &SqliteChannelStore, channels: Vec<Channel>) {
        for channel in channels {
            store.upsert_channel(&channel).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("channels.db");

        let first = SqliteChannelStore::new(&path).await.unwrap();
        seed(&first, vec![channel(1, ChannelType::OPENAI, 0, 10)]).await;
        drop(first);

        let second = SqliteChannelStore::new(&path).await.unwrap();
        assert_eq!(second.list_channels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_round_trip() {
        let (_dir, store) = create_test_store().await;
        let original = Channel::new(7, ChannelType::ANTHROPIC)
            .with_groups(["default", "vip"])
            .with_models(["claude-3-opus"])
            .with_priority(-3)
            .with_weight(42)
            .with_status(ChannelStatus::AutoDisabled);

        store.upsert_channel(&original).await.unwrap();

        let loaded = store.get_channel(7).await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(store.get_channel(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_priorities_distinct_desc() {
        let (_dir, store) = create_test_store().await;
        seed(
            &store,
            vec![
                channel(1, ChannelType::OPENAI, 5, 10),
                channel(2, ChannelType::OPENAI, 10, 10),
                channel(3, ChannelType::OPENAI, 5, 10),
                channel(4, ChannelType::OPENAI, 0, 10),
            ],
        )
        .await;

        let priorities = store
            .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert_eq!(priorities, vec![10, 5, 0]);
    }

    #[tokio::test]
    async fn test_queries_filter_by_allowed_types() {
        let (_dir, store) = create_test_store().await;
        seed(
            &store,
            vec![
                channel(1, ChannelType::OPENAI, 5, 10),
                channel(2, ChannelType::ANTHROPIC, 10, 10),
            ],
        )
        .await;

        let priorities = store
            .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert_eq!(priorities, vec![5]);

        let abilities = store
            .list_abilities("default", "gpt-4", 10, &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert!(abilities.is_empty());

        let both = store
            .list_priorities(
                "default",
                "gpt-4",
                &[ChannelType::OPENAI, ChannelType::ANTHROPIC],
            )
            .await
            .unwrap();
        assert_eq!(both, vec![10, 5]);

        assert!(
            store
                .list_priorities("default", "gpt-4", &[])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_list_abilities_heaviest_first() {
        let (_dir, store) = create_test_store().await;
        seed(
            &store,
            vec![
                channel(1, ChannelType::OPENAI, 10, 5),
                channel(2, ChannelType::OPENAI, 10, 50),
                channel(3, ChannelType::OPENAI, 10, 20),
                channel(4, ChannelType::OPENAI, 1, 100),
            ],
        )
        .await;

        let abilities = store
            .list_abilities("default", "gpt-4o", 10, &[ChannelType::OPENAI])
            .await
            .unwrap();
        let ids: Vec<ChannelId> = abilities.iter().map(|a| a.channel_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(abilities.iter().all(|a| a.enabled && a.model == "gpt-4o"));
        assert_eq!(abilities[0].weight, 50);
    }

    #[tokio::test]
    async fn test_disabled_channels_are_excluded() {
        let (_dir, store) = create_test_store().await;
        seed(
            &store,
            vec![
                channel(1, ChannelType::OPENAI, 10, 10),
                channel(2, ChannelType::OPENAI, 20, 10)
                    .with_status(ChannelStatus::ManuallyDisabled),
            ],
        )
        .await;

        let priorities = store
            .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert_eq!(priorities, vec![10]);

        assert!(store.set_status(1, ChannelStatus::AutoDisabled).await.unwrap());
        let priorities = store
            .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert!(priorities.is_empty());

        assert!(store.set_status(2, ChannelStatus::Enabled).await.unwrap());
        let abilities = store
            .list_abilities("default", "gpt-4", 20, &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert_eq!(abilities.len(), 1);
        assert_eq!(abilities[0].channel_id, 2);

        assert!(!store.set_status(99, ChannelStatus::Enabled).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_ability_excluded_while_channel_enabled() {
        let (_dir, store) = create_test_store().await;
        seed(
            &store,
            vec![
                channel(1, ChannelType::OPENAI, 10, 10),
                channel(2, ChannelType::OPENAI, 20, 10),
            ],
        )
        .await;

        sqlx::query("UPDATE abilities SET enabled = 0 WHERE channel_id = ?")
            .bind(2)
            .execute(&store.pool)
            .await
            .unwrap();

        let channel = store.get_channel(2).await.unwrap().unwrap();
        assert!(channel.is_enabled());

        let priorities = store
            .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert_eq!(priorities, vec![10]);

        let abilities = store
            .list_abilities("default", "gpt-4", 20, &[ChannelType::OPENAI])
            .await
            .unwrap();
        assert!(abilities.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_rows_do_not_block_refresh() {
        let (_dir, store) = create_test_store().await;
        seed(&store, vec![channel(1, ChannelType::OPENAI, 10, 10)]).await;

        sqlx::query("INSERT INTO channels (id, type, status, models) VALUES (2, 1, 0, 'gpt-4')")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO channels (id, type, status, weight, models) VALUES (3, 1, 1, -5, 'gpt-4')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let ids: Vec<ChannelId> = store
            .list_channels()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1]);

        let registry = ChannelRegistry::empty();
        assert_eq!(registry.refresh(&store).await.unwrap(), 1);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.channel_ids("default", "gpt-4"), &[1]);
        assert!(snapshot.channel(2).is_none());
    }

    #[tokio::test]
    async fn test_from_pool_reads_existing_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("channels.db");
        let store = SqliteChannelStore::new(&path).await.unwrap();
        seed(&store, vec![channel(1, ChannelType::OPENAI, 10, 10)]).await;

        let pool = SqlitePool::connect_with(SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        let shared = SqliteChannelStore::from_pool(pool);
        assert_eq!(
            shared
                .list_priorities("default", "gpt-4o", &[ChannelType::OPENAI])
                .await
                .unwrap(),
            vec![10]
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_abilities() {
        let (_dir, store) = create_test_store().await;
        seed(&store, vec![channel(1, ChannelType::OPENAI, 10, 10)]).await;

        let updated = Channel::new(1, ChannelType::OPENAI)
            .with_models(["gpt-4o-mini"])
            .with_priority(3)
            .with_weight(10);
        store.upsert_channel(&updated).await.unwrap();

        assert!(
            store
                .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store
                .list_priorities("default", "gpt-4o-mini", &[ChannelType::OPENAI])
                .await
                .unwrap(),
            vec![3]
        );
        assert_eq!(store.list_channels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_channel() {
        let (_dir, store) = create_test_store().await;
        seed(&store, vec![channel(1, ChannelType::OPENAI, 10, 10)]).await;

        assert!(store.delete_channel(1).await.unwrap());
        assert!(!store.delete_channel(1).await.unwrap());
        assert!(store.get_channel(1).await.unwrap().is_none());
        assert!(
            store
                .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected() {
        let (_dir, store) = create_test_store().await;
        let invalid = Channel::new(0, ChannelType::OPENAI).with_models(["gpt-4"]);
        let err = store.upsert_channel(&invalid).await.unwrap_err();
        assert!(matches!(err, Error::InvalidChannel(_)));
    }
}
