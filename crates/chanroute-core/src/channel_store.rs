//! Channel store trait
//!
//! The `ChannelStore` trait abstracts the authoritative relational store of
//! channels and abilities. The store-backed selection path issues its
//! queries through it, and the in-memory registry is refreshed from it.
//!
//! Implementations:
//! - `SqliteChannelStore`: SQLite (single node, tests)
//! - `PostgresChannelStore`: PostgreSQL (shared deployments)

use async_trait::async_trait;

use crate::{Ability, Channel, ChannelId, ChannelType, Result};

/// Authoritative store of channels and abilities
///
/// Every query method filters to enabled abilities whose channel is enabled
/// and whose channel type is in `allowed_types`.
///
/// # Example
/// ```no_run
/// # use chanroute_core::{ChannelStore, ChannelType};
/// # async fn example(store: &dyn ChannelStore) -> chanroute_core::Result<()> {
/// let priorities = store
///     .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Distinct ability priorities for (group, model), highest first
    async fn list_priorities(
        &self,
        group: &str,
        model: &str,
        allowed_types: &[ChannelType],
    ) -> Result<Vec<i64>>;

    /// Abilities for (group, model) at exactly `priority`, heaviest first
    async fn list_abilities(
        &self,
        group: &str,
        model: &str,
        priority: i64,
        allowed_types: &[ChannelType],
    ) -> Result<Vec<Ability>>;

    /// Fetch a channel by id regardless of status
    ///
    /// Returns `Ok(None)` when no such row exists.
    async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>>;

    /// Every channel, used to rebuild the in-memory registry
    async fn list_channels(&self) -> Result<Vec<Channel>>;

    /// Persist a channel and its derived abilities, replacing any previous row
    async fn upsert_channel(&self, channel: &Channel) -> Result<()>;
}

