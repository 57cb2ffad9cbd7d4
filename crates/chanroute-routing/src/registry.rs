//! In-memory channel registry
//!
//! The registry holds an immutable `ChannelSnapshot` behind an atomic pointer.
//! Readers load the current snapshot and keep using it for the whole selection
//! even if a refresh swaps in a new one meanwhile; a refresh never blocks
//! readers and readers never block a refresh.

use arc_swap::ArcSwap;
use chanroute_core::{Channel, ChannelId, ChannelStore, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable view of the channel pool
///
/// - `group -> model -> [channel id]`, each list ordered by priority descending
/// - `channel id -> Channel`
#[derive(Debug, Default)]
pub struct ChannelSnapshot {
    index: HashMap<String, HashMap<String, Vec<ChannelId>>>,
    channels: HashMap<ChannelId, Arc<Channel>>,
}

impl ChannelSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the index from channel records
    ///
    /// Disabled channels are left out. Within each (group, model) list, ids
    /// are ordered by priority descending; equal priorities keep input order.
    pub fn from_channels<I>(channels: I) -> Self
    where
        I: IntoIterator<Item = Channel>,
    {
        let mut snapshot = Self::default();

        for channel in channels.into_iter().filter(Channel::is_enabled) {
            let channel = Arc::new(channel);
            for ability in channel.abilities() {
                snapshot
                    .index
                    .entry(ability.group)
                    .or_default()
                    .entry(ability.model)
                    .or_default()
                    .push(channel.id);
            }
            snapshot.channels.insert(channel.id, channel);
        }

        let channels = &snapshot.channels;
        for models in snapshot.index.values_mut() {
            for ids in models.values_mut() {
                ids.sort_by_key(|id| {
                    std::cmp::Reverse(channels.get(id).map(|c| c.priority).unwrap_or(i64::MIN))
                });
            }
        }

        snapshot
    }

    /// Assemble a snapshot from a prebuilt index and channel map, unchecked
    ///
    /// Ids in the index without a channel record are reported as a data
    /// inconsistency at selection time.
    pub fn from_parts(
        index: HashMap<String, HashMap<String, Vec<ChannelId>>>,
        channels: HashMap<ChannelId, Arc<Channel>>,
    ) -> Self {
        Self { index, channels }
    }

    /// Channel ids registered for (group, model); empty when none
    pub fn channel_ids(&self, group: &str, model: &str) -> &[ChannelId] {
        self.index
            .get(group)
            .and_then(|models| models.get(model))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Arc<Channel>> {
        self.channels.get(&id)
    }

    /// Number of channel records
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Shared handle to the current channel snapshot
pub struct ChannelRegistry {
    snapshot: ArcSwap<ChannelSnapshot>,
}

impl ChannelRegistry {
    pub fn new(snapshot: ChannelSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn empty() -> Self {
        Self::new(ChannelSnapshot::empty())
    }

    /// Current snapshot; stays valid after later replacements
    pub fn snapshot(&self) -> Arc<ChannelSnapshot> {
        self.snapshot.load_full()
    }

    /// Atomically publish a new snapshot
    pub fn replace(&self, snapshot: ChannelSnapshot) {
        debug!(channels = snapshot.len(), "Publishing channel snapshot");
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Rebuild the snapshot from the channel store
    ///
    /// Returns the number of enabled channels in the new snapshot. On error
    /// the previous snapshot stays in place.
    pub async fn refresh(&self, store: &dyn ChannelStore) -> Result<usize> {
        let channels = store.list_channels().await?;
        let snapshot = ChannelSnapshot::from_channels(channels);
        let count = snapshot.len();
        self.replace(snapshot);
        info!(channels = count, "Channel registry refreshed");
        Ok(count)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStore;
    use chanroute_core::{ChannelStatus, ChannelType, Error};

    fn channel(id: ChannelId, priority: i64) -> Channel {
        Channel::new(id, ChannelType::OPENAI)
            .with_models(["gpt-4"])
            .with_priority(priority)
            .with_weight(10)
    }

    #[test]
    fn test_from_channels_orders_by_priority() {
        let snapshot =
            ChannelSnapshot::from_channels(vec![channel(1, 0), channel(2, 10), channel(3, 5)]);

        assert_eq!(snapshot.channel_ids("default", "gpt-4"), &[2, 3, 1]);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_from_channels_keeps_input_order_for_ties() {
        let snapshot =
            ChannelSnapshot::from_channels(vec![channel(4, 1), channel(2, 1), channel(9, 1)]);
        assert_eq!(snapshot.channel_ids("default", "gpt-4"), &[4, 2, 9]);
    }

    #[test]
    fn test_from_channels_skips_disabled() {
        let disabled = channel(2, 10).with_status(ChannelStatus::ManuallyDisabled);
        let snapshot = ChannelSnapshot::from_channels(vec![channel(1, 0), disabled]);

        assert_eq!(snapshot.channel_ids("default", "gpt-4"), &[1]);
        assert!(snapshot.channel(2).is_none());
    }

    #[test]
    fn test_from_channels_indexes_every_group_and_model() {
        let multi = Channel::new(5, ChannelType::ANTHROPIC)
            .with_groups(["default", "vip"])
            .with_models(["claude-3-opus", "claude-3-haiku"]);
        let snapshot = ChannelSnapshot::from_channels(vec![multi]);

        assert_eq!(snapshot.channel_ids("vip", "claude-3-haiku"), &[5]);
        assert_eq!(snapshot.channel_ids("default", "claude-3-opus"), &[5]);
        assert!(snapshot.channel_ids("vip", "gpt-4").is_empty());
        assert!(snapshot.channel_ids("other", "claude-3-opus").is_empty());
    }

    #[test]
    fn test_replace_does_not_disturb_loaded_snapshot() {
        let registry = ChannelRegistry::new(ChannelSnapshot::from_channels(vec![channel(1, 0)]));
        let before = registry.snapshot();

        registry.replace(ChannelSnapshot::empty());

        assert_eq!(before.channel_ids("default", "gpt-4"), &[1]);
        assert!(registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_from_store() {
        let mut store = MockStore::new();
        store
            .expect_list_channels()
            .times(1)
            .returning(|| Ok(vec![channel(1, 0), channel(2, 3)]));

        let registry = ChannelRegistry::empty();
        let count = registry.refresh(&store).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.snapshot().channel_ids("default", "gpt-4"), &[2, 1]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_snapshot() {
        let mut store = MockStore::new();
        store
            .expect_list_channels()
            .returning(|| Err(Error::Database("connection refused".to_string())));

        let registry = ChannelRegistry::new(ChannelSnapshot::from_channels(vec![channel(1, 0)]));
        assert!(registry.refresh(&store).await.is_err());
        assert_eq!(registry.snapshot().channel_ids("default", "gpt-4"), &[1]);
    }
}
