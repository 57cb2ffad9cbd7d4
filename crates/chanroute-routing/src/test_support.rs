//! Shared fixtures for unit tests

use async_trait::async_trait;
use chanroute_core::{Ability, Channel, ChannelId, ChannelStore, ChannelType, Result};
use mockall::mock;

mock! {
    pub Store {}

    #[async_trait]
    impl ChannelStore for Store {
        async fn list_priorities(
            &self,
            group: &str,
            model: &str,
            allowed_types: &[ChannelType],
        ) -> Result<Vec<i64>>;
        async fn list_abilities(
            &self,
            group: &str,
            model: &str,
            priority: i64,
            allowed_types: &[ChannelType],
        ) -> Result<Vec<Ability>>;
        async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>>;
        async fn list_channels(&self) -> Result<Vec<Channel>>;
        async fn upsert_channel(&self, channel: &Channel) -> Result<()>;
    }
}

/// Enabled OpenAI channel serving `gpt-4` in the default group
pub fn openai_channel(id: ChannelId, priority: i64, weight: u32) -> Channel {
    Channel::new(id, ChannelType::OPENAI)
        .with_models(["gpt-4"])
        .with_priority(priority)
        .with_weight(weight)
}

pub fn ability(channel_id: ChannelId, priority: i64, weight: u32) -> Ability {
    Ability {
        channel_id,
        group: "default".to_string(),
        model: "gpt-4".to_string(),
        enabled: true,
        priority,
        weight,
    }
}
