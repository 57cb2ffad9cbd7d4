//! Channel and ability records
//!
//! A `Channel` is one configured upstream credential/endpoint. An `Ability`
//! binds a channel to a single (group, model) pair and carries its own copy of
//! weight and priority; the store-backed selection path reads abilities, the
//! cache-backed path reads channels.

use serde::{Deserialize, Serialize};

use crate::api_type::{ApiType, ChannelType, api_type_of};
use crate::{Error, Result};

/// Channel identifier, as persisted in `channels.id`
pub type ChannelId = i64;

/// Administrative status of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Enabled,
    ManuallyDisabled,
    AutoDisabled,
}

impl ChannelStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            ChannelStatus::Enabled => 1,
            ChannelStatus::ManuallyDisabled => 2,
            ChannelStatus::AutoDisabled => 3,
        }
    }

    pub fn from_i32(code: i32) -> Result<Self> {
        match code {
            1 => Ok(ChannelStatus::Enabled),
            2 => Ok(ChannelStatus::ManuallyDisabled),
            3 => Ok(ChannelStatus::AutoDisabled),
            other => Err(Error::InvalidChannel(format!(
                "Unknown channel status code: {}",
                other
            ))),
        }
    }

    pub fn is_enabled(self) -> bool {
        self == ChannelStatus::Enabled
    }
}

/// An upstream channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub channel_type: ChannelType,

    #[serde(default)]
    pub status: ChannelStatus,

    /// Higher values are preferred
    #[serde(default)]
    pub priority: i64,

    /// Relative share of traffic within the channel's priority tier
    #[serde(default)]
    pub weight: u32,

    /// Traffic groups this channel serves
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,

    /// Model names this channel serves
    #[serde(default)]
    pub models: Vec<String>,
}

fn default_groups() -> Vec<String> {
    vec!["default".to_string()]
}

impl Channel {
    pub fn new(id: ChannelId, channel_type: ChannelType) -> Self {
        Self {
            id,
            name: format!("channel-{}", id),
            channel_type,
            status: ChannelStatus::Enabled,
            priority: 0,
            weight: 0,
            groups: default_groups(),
            models: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_status(mut self, status: ChannelStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }

    /// API family served by this channel, if any
    pub fn api_type(&self) -> Option<ApiType> {
        api_type_of(self.channel_type)
    }

    /// Derive one ability row per (group, model) pair
    ///
    /// Blank entries are skipped and duplicates collapse to a single row.
    pub fn abilities(&self) -> Vec<Ability> {
        let mut abilities: Vec<Ability> = Vec::new();
        for group in self.groups.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
            for model in self.models.iter().map(|m| m.trim()).filter(|m| !m.is_empty()) {
                if abilities
                    .iter()
                    .any(|a| a.group == group && a.model == model)
                {
                    continue;
                }
                abilities.push(Ability {
                    channel_id: self.id,
                    group: group.to_string(),
                    model: model.to_string(),
                    enabled: self.is_enabled(),
                    priority: self.priority,
                    weight: self.weight,
                });
            }
        }
        abilities
    }

    /// Validate the fields a store insert relies on
    pub fn validate(&self) -> Result<()> {
        if self.id <= 0 {
            return Err(Error::InvalidChannel(format!(
                "Channel id must be positive, got {}",
                self.id
            )));
        }
        if self.groups.iter().all(|g| g.trim().is_empty()) {
            return Err(Error::InvalidChannel(format!(
                "Channel #{} has no groups",
                self.id
            )));
        }
        if self.groups.iter().chain(&self.models).any(|s| s.contains(',')) {
            return Err(Error::InvalidChannel(format!(
                "Channel #{} has a group or model name containing ','",
                self.id
            )));
        }
        Ok(())
    }
}

/// Join a list into the comma-separated form used by store columns
pub fn join_list(items: &[String]) -> String {
    items.join(",")
}

/// Split a comma-separated store column, dropping blank entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Binding of a channel to a (group, model) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub channel_id: ChannelId,
    pub group: String,
    pub model: String,
    pub enabled: bool,
    pub priority: i64,
    pub weight: u32,
}
