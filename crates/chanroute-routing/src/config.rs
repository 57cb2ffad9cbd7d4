//! Selector configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for `ChannelSelector`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Select from the in-memory registry instead of the channel store
    #[serde(default = "default_memory_cache_enabled")]
    pub memory_cache_enabled: bool,

    /// Upper bound for each channel store query, in milliseconds
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            memory_cache_enabled: default_memory_cache_enabled(),
            query_timeout_ms: None,
        }
    }
}

fn default_memory_cache_enabled() -> bool {
    true
}

impl SelectorConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.query_timeout_ms == Some(0) {
            return Err("query_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
