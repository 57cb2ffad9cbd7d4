//! Selection errors
//!
//! "No eligible channel" is not an error: selection returns `Ok(None)` for it.

use chanroute_core::ChannelId;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// A channel id in the registry index has no channel record
    #[error("Database inconsistency: channel #{channel_id} not found")]
    DataInconsistency { channel_id: ChannelId },

    /// The requested API type maps to no known channel type
    #[error("Unsupported API type: {0}")]
    UnsupportedApiType(i32),

    /// A priority tier was derived but holds no channel
    #[error("No channel found, group: {group}, model: {model}, priority: {priority}")]
    TierExhausted {
        group: String,
        model: String,
        priority: i64,
    },

    /// The weighted walk finished without picking a channel
    #[error("Channel not found: weighted draw exhausted")]
    DrawExhausted,

    #[error("Channel store error: {0}")]
    Store(#[from] chanroute_core::Error),

    #[error("Channel store query timed out after {0:?}")]
    Timeout(Duration),
}
