//! Priority tiers
//!
//! Distinct priorities form tiers, highest first. The retry index walks down
//! the tiers and sticks at the lowest one once it is reached.

use chanroute_core::Channel;
use std::sync::Arc;

/// The tier a selection attempt targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChoice {
    /// Position of the tier, 0 being the highest priority
    pub index: usize,
    pub priority: i64,
}

/// Distinct priorities among `channels`, highest first
pub fn unique_priorities_desc(channels: &[Arc<Channel>]) -> Vec<i64> {
    let mut priorities: Vec<i64> = channels.iter().map(|c| c.priority).collect();
    priorities.sort_unstable_by(|a, b| b.cmp(a));
    priorities.dedup();
    priorities
}

/// `min(retry, tiers - 1)`, or `None` when there are no tiers
pub fn tier_index(retry_index: usize, tiers: usize) -> Option<usize> {
    if tiers == 0 {
        return None;
    }
    Some(retry_index.min(tiers - 1))
}

/// Pick the tier for `retry_index` from priorities sorted descending
pub fn choose_tier(priorities_desc: &[i64], retry_index: usize) -> Option<TierChoice> {
    let index = tier_index(retry_index, priorities_desc.len())?;
    Some(TierChoice {
        index,
        priority: priorities_desc[index],
    })
}

/// Channels at exactly `priority`, in input order, with their weight sum
pub fn partition_by_priority(channels: &[Arc<Channel>], priority: i64) -> (Vec<Arc<Channel>>, u64) {
    let mut sum_weight = 0u64;
    let tier: Vec<Arc<Channel>> = channels
        .iter()
        .filter(|c| c.priority == priority)
        .inspect(|c| sum_weight += u64::from(c.weight))
        .cloned()
        .collect();
    (tier, sum_weight)
}
