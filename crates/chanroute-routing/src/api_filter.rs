//! API family filtering
//!
//! The cache path filters materialized channels by the family their type maps
//! to; the store path pushes the inverse mapping into its queries as a
//! `type IN (...)` set.

use chanroute_core::{ApiType, Channel, ChannelId, ChannelType, channel_types_for_api_type};
use std::sync::Arc;

use crate::error::SelectionError;
use crate::registry::ChannelSnapshot;

/// Resolve candidate ids to channels serving `api_type`
///
/// Channels whose type maps to no family, or to another family, are dropped.
/// An id without a channel record fails the whole call.
pub fn filter_by_api_type(
    snapshot: &ChannelSnapshot,
    ids: &[ChannelId],
    api_type: i32,
) -> Result<Vec<Arc<Channel>>, SelectionError> {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids {
        let channel = snapshot
            .channel(id)
            .ok_or(SelectionError::DataInconsistency { channel_id: id })?;
        match channel.api_type() {
            Some(family) if family.as_i32() == api_type => out.push(Arc::clone(channel)),
            _ => continue,
        }
    }
    Ok(out)
}

/// Channel types allowed for `api_type`, for store-side filtering
///
/// # Errors
/// - `SelectionError::UnsupportedApiType` if the code is unknown or no
///   channel type serves it
pub fn allowed_channel_types(api_type: i32) -> Result<Vec<ChannelType>, SelectionError> {
    let allowed = ApiType::from_i32(api_type)
        .map(channel_types_for_api_type)
        .unwrap_or_default();
    if allowed.is_empty() {
        return Err(SelectionError::UnsupportedApiType(api_type));
    }
    Ok(allowed)
}
