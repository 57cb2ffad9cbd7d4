//! Candidate collection
//!
//! Lookups try the requested model name first. Only when that yields nothing
//! is the normalized name tried, and if it yields candidates it becomes the
//! matched model name for everything downstream (tier partitioning, ability
//! queries, diagnostics).

use chanroute_core::{ChannelId, ChannelStore, ChannelType, ModelNameNormalizer};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::SelectionError;
use crate::registry::ChannelSnapshot;

/// Candidates found in a registry snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCandidates<'a> {
    /// Model name the candidates were found under
    pub model: String,
    /// Whether `model` is the normalized form of the requested name
    pub normalized: bool,
    pub ids: &'a [ChannelId],
}

/// Distinct priorities found in the channel store, highest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCandidates {
    pub model: String,
    pub normalized: bool,
    pub priorities: Vec<i64>,
}

/// Look up (group, model) in a snapshot, falling back to the normalized name
///
/// Returns `None` when neither name has candidates.
pub fn collect_cached<'a>(
    snapshot: &'a ChannelSnapshot,
    group: &str,
    model_name: &str,
    normalizer: &dyn ModelNameNormalizer,
) -> Option<CachedCandidates<'a>> {
    let ids = snapshot.channel_ids(group, model_name);
    if !ids.is_empty() {
        return Some(CachedCandidates {
            model: model_name.to_string(),
            normalized: false,
            ids,
        });
    }

    let normalized = normalizer.normalize(model_name);
    if normalized.is_empty() || normalized == model_name {
        return None;
    }

    let ids = snapshot.channel_ids(group, &normalized);
    if ids.is_empty() {
        return None;
    }

    debug!(
        group,
        requested = model_name,
        matched = %normalized,
        "Model matched through normalized name"
    );
    Some(CachedCandidates {
        model: normalized,
        normalized: true,
        ids,
    })
}

/// Query distinct priorities for (group, model), falling back to the normalized name
///
/// Returns `None` when neither name has an enabled ability on an enabled
/// channel of an allowed type.
pub async fn collect_from_store(
    store: &dyn ChannelStore,
    group: &str,
    model_name: &str,
    allowed_types: &[ChannelType],
    normalizer: &dyn ModelNameNormalizer,
    query_timeout: Option<Duration>,
) -> Result<Option<StoreCandidates>, SelectionError> {
    let priorities = with_timeout(
        query_timeout,
        store.list_priorities(group, model_name, allowed_types),
    )
    .await?;
    if !priorities.is_empty() {
        return Ok(Some(StoreCandidates {
            model: model_name.to_string(),
            normalized: false,
            priorities,
        }));
    }

    let normalized = normalizer.normalize(model_name);
    if normalized.is_empty() || normalized == model_name {
        return Ok(None);
    }

    let priorities = with_timeout(
        query_timeout,
        store.list_priorities(group, &normalized, allowed_types),
    )
    .await?;
    if priorities.is_empty() {
        return Ok(None);
    }

    debug!(
        group,
        requested = model_name,
        matched = %normalized,
        "Model matched through normalized name"
    );
    Ok(Some(StoreCandidates {
        model: normalized,
        normalized: true,
        priorities,
    }))
}

/// Await a store query, bounded by the configured timeout if any
pub async fn with_timeout<T, F>(timeout: Option<Duration>, query: F) -> Result<T, SelectionError>
where
    F: Future<Output = chanroute_core::Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, query)
            .await
            .map_err(|_| SelectionError::Timeout(limit))?
            .map_err(SelectionError::from),
        None => query.await.map_err(SelectionError::from),
    }
}
