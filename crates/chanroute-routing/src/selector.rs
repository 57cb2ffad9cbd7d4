//! Channel selector
//!
//! `ChannelSelector::select_channel` is the single entry point. Depending on
//! the memory-cache flag it runs either on the in-memory registry snapshot
//! (synchronous, lock-free) or on the channel store (up to three sequential
//! queries with no transaction spanning them).
//!
//! `Ok(None)` means no eligible channel. On the store path this includes a
//! channel that vanished or was disabled between queries; callers treat it
//! like any other retryable miss.

use chanroute_core::{
    ApiType, Channel, ChannelStore, DefaultModelNameNormalizer, ModelNameNormalizer,
};
use chanroute_observability::{SelectionMetrics, SelectionOutcome, SelectionPath};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::api_filter::{allowed_channel_types, filter_by_api_type};
use crate::candidates::{collect_cached, collect_from_store, with_timeout};
use crate::config::SelectorConfig;
use crate::error::SelectionError;
use crate::random::{RandomSource, ThreadRandom};
use crate::registry::ChannelRegistry;
use crate::tier::{choose_tier, partition_by_priority, unique_priorities_desc};
use crate::weighted::{pick_ability_weighted, pick_channel_weighted};

/// One selection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub group: String,
    pub model_name: String,
    /// Raw API family code; unknown codes match nothing
    pub api_type: i32,
    /// Number of failed upstream attempts so far; selects the priority tier
    pub retry_index: usize,
}

impl SelectionRequest {
    pub fn new(group: impl Into<String>, model_name: impl Into<String>, api_type: ApiType) -> Self {
        Self {
            group: group.into(),
            model_name: model_name.into(),
            api_type: api_type.as_i32(),
            retry_index: 0,
        }
    }

    /// Request with a raw API family code, which may be unknown
    pub fn with_api_type_code(mut self, api_type: i32) -> Self {
        self.api_type = api_type;
        self
    }

    pub fn with_retry(mut self, retry_index: usize) -> Self {
        self.retry_index = retry_index;
        self
    }
}

/// Picks a channel for a request by priority tier and weight
pub struct ChannelSelector {
    registry: Arc<ChannelRegistry>,
    store: Arc<dyn ChannelStore>,
    random: Arc<dyn RandomSource>,
    normalizer: Arc<dyn ModelNameNormalizer>,
    memory_cache_enabled: AtomicBool,
    query_timeout: Option<Duration>,
    metrics: Option<SelectionMetrics>,
}

impl ChannelSelector {
    pub fn new(
        config: &SelectorConfig,
        registry: Arc<ChannelRegistry>,
        store: Arc<dyn ChannelStore>,
    ) -> Self {
        Self {
            registry,
            store,
            random: Arc::new(ThreadRandom),
            normalizer: Arc::new(DefaultModelNameNormalizer),
            memory_cache_enabled: AtomicBool::new(config.memory_cache_enabled),
            query_timeout: config.query_timeout(),
            metrics: None,
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn ModelNameNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_metrics(mut self, metrics: SelectionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn memory_cache_enabled(&self) -> bool {
        self.memory_cache_enabled.load(Ordering::Acquire)
    }

    /// Switch between the registry and the channel store at runtime
    pub fn set_memory_cache_enabled(&self, enabled: bool) {
        self.memory_cache_enabled.store(enabled, Ordering::Release);
    }

    /// Select a channel for `request`
    ///
    /// Returns `Ok(None)` when no channel is eligible.
    pub async fn select_channel(
        &self,
        request: &SelectionRequest,
    ) -> Result<Option<Arc<Channel>>, SelectionError> {
        let started = Instant::now();
        let (path, result) = if self.memory_cache_enabled() {
            (SelectionPath::Cache, self.select_cached(request))
        } else {
            (SelectionPath::Store, self.select_from_store(request).await)
        };

        let outcome = match &result {
            Ok(Some(channel)) => {
                debug!(
                    path = path.as_str(),
                    group = %request.group,
                    model = %request.model_name,
                    retry = request.retry_index,
                    channel_id = channel.id,
                    "Channel selected"
                );
                SelectionOutcome::Selected
            }
            Ok(None) => {
                debug!(
                    path = path.as_str(),
                    group = %request.group,
                    model = %request.model_name,
                    api_type = request.api_type,
                    "No eligible channel"
                );
                SelectionOutcome::NotFound
            }
            Err(e) => {
                warn!(
                    path = path.as_str(),
                    group = %request.group,
                    model = %request.model_name,
                    error = %e,
                    "Channel selection failed"
                );
                SelectionOutcome::Error
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_selection(path, outcome, started.elapsed().as_secs_f64());
        }

        result
    }

    /// Select from the current registry snapshot
    pub fn select_cached(
        &self,
        request: &SelectionRequest,
    ) -> Result<Option<Arc<Channel>>, SelectionError> {
        let snapshot = self.registry.snapshot();

        let Some(candidates) = collect_cached(
            &snapshot,
            &request.group,
            &request.model_name,
            self.normalizer.as_ref(),
        ) else {
            return Ok(None);
        };
        if candidates.normalized {
            self.record_model_fallback(SelectionPath::Cache);
        }

        let mut channels = filter_by_api_type(&snapshot, candidates.ids, request.api_type)?;
        match channels.len() {
            0 => return Ok(None),
            1 => return Ok(channels.pop()),
            _ => {}
        }

        let priorities = unique_priorities_desc(&channels);
        let Some(tier) = choose_tier(&priorities, request.retry_index) else {
            return Ok(None);
        };
        self.record_tier_index(SelectionPath::Cache, tier.index);

        let (members, sum_weight) = partition_by_priority(&channels, tier.priority);
        if members.is_empty() {
            return Err(SelectionError::TierExhausted {
                group: request.group.clone(),
                model: candidates.model,
                priority: tier.priority,
            });
        }

        pick_channel_weighted(&members, sum_weight, self.random.as_ref()).map(Some)
    }

    /// Select by querying the channel store
    pub async fn select_from_store(
        &self,
        request: &SelectionRequest,
    ) -> Result<Option<Arc<Channel>>, SelectionError> {
        let allowed = allowed_channel_types(request.api_type)?;
        let store = self.store.as_ref();

        let Some(candidates) = collect_from_store(
            store,
            &request.group,
            &request.model_name,
            &allowed,
            self.normalizer.as_ref(),
            self.query_timeout,
        )
        .await?
        else {
            return Ok(None);
        };
        if candidates.normalized {
            self.record_model_fallback(SelectionPath::Store);
        }

        let Some(tier) = choose_tier(&candidates.priorities, request.retry_index) else {
            return Ok(None);
        };
        self.record_tier_index(SelectionPath::Store, tier.index);

        let abilities = with_timeout(
            self.query_timeout,
            store.list_abilities(&request.group, &candidates.model, tier.priority, &allowed),
        )
        .await?;
        if abilities.is_empty() {
            warn!(
                group = %request.group,
                model = %candidates.model,
                priority = tier.priority,
                "Priority tier emptied between queries"
            );
            return Err(SelectionError::TierExhausted {
                group: request.group.clone(),
                model: candidates.model,
                priority: tier.priority,
            });
        }

        let channel_id = pick_ability_weighted(&abilities, self.random.as_ref())?;

        match with_timeout(self.query_timeout, store.get_channel(channel_id)).await? {
            Some(channel) if channel.is_enabled() && allowed.contains(&channel.channel_type) => {
                Ok(Some(Arc::new(channel)))
            }
            Some(_) => {
                debug!(channel_id, "Picked channel is no longer eligible");
                Ok(None)
            }
            None => {
                debug!(channel_id, "Picked channel no longer exists");
                Ok(None)
            }
        }
    }

    fn record_model_fallback(&self, path: SelectionPath) {
        if let Some(metrics) = &self.metrics {
            metrics.record_model_fallback(path);
        }
    }

    fn record_tier_index(&self, path: SelectionPath, index: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_tier_index(path, index);
        }
    }
}
