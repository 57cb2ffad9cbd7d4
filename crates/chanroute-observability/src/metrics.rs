//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for channel selection:
//! - Selection counts by data path and outcome
//! - Model-name fallback counts
//! - Selection latency histograms
//! - Selected priority tier index distribution

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Data path a selection ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPath {
    Cache,
    Store,
}

impl SelectionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
        }
    }
}

/// Result class of a selection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected,
    NotFound,
    Error,
}

impl SelectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }
}

/// Metrics collector for channel selection
#[derive(Clone)]
pub struct SelectionMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Selection attempts by path and outcome
    pub selections_total: CounterVec,
    /// Selections that matched only after model-name normalization
    pub model_fallback_total: CounterVec,
    /// Selection duration
    pub selection_duration_seconds: HistogramVec,
    /// Priority tier index the retry index resolved to
    pub selected_tier_index: HistogramVec,
}

impl SelectionMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let selections_total = CounterVec::new(
            Opts::new(
                "chanroute_selections_total",
                "Total number of channel selection attempts",
            ),
            &["path", "outcome"],
        )?;

        let model_fallback_total = CounterVec::new(
            Opts::new(
                "chanroute_model_fallback_total",
                "Selections resolved through the normalized model name",
            ),
            &["path"],
        )?;

        // Cache selections are sub-millisecond, store selections are query bound
        let selection_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "chanroute_selection_duration_seconds",
                "Channel selection duration in seconds",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
            &["path"],
        )?;

        let selected_tier_index = HistogramVec::new(
            HistogramOpts::new(
                "chanroute_selected_tier_index",
                "Priority tier index used for selection (0 = highest priority)",
            )
            .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0]),
            &["path"],
        )?;

        registry.register(Box::new(selections_total.clone()))?;
        registry.register(Box::new(model_fallback_total.clone()))?;
        registry.register(Box::new(selection_duration_seconds.clone()))?;
        registry.register(Box::new(selected_tier_index.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            selections_total,
            model_fallback_total,
            selection_duration_seconds,
            selected_tier_index,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome and duration of a selection attempt
    pub fn record_selection(
        &self,
        path: SelectionPath,
        outcome: SelectionOutcome,
        duration_secs: f64,
    ) {
        self.selections_total
            .with_label_values(&[path.as_str(), outcome.as_str()])
            .inc();
        self.selection_duration_seconds
            .with_label_values(&[path.as_str()])
            .observe(duration_secs);
    }

    /// Record that the normalized model name was needed to find candidates
    pub fn record_model_fallback(&self, path: SelectionPath) {
        self.model_fallback_total
            .with_label_values(&[path.as_str()])
            .inc();
    }

    /// Record the tier index a retry resolved to
    pub fn record_tier_index(&self, path: SelectionPath, tier_index: usize) {
        self.selected_tier_index
            .with_label_values(&[path.as_str()])
            .observe(tier_index as f64);
    }

    /// Render all metrics in Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}

impl Default for SelectionMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
