//! ChanRoute Observability
//!
//! This crate provides observability features:
//! - Selection metrics collection (Prometheus)
//! - Structured logging setup

pub mod logging;
pub mod metrics;

pub use logging::{LoggingConfig, init_tracing};
pub use metrics::{SelectionMetrics, SelectionOutcome, SelectionPath};
