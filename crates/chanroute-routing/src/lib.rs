//! ChanRoute Routing Engine
//!
//! This crate provides channel selection for ChanRoute:
//! - Copy-on-write channel registry snapshots
//! - Candidate collection with model-name fallback
//! - API family filtering
//! - Priority tiers with retry degradation
//! - Weighted random draws within a tier
//! - A selector that runs on the cache or on the channel store

pub mod api_filter;
pub mod candidates;
pub mod config;
pub mod error;
pub mod random;
pub mod registry;
pub mod selector;
pub mod tier;
pub mod weighted;

// Re-export commonly used types
pub use config::SelectorConfig;
pub use error::SelectionError;
pub use random::{RandomSource, SeededRandom, SequenceRandom, ThreadRandom};
pub use registry::{ChannelRegistry, ChannelSnapshot};
pub use selector::{ChannelSelector, SelectionRequest};

#[cfg(test)]
pub(crate) mod test_support;
