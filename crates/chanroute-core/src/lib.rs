//! ChanRoute Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout ChanRoute:
//! - Channel and ability records
//! - Channel type to API family mapping
//! - Model name normalization
//! - Channel store trait abstraction
//! - Core error types

pub mod api_type;
pub mod channel;
pub mod channel_store;
pub mod error;
pub mod model_name;

pub use api_type::{ApiType, ChannelType, api_type_of, channel_types_for_api_type};
pub use channel::{Ability, Channel, ChannelId, ChannelStatus};
pub use channel_store::ChannelStore;
pub use error::{Error, Result};
pub use model_name::{DefaultModelNameNormalizer, ModelNameNormalizer, normalize_model_name};
