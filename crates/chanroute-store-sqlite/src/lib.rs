//! SQLite channel storage for single-node ChanRoute deployments
//!
//! This crate implements the `ChannelStore` trait on SQLite with the
//! `channels` and `abilities` tables.
//!
//! # Example
//! ```no_run
//! # use chanroute_store_sqlite::SqliteChannelStore;
//! # use chanroute_core::{ChannelStore, ChannelType};
//! # async fn example() -> chanroute_core::Result<()> {
//! let store = SqliteChannelStore::new("chanroute.db").await?;
//! let priorities = store
//!     .list_priorities("default", "gpt-4", &[ChannelType::OPENAI])
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod sqlite_channel_store;

pub use sqlite_channel_store::SqliteChannelStore;
