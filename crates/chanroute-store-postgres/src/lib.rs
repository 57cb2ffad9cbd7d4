//! PostgreSQL channel storage for shared ChanRoute deployments
//!
//! This crate implements the `ChannelStore` trait on PostgreSQL. Several
//! gateway nodes can share one database; each node keeps its own in-memory
//! registry and refreshes it from here.
//!
//! # Example
//! ```no_run
//! # use chanroute_store_postgres::PostgresChannelStore;
//! # use chanroute_core::ChannelStore;
//! # async fn example() -> chanroute_core::Result<()> {
//! let store = PostgresChannelStore::new("postgres://localhost/chanroute").await?;
//! let channels = store.list_channels().await?;
//! # Ok(())
//! # }
//! ```

mod postgres_channel_store;

pub use postgres_channel_store::PostgresChannelStore;
