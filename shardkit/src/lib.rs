//! Connection plumbing for sharded ClickHouse clusters.
//!
//! - [`database::ConnectionRegistry`] lazily opens the default connection and
//!   tracks every per-shard connection until `close`.
//! - [`topology::TopologyResolver`] reads `system.clusters` and turns it into
//!   one failover URL per shard.
//! - [`expression::parse`] turns a sharding key such as
//!   `cityHash64(userId,eventId)` into an [`expression::Expression`] tree.

pub mod config;
pub mod database;
pub mod errors;
pub mod expression;
pub mod metrics;
pub mod topology;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConnectionOptions, Properties};
pub use database::{ConnectionHandle, ConnectionRegistry, HttpConnector};
pub use errors::ShardError;
pub use expression::Expression;
pub use topology::TopologyResolver;
pub use types::{ClusterSpec, ShardSpec};
