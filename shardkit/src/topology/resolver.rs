// shardkit/src/topology/resolver.rs
//
// TopologyResolver - reads system.clusters through the registry's default
// connection and groups replicas into per-shard failover targets
//

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::database::ConnectionRegistry;
use crate::errors::ShardError;
use crate::metrics;
use crate::types::{ClusterSpec, ShardSpec};
use super::port::PortResolver;

pub const QUERY_CLUSTER_INFO_SQL: &str =
    "SELECT shard_num, host_address, port FROM system.clusters WHERE cluster = ? ORDER BY shard_num, replica_num ASC";

pub struct TopologyResolver {
    registry: Arc<ConnectionRegistry>,
    port_resolver: Arc<dyn PortResolver>,
}

impl TopologyResolver {
    pub fn new(registry: Arc<ConnectionRegistry>, port_resolver: Arc<dyn PortResolver>) -> Self {
        Self {
            registry,
            port_resolver,
        }
    }

    /// Composite `clickhouse://` URL per shard, ascending by shard number
    pub async fn resolve_shard_urls(&self, cluster: &str) -> Result<Vec<String>, ShardError> {
        let spec = self.resolve_cluster_spec(cluster).await?;
        Ok(spec.shards().iter().map(ShardSpec::composite_url).collect())
    }

    /// Shards of `cluster` with replicas in ascending replica order.
    ///
    /// An unknown cluster yields an empty spec.
    pub async fn resolve_cluster_spec(&self, cluster: &str) -> Result<ClusterSpec, ShardError> {
        let start = Instant::now();
        let result = self.query_cluster(cluster).await;
        metrics::record_operation("resolve_topology", "default", result.is_ok(), start.elapsed().as_secs_f64());

        let spec = result?;
        info!("Resolved {} shards for cluster {}", spec.len(), cluster);
        Ok(spec)
    }

    async fn query_cluster(&self, cluster: &str) -> Result<ClusterSpec, ShardError> {
        let connection = self.registry.get_or_create_default().await?;
        let rows = connection.query(QUERY_CLUSTER_INFO_SQL, &[cluster]).await?;

        // Rows arrive ordered by (shard_num, replica_num); push order keeps replica order
        let mut groups: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for row in &rows {
            let shard_num = row.get_u64("shard_num")?;
            let shard_num = u32::try_from(shard_num)
                .map_err(|_| ShardError::QueryError(format!("shard_num out of range: {}", shard_num)))?;
            let host = row.get_str("host_address")?;
            let native_port = row.get_u64("port")?;
            let native_port = u16::try_from(native_port)
                .map_err(|_| ShardError::QueryError(format!("port out of range: {}", native_port)))?;

            let port = self.port_resolver.resolve_port(host, native_port).await?;
            debug!("Shard {} replica {}:{} (native port {})", shard_num, host, port, native_port);
            groups
                .entry(shard_num)
                .or_default()
                .push(format!("{}:{}", host, port));
        }

        let shards = groups
            .into_iter()
            .map(|(num, endpoints)| ShardSpec::new(num, endpoints))
            .collect::<Result<Vec<_>, _>>()?;
        ClusterSpec::new(shards)
    }
}
