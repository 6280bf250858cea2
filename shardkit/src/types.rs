use std::collections::HashSet;

use crate::errors::ShardError;

/// Canonical scheme for composite shard URLs
pub const CLICKHOUSE_SCHEME: &str = "clickhouse://";

/// One shard and its replica endpoints, primary first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSpec {
    num: u32,
    endpoints: Vec<String>,
}

impl ShardSpec {
    pub fn new(num: u32, endpoints: Vec<String>) -> Result<Self, ShardError> {
        if endpoints.is_empty() {
            return Err(ShardError::InvalidTopology(format!(
                "shard {} has no endpoints",
                num
            )));
        }
        Ok(Self { num, endpoints })
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Single failover-capable target: `clickhouse://host1:port1,host2:port2,...`
    pub fn composite_url(&self) -> String {
        format!("{}{}", CLICKHOUSE_SCHEME, self.endpoints.join(","))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSpec {
    shards: Vec<ShardSpec>,
}

impl ClusterSpec {
    pub fn new(shards: Vec<ShardSpec>) -> Result<Self, ShardError> {
        let mut seen = HashSet::with_capacity(shards.len());
        for shard in &shards {
            if !seen.insert(shard.num) {
                return Err(ShardError::InvalidTopology(format!(
                    "duplicate shard number {}",
                    shard.num
                )));
            }
        }
        Ok(Self { shards })
    }

    pub fn shards(&self) -> &[ShardSpec] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
