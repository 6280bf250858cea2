use anyhow::Result;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use shardkit::config::{properties_from_options, ConnectionOptions, TopologyConfig};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardResolverConfig {
    pub connection: ConnectionOptions,
    /// Flat table options; `properties.*` entries become driver properties
    #[serde(default)]
    pub options: HashMap<String, String>,
    #[serde(default)]
    pub topology: TopologyConfig,
}

pub fn load_config(path: &str) -> Result<ShardResolverConfig> {
    let config = Config::builder()
        .add_source(File::with_name(path))
        .add_source(config::Environment::with_prefix("SHARD_RESOLVER").separator("__"))
        .build()?;

    let mut config: ShardResolverConfig = config.try_deserialize()?;
    let table_properties = properties_from_options(&config.options);
    config.connection.properties.extend(table_properties);
    Ok(config)
}
