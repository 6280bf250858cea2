// shardkit/src/database/registry.rs
//
// ConnectionRegistry - owns the default connection and every shard
// connection opened for one provider instance
//

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConnectionOptions, Properties, PASSWORD_PROPERTY, USER_PROPERTY};
use crate::errors::ShardError;
use crate::metrics;
use crate::types::{ClusterSpec, CLICKHOUSE_SCHEME};
use super::connection::{ConnectTarget, ConnectionHandle, Connector};

/// Scheme aliases accepted in place of `clickhouse://`
const SCHEME_ALIASES: &[&str] = &["jdbc:clickhouse://", "jdbc:ch://", "ch://"];

const DEFAULT_KIND: &str = "default";
const SHARD_KIND: &str = "shard";

#[derive(Default)]
struct RegistryState {
    default: Option<ConnectionHandle>,
    shards: Vec<ConnectionHandle>,
}

pub struct ConnectionRegistry {
    options: ConnectionOptions,
    properties: Properties,
    connector: Arc<dyn Connector>,
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new(options: ConnectionOptions, connector: Arc<dyn Connector>) -> Self {
        let properties = options.properties.clone();
        Self::with_properties(options, properties, connector)
    }

    /// Registry with an explicit driver property bag instead of the one carried by `options`
    pub fn with_properties(
        options: ConnectionOptions,
        properties: Properties,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            options,
            properties,
            connector,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub async fn has_default_connection(&self) -> bool {
        self.state.lock().await.default.is_some()
    }

    pub async fn shard_connection_count(&self) -> usize {
        self.state.lock().await.shards.len()
    }

    /// Return the default connection, opening it on first use.
    ///
    /// The lock is held across the open so concurrent callers share one connection.
    pub async fn get_or_create_default(&self) -> Result<ConnectionHandle, ShardError> {
        let mut state = self.state.lock().await;
        if let Some(ref connection) = state.default {
            return Ok(connection.clone());
        }

        let connection = self
            .open_connection(&self.options.url, &self.options.database, DEFAULT_KIND)
            .await?;
        state.default = Some(connection.clone());
        Ok(connection)
    }

    /// Open one connection per shard, keyed by shard number.
    ///
    /// Connections opened before a failure stay registered until `close`.
    pub async fn create_shard_connections(
        &self,
        cluster: &ClusterSpec,
        database: &str,
    ) -> Result<HashMap<u32, ConnectionHandle>, ShardError> {
        let mut state = self.state.lock().await;
        let mut connections = HashMap::with_capacity(cluster.len());

        for shard in cluster.shards() {
            let connection = self
                .open_and_store(&mut state, &shard.composite_url(), database)
                .await?;
            connections.insert(shard.num(), connection);
        }

        info!("Opened {} shard connections for database {}", connections.len(), database);
        Ok(connections)
    }

    pub async fn create_and_store_shard_connection(
        &self,
        url: &str,
        database: &str,
    ) -> Result<ConnectionHandle, ShardError> {
        let mut state = self.state.lock().await;
        self.open_and_store(&mut state, url, database).await
    }

    /// Release every connection. Failures are logged and never stop the teardown.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;

        if let Some(connection) = state.default.take() {
            release(connection, DEFAULT_KIND).await;
        }

        let shards = std::mem::take(&mut state.shards);
        if !shards.is_empty() {
            debug!("Closing {} shard connections", shards.len());
        }
        for connection in shards {
            release(connection, SHARD_KIND).await;
        }
    }

    async fn open_and_store(
        &self,
        state: &mut RegistryState,
        url: &str,
        database: &str,
    ) -> Result<ConnectionHandle, ShardError> {
        let connection = self.open_connection(url, database, SHARD_KIND).await?;
        state.shards.push(connection.clone());
        Ok(connection)
    }

    async fn open_connection(
        &self,
        url: &str,
        database: &str,
        kind: &str,
    ) -> Result<ConnectionHandle, ShardError> {
        let target = ConnectTarget {
            url: normalize_url(url),
            database: database.to_string(),
            properties: self.connection_properties(),
        };
        info!("Connecting to {}, database {}", target.url, target.database);

        let start = Instant::now();
        let result = self.connector.connect(&target).await;
        metrics::record_operation("connect", kind, result.is_ok(), start.elapsed().as_secs_f64());

        match result {
            Ok(connection) => {
                metrics::connection_opened(kind);
                Ok(connection)
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", target.url, e);
                Err(e)
            }
        }
    }

    fn connection_properties(&self) -> Properties {
        let mut properties = self.properties.clone();
        if let Some(ref username) = self.options.username {
            properties.insert(USER_PROPERTY.to_string(), username.clone());
        }
        if let Some(ref password) = self.options.password {
            properties.insert(PASSWORD_PROPERTY.to_string(), password.clone());
        }
        properties
    }
}

async fn release(connection: ConnectionHandle, kind: &str) {
    let start = Instant::now();
    let result = connection.close().await;
    metrics::record_operation("close", kind, result.is_ok(), start.elapsed().as_secs_f64());
    metrics::connection_released(kind);

    if let Err(e) = result {
        warn!("ClickHouse {} connection to {} could not be closed: {}", kind, connection.endpoint(), e);
    }
}

/// Rewrite accepted scheme aliases to `clickhouse://`; other URLs pass through unchanged.
pub fn normalize_url(url: &str) -> String {
    SCHEME_ALIASES
        .iter()
        .find_map(|alias| url.strip_prefix(alias))
        .map(|rest| format!("{}{}", CLICKHOUSE_SCHEME, rest))
        .unwrap_or_else(|| url.to_string())
}
