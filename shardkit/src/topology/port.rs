// shardkit/src/topology/port.rs
//
// Port resolution: maps a replica's native-protocol port from
// system.clusters to the port clients should actually connect to
//

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::TopologyConfig;
use crate::errors::ShardError;

const HTTP_PORT_HINT: &str = "You must use port ";

#[async_trait]
pub trait PortResolver: Send + Sync {
    async fn resolve_port(&self, host: &str, native_port: u16) -> Result<u16, ShardError>;
}

/// Supported port resolution strategies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortResolution {
    Identity,
    Fixed,
    #[default]
    Probe,
}

impl From<&str> for PortResolution {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "probe" | "http" => PortResolution::Probe,
            "fixed" | "static" => PortResolution::Fixed,
            _ => PortResolution::Identity,
        }
    }
}

impl From<String> for PortResolution {
    fn from(s: String) -> Self {
        PortResolution::from(s.as_str())
    }
}

/// Build the port resolver selected by the topology config
pub fn build_port_resolver(
    config: &TopologyConfig,
    timeout: Duration,
) -> Result<Arc<dyn PortResolver>, ShardError> {
    match PortResolution::from(config.port_resolution.as_str()) {
        PortResolution::Identity => Ok(Arc::new(IdentityPortResolver)),
        PortResolution::Fixed => {
            let port = config.http_port.ok_or_else(|| {
                ShardError::ConfigError("fixed port resolution requires topology.http_port".to_string())
            })?;
            Ok(Arc::new(FixedPortResolver::new(port)))
        }
        PortResolution::Probe => Ok(Arc::new(HttpPortResolver::new(timeout)?)),
    }
}

/// Uses the port reported by system.clusters as is
pub struct IdentityPortResolver;

#[async_trait]
impl PortResolver for IdentityPortResolver {
    async fn resolve_port(&self, _host: &str, native_port: u16) -> Result<u16, ShardError> {
        Ok(native_port)
    }
}

/// Every replica exposes its HTTP interface on the same port
pub struct FixedPortResolver {
    port: u16,
}

impl FixedPortResolver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl PortResolver for FixedPortResolver {
    async fn resolve_port(&self, _host: &str, _native_port: u16) -> Result<u16, ShardError> {
        Ok(self.port)
    }
}

/// Asks the replica itself.
///
/// A plain HTTP request against the native port is answered with a hint
/// naming the HTTP port; a successful answer means the port already speaks HTTP.
pub struct HttpPortResolver {
    client: reqwest::Client,
}

impl HttpPortResolver {
    pub fn new(timeout: Duration) -> Result<Self, ShardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShardError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PortResolver for HttpPortResolver {
    async fn resolve_port(&self, host: &str, native_port: u16) -> Result<u16, ShardError> {
        let url = format!("http://{}:{}/", bracket_host(host), native_port);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ShardError::QueryError(format!("Failed to probe {}: {}", url, e)))?;

        if response.status().is_success() {
            return Ok(native_port);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ShardError::QueryError(format!("Failed to read probe response from {}: {}", url, e)))?;

        let port = parse_http_port_hint(&body).ok_or_else(|| {
            ShardError::QueryError(format!("Cannot determine ClickHouse HTTP port of {}:{}", host, native_port))
        })?;
        debug!("Resolved HTTP port {} for {}:{}", port, host, native_port);
        Ok(port)
    }
}

/// Extract `<N>` from `You must use port <N> for HTTP.`
pub fn parse_http_port_hint(body: &str) -> Option<u16> {
    let start = body.find(HTTP_PORT_HINT)? + HTTP_PORT_HINT.len();
    let digits: String = body[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn bracket_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}
