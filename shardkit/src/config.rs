use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Free-form driver property bag
pub type Properties = HashMap<String, String>;

/// Table options carrying this prefix are forwarded to the driver as properties
pub const PROPERTIES_PREFIX: &str = "properties.";

/// Property key for the connection user
pub const USER_PROPERTY: &str = "user";

/// Property key for the connection password
pub const PASSWORD_PROPERTY: &str = "password";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub url: String,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            url: "clickhouse://localhost:8123".to_string(),
            database: "default".to_string(),
            username: None,
            password: None,
            properties: Properties::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ConnectionOptions {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub cluster: Option<String>,
    /// One of `probe` (default), `fixed` or `identity`.
    ///
    /// system.clusters reports native TCP ports; `identity` only suits
    /// clusters whose reported ports already serve HTTP.
    #[serde(default = "default_port_resolution")]
    pub port_resolution: String,
    /// Port used by the `fixed` resolution
    #[serde(default)]
    pub http_port: Option<u16>,
}

fn default_port_resolution() -> String {
    "probe".to_string()
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            cluster: None,
            port_resolution: default_port_resolution(),
            http_port: None,
        }
    }
}

/// Collect `properties.*` table options into a driver property bag, stripping the prefix.
pub fn properties_from_options(options: &HashMap<String, String>) -> Properties {
    options
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(PROPERTIES_PREFIX)
                .map(|sub_key| (sub_key.to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_from_options() {
        let mut options = HashMap::new();
        options.insert("properties.socket_timeout".to_string(), "60000".to_string());
        options.insert("properties.compress".to_string(), "1".to_string());
        options.insert("sink.batch-size".to_string(), "1000".to_string());
        options.insert("url".to_string(), "clickhouse://localhost:8123".to_string());

        let properties = properties_from_options(&options);
        assert_eq!(properties.len(), 2);
        assert_eq!(properties.get("socket_timeout"), Some(&"60000".to_string()));
        assert_eq!(properties.get("compress"), Some(&"1".to_string()));
    }

    #[test]
    fn test_connection_options_defaults() {
        let options = ConnectionOptions::new("ch://ch-0:8123", "events");
        assert_eq!(options.url, "ch://ch-0:8123");
        assert_eq!(options.database, "events");
        assert!(options.username.is_none());
        assert_eq!(options.connect_timeout(), Duration::from_secs(30));

        let options = options.with_credentials("writer", "secret");
        assert_eq!(options.username.as_deref(), Some("writer"));
        assert_eq!(options.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_deserialize_partial_options() {
        let json = serde_json::json!({
            "url": "clickhouse://ch-0:8123",
            "database": "events",
        });
        let options: ConnectionOptions = serde_json::from_value(json).unwrap();
        assert!(options.password.is_none());
        assert!(options.properties.is_empty());
        assert_eq!(options.connect_timeout_ms, 30_000);
    }

    #[test]
    fn test_topology_defaults_to_http_port_discovery() {
        assert_eq!(TopologyConfig::default().port_resolution, "probe");

        let json = serde_json::json!({ "cluster": "analytics" });
        let topology: TopologyConfig = serde_json::from_value(json).unwrap();
        assert_eq!(topology.port_resolution, "probe");
        assert!(topology.http_port.is_none());
    }
}
