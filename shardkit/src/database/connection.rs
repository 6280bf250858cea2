// shardkit/src/database/connection.rs
//
// Connection abstractions shared by the registry, the topology resolver
// and concrete transports
//

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::Properties;
use crate::errors::ShardError;

/// Shared reference to a live connection owned by a registry
pub type ConnectionHandle = Arc<dyn ClusterConnection>;

/// Live connection to a ClickHouse node (default or shard-scoped)
#[async_trait]
pub trait ClusterConnection: Send + Sync {
    /// Run a statement with positional `?` string parameters and return its rows
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, ShardError>;

    /// Release the connection
    async fn close(&self) -> Result<(), ShardError>;

    /// Endpoint actually serving this connection
    fn endpoint(&self) -> &str;
}

/// Everything needed to open one physical connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectTarget {
    pub url: String,
    pub database: String,
    pub properties: Properties,
}

/// Opens physical connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> Result<ConnectionHandle, ShardError>;
}

/// One result row keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn from_value(value: Value) -> Result<Self, ShardError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ShardError::QueryError(format!(
                "expected a JSON object row, got: {}",
                other
            ))),
        }
    }

    /// Parse one `JSONEachRow` output line
    pub fn from_json_line(line: &str) -> Result<Self, ShardError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| ShardError::QueryError(format!("Malformed result row: {}", e)))?;
        Self::from_value(value)
    }

    fn column(&self, column: &str) -> Result<&Value, ShardError> {
        self.0
            .get(column)
            .ok_or_else(|| ShardError::QueryError(format!("Missing column: {}", column)))
    }

    pub fn get_str(&self, column: &str) -> Result<&str, ShardError> {
        self.column(column)?
            .as_str()
            .ok_or_else(|| ShardError::QueryError(format!("Column {} is not a string", column)))
    }

    /// Numeric column; 64-bit integers may be quoted in JSON output
    pub fn get_u64(&self, column: &str) -> Result<u64, ShardError> {
        let value = self.column(column)?;
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            ShardError::QueryError(format!("Column {} is not an unsigned integer: {}", column, value))
        })
    }
}

impl From<Map<String, Value>> for Row {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
