use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Connectivity error: {0}")]
    ConnectivityError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Close error: {0}")]
    CloseError(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ShardError {
    fn from(err: config::ConfigError) -> Self {
        ShardError::ConfigError(err.to_string())
    }
}
