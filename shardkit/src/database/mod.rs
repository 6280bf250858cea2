pub mod connection;
pub mod http;
pub mod registry;

pub use connection::{ClusterConnection, ConnectTarget, ConnectionHandle, Connector, Row};
pub use http::{HttpConnection, HttpConnector};
pub use registry::{normalize_url, ConnectionRegistry};
