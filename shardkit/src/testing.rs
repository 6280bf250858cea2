// shardkit/src/testing.rs
//
// In-memory connector for unit tests: records every open/close and serves
// scripted `system.clusters` rows. Also a loopback HTTP server answering
// every request with one canned response.
//

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::database::{ClusterConnection, ConnectTarget, ConnectionHandle, Connector, Row};
use crate::errors::ShardError;

#[derive(Default)]
pub struct MockConnector {
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    targets: Mutex<Vec<ConnectTarget>>,
    queries: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    fail_connect: HashSet<String>,
    fail_close: HashSet<String>,
    fail_queries: bool,
    connect_delay: Option<Duration>,
    cluster_rows: Arc<HashMap<String, Vec<Row>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, url: &str) -> Self {
        self.fail_connect.insert(url.to_string());
        self
    }

    pub fn fail_close_on(mut self, url: &str) -> Self {
        self.fail_close.insert(url.to_string());
        self
    }

    pub fn fail_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn with_connect_delay_ms(mut self, millis: u64) -> Self {
        self.connect_delay = Some(Duration::from_millis(millis));
        self
    }

    /// Rows returned for `system.clusters` as `(shard_num, host_address, port)`, in query order
    pub fn with_cluster(mut self, cluster: &str, rows: &[(u64, &str, u16)]) -> Self {
        let rows = rows
            .iter()
            .map(|(shard, host, port)| {
                Row::from_value(serde_json::json!({
                    "shard_num": shard,
                    "host_address": host,
                    "port": port,
                }))
                .unwrap()
            })
            .collect();
        Arc::make_mut(&mut self.cluster_rows).insert(cluster.to_string(), rows);
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> Vec<ConnectTarget> {
        self.targets.lock().clone()
    }

    pub fn queries(&self) -> Vec<(String, Vec<String>)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<ConnectionHandle, ShardError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.targets.lock().push(target.clone());

        if self.fail_connect.contains(&target.url) {
            return Err(ShardError::ConnectivityError(format!(
                "connection refused: {}",
                target.url
            )));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            endpoint: target.url.clone(),
            fail_close: self.fail_close.contains(&target.url),
            fail_queries: self.fail_queries,
            closes: self.closes.clone(),
            queries: self.queries.clone(),
            cluster_rows: self.cluster_rows.clone(),
        }))
    }
}

pub struct MockConnection {
    endpoint: String,
    fail_close: bool,
    fail_queries: bool,
    closes: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    cluster_rows: Arc<HashMap<String, Vec<Row>>>,
}

#[async_trait]
impl ClusterConnection for MockConnection {
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, ShardError> {
        self.queries
            .lock()
            .push((sql.to_string(), params.iter().map(|p| p.to_string()).collect()));

        if self.fail_queries {
            return Err(ShardError::QueryError("Code: 60. Table system.clusters does not exist".to_string()));
        }

        let cluster = params.first().copied().unwrap_or_default();
        Ok(self.cluster_rows.get(cluster).cloned().unwrap_or_default())
    }

    async fn close(&self) -> Result<(), ShardError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ShardError::CloseError(format!("socket already reset: {}", self.endpoint)));
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Serve every request on a fresh loopback port with the same response; returns the port
pub async fn serve_canned_http(status: &'static str, body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    port
}

// Consume headers plus a Content-Length body so the client never sees a reset
async fn read_request(socket: &mut TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        request.extend_from_slice(&chunk[..n]);

        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + length {
            return;
        }
    }
}
