// shardkit/src/database/http.rs
//
// ClickHouse HTTP interface transport
// Opens `clickhouse://host1:port1,host2:port2/db` targets with primary-first failover
//

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{PASSWORD_PROPERTY, USER_PROPERTY};
use crate::errors::ShardError;
use crate::types::CLICKHOUSE_SCHEME;
use super::connection::{ClusterConnection, ConnectTarget, ConnectionHandle, Connector, Row};

const USER_HEADER: &str = "X-ClickHouse-User";
const KEY_HEADER: &str = "X-ClickHouse-Key";

/// Connection target split into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTarget {
    pub scheme: &'static str,
    pub endpoints: Vec<String>,
    pub database: Option<String>,
    pub settings: Vec<(String, String)>,
}

/// Split `clickhouse://h1:p1,h2:p2[/db][?k=v&...]` (or `http(s)://...`) into its parts
pub fn parse_target(url: &str) -> Result<ParsedTarget, ShardError> {
    let (scheme, rest) = if let Some(rest) = url.strip_prefix(CLICKHOUSE_SCHEME) {
        ("http", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        ("http", rest)
    } else if let Some(rest) = url.strip_prefix("https://") {
        ("https", rest)
    } else {
        return Err(ShardError::ConnectivityError(format!(
            "Unsupported connection target: {}",
            url
        )));
    };

    let (rest, query) = rest.split_once('?').unwrap_or((rest, ""));
    let (hosts, path) = rest.split_once('/').unwrap_or((rest, ""));

    let endpoints: Vec<String> = hosts
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();
    if endpoints.is_empty() {
        return Err(ShardError::ConnectivityError(format!(
            "No endpoints in connection target: {}",
            url
        )));
    }

    let database = Some(path.trim_matches('/'))
        .filter(|db| !db.is_empty())
        .map(str::to_string);

    let settings = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect();

    Ok(ParsedTarget {
        scheme,
        endpoints,
        database,
        settings,
    })
}

/// Connector speaking the ClickHouse HTTP interface
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Result<Self, ShardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShardError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<ConnectionHandle, ShardError> {
        let parsed = parse_target(&target.url)?;
        let database = if target.database.is_empty() {
            parsed.database.clone().unwrap_or_else(|| "default".to_string())
        } else {
            target.database.clone()
        };

        let mut settings = parsed.settings.clone();
        settings.extend(
            target
                .properties
                .iter()
                .filter(|(key, _)| key.as_str() != USER_PROPERTY && key.as_str() != PASSWORD_PROPERTY)
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        let mut last_error = None;
        for endpoint in &parsed.endpoints {
            let connection = HttpConnection::new(
                self.client.clone(),
                parsed.scheme,
                endpoint,
                &database,
                &settings,
                target.properties.get(USER_PROPERTY).cloned(),
                target.properties.get(PASSWORD_PROPERTY).cloned(),
            )?;

            match connection.ping().await {
                Ok(()) => {
                    info!("Connected to ClickHouse endpoint {}", connection.endpoint());
                    return Ok(Arc::new(connection));
                }
                Err(e) => {
                    warn!("ClickHouse endpoint {} unavailable: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ShardError::ConnectivityError(format!(
            "No reachable endpoint in {}: {}",
            target.url,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

pub struct HttpConnection {
    client: reqwest::Client,
    url: reqwest::Url,
    endpoint: String,
    user: Option<String>,
    password: Option<String>,
    closed: AtomicBool,
}

impl HttpConnection {
    fn new(
        client: reqwest::Client,
        scheme: &str,
        endpoint: &str,
        database: &str,
        settings: &[(String, String)],
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ShardError> {
        let base = format!("{}://{}/", scheme, endpoint);
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| ShardError::ConnectivityError(format!("Invalid endpoint {}: {}", endpoint, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("database", database);
            for (key, value) in settings {
                pairs.append_pair(key, value);
            }
        }

        Ok(Self {
            client,
            url,
            endpoint: format!("{}://{}", scheme, endpoint),
            user,
            password,
            closed: AtomicBool::new(false),
        })
    }

    async fn ping(&self) -> Result<(), ShardError> {
        self.execute("SELECT 1".to_string()).await.map(|_| ())
    }

    async fn execute(&self, statement: String) -> Result<String, ShardError> {
        let mut request = self.client.post(self.url.clone()).body(statement);
        if let Some(ref user) = self.user {
            request = request.header(USER_HEADER, user);
        }
        if let Some(ref password) = self.password {
            request = request.header(KEY_HEADER, password);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ShardError::QueryError(format!("Request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShardError::QueryError(format!("Failed to read response from {}: {}", self.endpoint, e)))?;

        if !status.is_success() {
            return Err(ShardError::QueryError(format!("HTTP {}: {}", status, body.trim())));
        }
        Ok(body)
    }
}

#[async_trait]
impl ClusterConnection for HttpConnection {
    async fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>, ShardError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ShardError::QueryError(format!("Connection to {} is closed", self.endpoint)));
        }

        let statement = format!("{} FORMAT JSONEachRow", bind_params(sql, params)?);
        debug!("Executing on {}: {}", self.endpoint, statement);

        let body = self.execute(statement).await?;
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Row::from_json_line)
            .collect()
    }

    async fn close(&self) -> Result<(), ShardError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed connection to {}", self.endpoint);
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Substitute positional `?` placeholders with quoted parameters.
///
/// Placeholders inside string literals (`'...'`) and quoted identifiers
/// (`"..."`, `` `...` ``) are left alone.
pub fn bind_params(sql: &str, params: &[&str]) -> Result<String, ShardError> {
    let mut bound = String::with_capacity(sql.len());
    let mut params = params.iter();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in sql.chars() {
        if let Some(open) = quote {
            bound.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                bound.push(c);
            }
            '?' => {
                let param = params.next().ok_or_else(|| {
                    ShardError::QueryError(format!("Missing parameter for placeholder in: {}", sql))
                })?;
                bound.push_str(&quote_literal(param));
            }
            _ => bound.push(c),
        }
    }

    if params.next().is_some() {
        return Err(ShardError::QueryError(format!("Too many parameters for: {}", sql)));
    }
    Ok(bound)
}

fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}
