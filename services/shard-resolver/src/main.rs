mod config;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shardkit::topology::build_port_resolver;
use shardkit::{expression, ConnectionRegistry, HttpConnector, TopologyResolver};

use crate::config::ShardResolverConfig;

#[derive(Parser, Debug)]
#[command(name = "shard-resolver")]
#[command(about = "Resolve ClickHouse cluster shards and open one connection per shard")]
struct Args {
    #[arg(short, long, default_value = "config/shard-resolver.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a cluster's shards and open a connection to each
    Shards {
        /// Cluster name in system.clusters (defaults to topology.cluster)
        #[arg(long)]
        cluster: Option<String>,

        /// Database for shard connections (defaults to connection.database)
        #[arg(long)]
        database: Option<String>,
    },
    /// Parse a sharding-key expression and print it as JSON
    ParseKey { expression: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shard_resolver=info,shardkit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match args.command {
        Command::ParseKey { expression } => {
            let parsed = expression::parse(&expression);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Command::Shards { cluster, database } => {
            let config = config::load_config(&args.config)?;
            resolve_shards(config, cluster, database).await?;
        }
    }

    Ok(())
}

async fn resolve_shards(
    config: ShardResolverConfig,
    cluster: Option<String>,
    database: Option<String>,
) -> Result<()> {
    let cluster = cluster
        .or_else(|| config.topology.cluster.clone())
        .ok_or_else(|| anyhow!("no cluster given: pass --cluster or set topology.cluster"))?;
    let database = database.unwrap_or_else(|| config.connection.database.clone());
    let timeout = config.connection.connect_timeout();

    let connector = Arc::new(HttpConnector::new(timeout)?);
    let registry = Arc::new(ConnectionRegistry::new(config.connection.clone(), connector));
    let port_resolver = build_port_resolver(&config.topology, timeout)?;
    let resolver = TopologyResolver::new(registry.clone(), port_resolver);

    info!("Resolving shards of cluster {} via {}", cluster, registry.options().url);
    let result = open_shards(&resolver, &registry, &cluster, &database).await;

    registry.close().await;
    result
}

async fn open_shards(
    resolver: &TopologyResolver,
    registry: &ConnectionRegistry,
    cluster: &str,
    database: &str,
) -> Result<()> {
    let spec = resolver.resolve_cluster_spec(cluster).await?;
    if spec.is_empty() {
        warn!("Cluster {} has no shards", cluster);
        return Ok(());
    }

    let connections = registry.create_shard_connections(&spec, database).await?;
    for shard in spec.shards() {
        if let Some(connection) = connections.get(&shard.num()) {
            info!("Shard {} connected via {}", shard.num(), connection.endpoint());
        }
        println!("shard {}: {}", shard.num(), shard.composite_url());
    }

    Ok(())
}
