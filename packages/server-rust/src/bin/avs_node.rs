//! AVS node binary.
//!
//! Seeds the operator registry from a JSON file, then either broadcasts a
//! single task and prints its summary, or runs the maintenance worker until
//! Ctrl-C.
//!
//! Usage:
//!   avs-node --operators operators.json
//!   avs-node --operators operators.json --task task.json --allow 0xabc...

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use avs_core::{canonical_address, OperatorInfo, RegistryError, SystemClock, Task};
use avs_server::{
    AvsNode, BroadcastConfig, HttpTransport, MaintenanceTask, MemoryOperatorStore, NodeConfig,
};

#[derive(Parser, Debug)]
#[command(name = "avs-node")]
#[command(about = "Operator registry and task broadcaster for an AVS")]
#[command(version)]
struct Args {
    /// JSON array of operators (`address`, `endpoint`, optional `lastSeenMs`)
    #[arg(long, env = "AVS_OPERATORS")]
    operators: Option<PathBuf>,

    /// Broadcast this JSON task once and exit
    #[arg(long, env = "AVS_TASK")]
    task: Option<PathBuf>,

    /// Only deliver to these operator addresses (repeatable); default permits all
    #[arg(long = "allow", env = "AVS_ALLOW", value_delimiter = ',')]
    allow: Vec<String>,

    /// Seconds without a heartbeat before an operator expires
    #[arg(long, env = "AVS_OPERATOR_TTL_SECS", default_value = "60")]
    operator_ttl_secs: u64,

    /// Seconds between maintenance sweeps
    #[arg(
        long,
        env = "AVS_SWEEP_INTERVAL_SECS",
        default_value = "15",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    sweep_interval_secs: u64,

    /// Maximum concurrent sends per broadcast
    #[arg(long, env = "AVS_MAX_CONCURRENT_SENDS", default_value = "64")]
    max_concurrent_sends: usize,

    /// Per-send timeout in milliseconds
    #[arg(long, env = "AVS_SEND_TIMEOUT_MS", default_value = "5000")]
    send_timeout_ms: u64,

    /// Emit logs as JSON
    #[arg(long, env = "AVS_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            operator_ttl: Duration::from_secs(self.operator_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            broadcast: BroadcastConfig {
                max_concurrent_sends: self.max_concurrent_sends,
                send_timeout: Duration::from_millis(self.send_timeout_ms),
            },
            ..NodeConfig::default()
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatorSeed {
    address: String,
    endpoint: String,
    #[serde(default)]
    last_seen_ms: u64,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,avs_server=debug"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn seed(node: &AvsNode, path: &Path) -> anyhow::Result<usize> {
    let seeds: Vec<OperatorSeed> = read_json(path).await?;
    let now = node.registry().now_ms();
    let mut added = 0;
    for seed in seeds {
        let address = canonical_address(&seed.address)?;
        let last_seen_ms = if seed.last_seen_ms == 0 { now } else { seed.last_seen_ms };
        match node
            .registry()
            .add_operator(OperatorInfo::new(address, seed.endpoint, last_seen_ms))
            .await
        {
            Ok(()) => added += 1,
            Err(RegistryError::Duplicate(address)) => {
                warn!(operator = %address, "duplicate seed entry ignored");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(added)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = args.node_config();
    let transport = HttpTransport::new(config.broadcast.send_timeout)?;
    let node = AvsNode::new(
        config,
        Arc::new(MemoryOperatorStore::new()),
        Arc::new(SystemClock),
        Arc::new(transport),
    );

    if let Some(path) = &args.operators {
        let added = seed(&node, path).await?;
        info!(added, path = %path.display(), "seeded operators");
    }
    let generation = node.refresh_snapshot().await?;
    info!(generation, "initial snapshot installed");

    if let Some(path) = &args.task {
        let task: Task = read_json(path).await?;
        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let summary = if args.allow.is_empty() {
            node.broadcast(&cancel, &task, &|_: &OperatorInfo, _: &Task| true)
                .await
        } else {
            let allowed = args
                .allow
                .iter()
                .map(String::as_str)
                .map(canonical_address)
                .collect::<Result<HashSet<_>, _>>()?;
            let policy = move |op: &OperatorInfo, _: &Task| allowed.contains(&op.address);
            node.broadcast(&cancel, &task, &policy).await
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut worker = node.start_maintenance();
    worker.submit(MaintenanceTask::ExpireNow).await?;
    info!(health = ?node.health().await, "node running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    worker.stop().await;
    Ok(())
}
