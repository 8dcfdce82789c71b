//! hollowrun - simulated CRI runtime for a hollow node
//!
//! Wires together:
//! - Metrics sink (from `--sink-config`)
//! - Node capacity (from `--node-resource-file` / `--node-resource-name`)
//! - Hollow runtime and its JSON-lines server on a Unix socket
//!
//! ## Usage
//!
//! ```sh
//! hollowrun --name hollow-node-0 \
//!     --node-resource-file nodes.yaml --node-resource-name small \
//!     --sink-config sink.yaml \
//!     --socket /run/hollowrun/hollow-node-0.sock
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use hollowrun::metrics::{self, MetricsSink, NodeMetric, SinkConfig};
use hollowrun::node::{MachineInfo, NodeResourceConfig, VersionInfo};
use hollowrun::{HollowRuntime, RuntimeConfig, StateStore};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// hollowrun - simulated container runtime for hollow nodes
#[derive(Parser, Debug)]
#[command(name = "hollowrun", version)]
#[command(about = "Simulated CRI runtime for hollow nodes", long_about = None)]
struct Args {
    /// Name of this hollow node
    #[arg(long, default_value = "fake-node")]
    name: String,

    /// File path of the node resource configuration
    #[arg(long, env = "HOLLOWRUN_NODE_RESOURCE_FILE")]
    node_resource_file: Option<PathBuf>,

    /// Node class in the node resource file to use
    #[arg(long, default_value = "")]
    node_resource_name: String,

    /// File path of the metrics sink configuration
    #[arg(long, env = "HOLLOWRUN_SINK_CONFIG")]
    sink_config: Option<PathBuf>,

    /// Additional node labels (key=value, comma separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_label)]
    node_labels: Vec<(String, String)>,

    /// Socket path (default: <tmp>/hollowrun-<name>.sock)
    #[arg(short, long, env = "HOLLOWRUN_SOCKET")]
    socket: Option<PathBuf>,

    /// Per-request timeout
    #[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
    request_timeout: Duration,

    /// Interval between sampled node metrics
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    metrics_interval: Duration,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn parse_label(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("invalid node label '{}', expected key=value", s)),
    }
}

/// Builds the metrics sink. A missing or unreadable config falls back to the
/// log sink.
fn load_sink(args: &Args) -> Box<dyn MetricsSink> {
    let config = args.sink_config.as_ref().and_then(|path| {
        SinkConfig::from_yaml_file(path)
            .inspect_err(|e| warn!(error = %e, "ignoring sink config"))
            .ok()
    });

    let sink = metrics::manufacture_sink(config.as_ref(), &args.name);
    if let Err(e) = sink.initialization() {
        warn!(error = %e, "failed to initialize metrics sink");
    }
    sink
}

/// Loads the node class and resolves the node's machine info and labels.
fn load_node(args: &Args) -> Result<(MachineInfo, BTreeMap<String, String>)> {
    let mut labels: BTreeMap<String, String> = args.node_labels.iter().cloned().collect();

    let class = match &args.node_resource_file {
        Some(path) => {
            let config = NodeResourceConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load node resources from {:?}", path))?;
            let class = config.class(&args.node_resource_name).cloned();
            if class.is_none() {
                warn!(
                    node_class = %args.node_resource_name,
                    "node class not found, using default capacity"
                );
            }
            class
        }
        None => None,
    };

    if let Some(class) = &class {
        labels.extend(class.labels.clone());
    }

    Ok((MachineInfo::from_node_class(&args.name, class.as_ref()), labels))
}

#[cfg(unix)]
async fn serve(args: &Args, runtime: Arc<HollowRuntime>) -> Result<()> {
    use hollowrun::transport::Server;
    use tokio::net::UnixListener;

    let socket = args
        .socket
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("hollowrun-{}.sock", args.name)));

    if socket.exists() {
        std::fs::remove_file(&socket)
            .with_context(|| format!("Failed to remove stale socket {:?}", socket))?;
    }
    let listener = UnixListener::bind(&socket)
        .with_context(|| format!("Failed to bind socket {:?}", socket))?;

    info!(socket = %socket.display(), "hollow runtime listening");

    let server = Arc::new(Server::for_hollow(runtime));
    let result = tokio::select! {
        result = server.serve(listener) => result.context("server failed"),
        _ = shutdown_signal() => {
            info!("shutting down");
            Ok(())
        }
    };

    let _ = std::fs::remove_file(&socket);
    result
}

#[cfg(not(unix))]
async fn serve(_args: &Args, _runtime: Arc<HollowRuntime>) -> Result<()> {
    anyhow::bail!("hollowrun serves over Unix domain sockets, which this platform lacks")
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "cannot watch SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

/// Logs a sampled capacity metric every `interval`.
async fn report_metrics(
    sink: Box<dyn MetricsSink>,
    machine: MachineInfo,
    store: Arc<StateStore>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let metric = NodeMetric::sampled(machine.capacity(), store.now());
        if let Err(e) = sink.log_node_metrics(&metric) {
            warn!(error = %e, "failed to log node metric");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        node = %args.name,
        "hollowrun starting"
    );

    let sink = load_sink(&args);
    let (machine, labels) = load_node(&args)?;
    let versions = VersionInfo::default();

    info!(
        cores = machine.num_cores,
        memory = machine.memory_capacity,
        kernel = %versions.kernel_version,
        os = %versions.container_os_version,
        labels = ?labels,
        "node configured"
    );

    if let Err(e) = sink.log_node_metrics(&NodeMetric::static_capacity(machine.capacity())) {
        warn!(error = %e, "failed to log node capacity");
    }

    let store = Arc::new(StateStore::new());
    let runtime = Arc::new(
        HollowRuntime::with_store(Arc::clone(&store))
            .with_config(RuntimeConfig::default().with_request_timeout(args.request_timeout))
            .with_hook(Arc::new(metrics::LogSink::new(&args.name))),
    );

    if !args.metrics_interval.is_zero() {
        tokio::spawn(report_metrics(
            sink,
            machine,
            Arc::clone(&store),
            args.metrics_interval,
        ));
    }

    serve(&args, runtime).await
}
