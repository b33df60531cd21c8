use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use huddle_server::ServerConfig;
use huddle_store::TaskStore;
use huddle_telemetry::{init_telemetry, TelemetryConfig};

/// Task board API and WebSocket chat relay.
#[derive(Debug, Parser)]
#[command(name = "huddle", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long, short)]
    port: Option<u16>,

    /// Capacity of the chat relay's inbound queue.
    #[arg(long)]
    inbound_capacity: Option<usize>,

    /// Do not deliver chat messages back to their sender.
    #[arg(long)]
    no_echo: bool,

    /// Directory of static files served for unmatched paths.
    #[arg(long, conflicts_with = "no_static")]
    static_dir: Option<PathBuf>,

    /// Disable static file serving.
    #[arg(long)]
    no_static: bool,

    /// Base log level (RUST_LOG takes precedence).
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.inbound_capacity {
            config.inbound_capacity = capacity.max(1);
        }
        if self.no_echo {
            config.echo_to_sender = false;
        }
        if let Some(dir) = &self.static_dir {
            config.static_dir = Some(dir.clone());
        }
        if self.no_static {
            config.static_dir = None;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        log_level: cli.log_level,
        json: cli.log_json,
        ..Default::default()
    })
    .context("failed to initialize logging")?;

    let mut config = ServerConfig::default();
    config.apply_env_overrides();
    cli.apply(&mut config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting huddle");

    let shutdown = CancellationToken::new();
    let port = config.port;
    let handle = huddle_server::start(config, TaskStore::new(), shutdown)
        .await
        .with_context(|| format!("failed to start server on port {port}"))?;

    tracing::info!(addr = %handle.addr(), "huddle ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}
