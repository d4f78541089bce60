//! McLighting Bridge
//!
//! Keeps a McLighting controller connected and exposes its states as JSON
//! lines. Each line on stdin is a state write:
//!
//! ```text
//! {"id":"mclighting.0.brightness","value":128}
//! ```
//!
//! Every state update is printed to stdout as
//! `{"name":"brightness","value":128,"ack":true}`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mclighting_client::{
    DeviceConfig, DeviceHandle, MemoryBus, StateBus, StateChange, Supervisor, WebSocketConnector,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mclighting-bridge")]
#[command(about = "Bridge a McLighting controller to JSON lines on stdin/stdout")]
#[command(version)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Controller port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Controller drives RGBW strips
    #[arg(long)]
    rgbw: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(cli: &Cli) -> Result<DeviceConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => DeviceConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.rgbw {
        config.rgbw = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries state updates
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = load_config(&cli)?;
    info!("Starting McLighting bridge for {}", config.url());

    let bus = Arc::new(MemoryBus::new());
    let mut updates = bus.subscribe();

    let stdout_handle = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if let Ok(json) = serde_json::to_string(&update) {
                        let _ = stdout.write_all(json.as_bytes()).await;
                        let _ = stdout.write_all(b"\n").await;
                        let _ = stdout.flush().await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} state updates", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut device = Supervisor::spawn(config, WebSocketConnector, bus.clone());

    tokio::select! {
        result = read_writes(BufReader::new(tokio::io::stdin()), &bus, &device) => {
            if let Err(e) = result {
                error!("Error reading stdin: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    device.shutdown().await;
    stdout_handle.abort();
    info!("McLighting bridge stopped");

    Ok(())
}

/// Apply state writes from `input` until EOF. Bad lines are logged and
/// skipped; only a failing reader ends the loop.
async fn read_writes<R>(mut input: R, bus: &MemoryBus, device: &DeviceHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        line.clear();
        if input.read_until(b'\n', &mut line).await? == 0 {
            info!("EOF received, shutting down");
            return Ok(());
        }

        let text = match std::str::from_utf8(&line) {
            Ok(text) => text.trim(),
            Err(e) => {
                warn!("Skipping line that is not UTF-8: {}", e);
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }
        debug!("Received: {}", text);

        let change: StateChange = match serde_json::from_str(text) {
            Ok(change) => change,
            Err(e) => {
                warn!("Invalid state write: {}", e);
                continue;
            }
        };

        // The bus holds the written value so batched color edits can read it back
        if let Err(e) = bus
            .set_state(change.command(), change.value.clone(), change.ack)
            .await
        {
            warn!("Rejected state write {}: {}", change.id, e);
            continue;
        }
        if let Err(e) = device.write(change).await {
            error!("Cannot deliver state write: {}", e);
        }
    }
}
