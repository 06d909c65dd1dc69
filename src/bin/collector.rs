//! central-collector - receives drone batches and logs them
//!
//! Stand-in for the central server during local runs. Nothing is stored.
//!
//! ```bash
//! central-collector --listen-addr 0.0.0.0:6000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use drone_edge::collector::{CollectorListener, DEFAULT_COLLECTOR_ADDR};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Batches buffered between connection tasks and the logger.
const BATCH_CHANNEL_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "central-collector")]
#[command(about = "Receive batches from drones and log them")]
#[command(version)]
struct CliArgs {
    /// Address to listen on for drone connections
    #[arg(long, default_value = DEFAULT_COLLECTOR_ADDR)]
    listen_addr: SocketAddr,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let listener = CollectorListener::bind(args.listen_addr)
        .await
        .context("Collector startup failed")?;
    let (tx, mut rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
    let cancel_token = CancellationToken::new();
    let server = tokio::spawn(listener.run(tx, cancel_token.clone()));

    let mut batches = 0u64;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!(batches, "Shutting down");
                cancel_token.cancel();
                break;
            }
            received = rx.recv() => {
                let Some(batch) = received else { break };
                batches += 1;
                info!(
                    peer = %batch.peer,
                    summaries = batch.summaries.len(),
                    anomalies = batch.anomalies.len(),
                    "Batch received"
                );
                for summary in &batch.summaries {
                    info!(
                        avg_temp = summary.avg_temp,
                        avg_humid = summary.avg_humid,
                        last_update = %summary.last_update,
                        "Summary"
                    );
                }
                for anomaly in &batch.anomalies {
                    warn!(%anomaly, "Anomaly reported by drone");
                }
            }
        }
    }

    server.await.context("Collector task panicked")??;
    Ok(())
}
