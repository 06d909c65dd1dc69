//! Central collector side of the batch protocol.
//!
//! Decodes `{"batch": [...]}` lines from drones and hands them to a channel.
//! Storage is out of scope; the `central-collector` binary only logs.

use crate::acquisition::{FrameEvent, JsonLineReader};
use crate::types::{Anomaly, Batch, BatchEntry, Summary};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default collector listen address.
pub const DEFAULT_COLLECTOR_ADDR: &str = "0.0.0.0:6000";

/// A batch as received, split by entry kind with order kept within each kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedBatch {
    pub peer: SocketAddr,
    pub summaries: Vec<Summary>,
    pub anomalies: Vec<Anomaly>,
}

impl ReceivedBatch {
    pub fn from_batch(peer: SocketAddr, batch: Batch) -> Self {
        let mut summaries = Vec::new();
        let mut anomalies = Vec::new();
        for entry in batch.batch {
            match entry {
                BatchEntry::Summary(s) => summaries.push(s),
                BatchEntry::Anomaly(a) => anomalies.push(a),
            }
        }
        Self {
            peer,
            summaries,
            anomalies,
        }
    }

    pub fn len(&self) -> usize {
        self.summaries.len() + self.anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accepts drone connections and forwards every decoded batch to a channel.
pub struct CollectorListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl CollectorListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind collector on {addr}"))?;
        let local_addr = listener.local_addr()?;
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept until cancelled or until the receiving side is dropped.
    pub async fn run(
        self,
        batches: mpsc::Sender<ReceivedBatch>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        info!(addr = %self.local_addr, "Central collector listening");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => return Ok(()),
                _ = batches.closed() => {
                    info!("Batch receiver dropped, collector stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept drone connection");
                            continue;
                        }
                    };
                    tokio::spawn(handle_drone(stream, peer, batches.clone()));
                }
            }
        }
    }
}

async fn handle_drone(stream: TcpStream, peer: SocketAddr, batches: mpsc::Sender<ReceivedBatch>) {
    info!(peer = %peer, "Drone connected");
    let mut reader: JsonLineReader<_, Batch> = JsonLineReader::new(stream);

    loop {
        match reader.next_event().await {
            Ok(FrameEvent::Record(batch)) => {
                if batches.send(ReceivedBatch::from_batch(peer, batch)).await.is_err() {
                    break;
                }
            }
            Ok(FrameEvent::Malformed { excerpt, error }) => {
                warn!(peer = %peer, error = %error, line = %excerpt, "Discarding malformed batch");
            }
            Ok(FrameEvent::Disconnected) => break,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Drone connection fault");
                break;
            }
        }
    }
}
