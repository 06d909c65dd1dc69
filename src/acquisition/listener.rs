//! Ingestion Listener
//!
//! Accepts sensor connections and runs one reader task per connection. A
//! connection fault only ends that connection's task; the accept loop runs
//! until shutdown.

use super::framing::{FrameEvent, JsonLineReader};
use crate::pipeline::DroneState;
use crate::types::Reading;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Keepalive idle time before the first probe on a sensor socket.
const KEEPALIVE_TIME: Duration = Duration::from_secs(30);
/// Interval between keepalive probes.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
/// Pause after a failed accept (e.g. fd exhaustion) before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Bound sensor ingestion endpoint.
pub struct IngestionListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl IngestionListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind sensor listener on {addr}"))?;
        let local_addr = listener.local_addr()?;
        Ok(Self { listener, local_addr })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `cancel_token` fires.
    ///
    /// No limit on concurrent connections. Connection tasks are cancelled
    /// together with the listener.
    pub async fn run(self, state: Arc<DroneState>, cancel_token: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr, "Sensor listener accepting connections");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[Listener] Received shutdown signal");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tokio::spawn(handle_connection(
                                stream,
                                peer,
                                Arc::clone(&state),
                                cancel_token.child_token(),
                            ));
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept sensor connection");
                            tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                        }
                    }
                }
            }
        }
    }
}

fn enable_keepalive(stream: &TcpStream) {
    let sock_ref = socket2::SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
        debug!(error = %e, "Could not enable TCP keepalive");
    }
}

/// Read one sensor connection to completion.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<DroneState>,
    cancel_token: CancellationToken,
) {
    enable_keepalive(&stream);
    state.connection_opened();
    info!(peer = %peer, "Sensor connected");

    let mut reader: JsonLineReader<_, Reading> = JsonLineReader::new(stream);
    let mut received = 0u64;

    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = reader.next_event() => event,
        };

        match event {
            Ok(FrameEvent::Record(reading)) => {
                received += 1;
                debug!(
                    peer = %peer,
                    sensor_id = %reading.sensor_id,
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    "Reading received"
                );
                let outcome = state.ingest(reading);
                if let Some(oldest) = &outcome.evicted {
                    trace!(
                        evicted = %oldest.sensor_id,
                        avg_temp = outcome.summary.avg_temp,
                        avg_humid = outcome.summary.avg_humid,
                        queue_len = outcome.queue_len,
                        "Window full, oldest reading evicted"
                    );
                }
                if let Some(anomaly) = outcome.anomaly {
                    warn!(peer = %peer, %anomaly, "Anomaly detected");
                }
            }
            Ok(FrameEvent::Malformed { excerpt, error }) => {
                state.record_malformed();
                warn!(peer = %peer, error = %error, line = %excerpt, "Discarding malformed record");
            }
            Ok(FrameEvent::Disconnected) => break,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Sensor connection fault");
                break;
            }
        }
    }

    state.connection_closed();
    info!(peer = %peer, readings = received, "Sensor disconnected");
}
