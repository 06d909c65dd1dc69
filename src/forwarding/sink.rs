//! Batch transport to the central collector.

use crate::types::Batch;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Forwarding failures. All of them leave the forward queue untouched.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Connect to collector {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Collector send timed out after {0:?}")]
    Timeout(Duration),

    #[error("Write to collector failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for forward batches.
///
/// `Ok` means the whole batch was handed over; no acknowledgement payload is
/// read back.
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    async fn send_batch(&self, batch: &Batch) -> Result<(), ForwardError>;

    /// Human-readable destination for logging.
    fn describe(&self) -> String;
}

/// One short-lived TCP connection per batch, bounded by a single timeout
/// covering connect, write and shutdown.
#[derive(Debug, Clone)]
pub struct TcpCollectorSink {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpCollectorSink {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    async fn transmit(&self, line: &[u8]) -> Result<(), ForwardError> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| ForwardError::Connect {
                addr: self.addr,
                source,
            })?;
        stream.write_all(line).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl BatchSink for TcpCollectorSink {
    async fn send_batch(&self, batch: &Batch) -> Result<(), ForwardError> {
        let line = batch.to_line()?;
        tokio::time::timeout(self.timeout, self.transmit(&line))
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}
