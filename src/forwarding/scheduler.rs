//! Forward Scheduler
//!
//! Each tick: check the mode under the lock, snapshot the queue, send outside
//! the lock, and on success remove exactly the snapshotted prefix. A failed
//! send leaves the queue as it was; the next tick retries with everything
//! accumulated since. No backoff, no batch size limit.

use super::sink::BatchSink;
use crate::pipeline::{DroneState, ForwardGate};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Drone is returning; no transmission attempted
    Suppressed,
    /// Queue empty
    Idle,
    /// Batch of this many entries delivered and removed from the queue
    Sent(usize),
    /// Send failed; queue retained
    Failed,
}

pub struct ForwardScheduler<S> {
    state: Arc<DroneState>,
    sink: S,
}

impl<S: BatchSink> ForwardScheduler<S> {
    pub fn new(state: Arc<DroneState>, sink: S) -> Self {
        Self { state, sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one forwarding attempt.
    pub async fn tick(&self) -> ForwardOutcome {
        let batch = match self.state.begin_forward() {
            ForwardGate::Suppressed => {
                debug!("Drone returning to base, forwarding suppressed");
                return ForwardOutcome::Suppressed;
            }
            ForwardGate::Empty => return ForwardOutcome::Idle,
            ForwardGate::Ready(batch) => batch,
        };

        let (summaries, anomalies) = batch.counts();
        match self.sink.send_batch(&batch).await {
            Ok(()) => {
                self.state.acknowledge_forward(batch.len());
                info!(
                    entries = batch.len(),
                    summaries,
                    anomalies,
                    destination = %self.sink.describe(),
                    "Batch forwarded"
                );
                ForwardOutcome::Sent(batch.len())
            }
            Err(e) => {
                self.state.record_forward_failure();
                error!(
                    entries = batch.len(),
                    destination = %self.sink.describe(),
                    error = %e,
                    "Forward failed, batch retained for next cycle"
                );
                ForwardOutcome::Failed
            }
        }
    }
}

/// Tick the scheduler every `interval` until cancelled.
///
/// The first attempt happens one full interval after start.
pub async fn run_forward_loop<S: BatchSink>(
    scheduler: ForwardScheduler<S>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    info!(
        interval_secs = interval.as_secs_f64(),
        destination = %scheduler.sink().describe(),
        "Forward scheduler started"
    );

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("[Forwarder] Received shutdown signal");
                return;
            }
            _ = ticker.tick() => {
                scheduler.tick().await;
            }
        }
    }
}
