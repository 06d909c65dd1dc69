//! Battery Simulator
//!
//! One-way decaying battery level that drives the operating mode. The
//! `Active -> Returning` transition fires once; only an explicit reset brings
//! the drone back to `Active`.

use crate::pipeline::DroneState;
use crate::types::OperatingMode;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Full charge, also the level restored by a reset.
pub const FULL_CHARGE: f64 = 100.0;

/// Rejected external control input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("battery threshold must be a finite value in [0, 100], got {0}")]
    ThresholdOutOfRange(f64),
}

/// Mode change produced by a decay tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryEvent {
    EnteredReturning,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryState {
    level: f64,
    threshold: f64,
    mode: OperatingMode,
}

impl BatteryState {
    /// Fully charged, `Active`, with the given return-to-base threshold.
    pub fn new(threshold: f64) -> Self {
        Self {
            level: FULL_CHARGE,
            threshold,
            mode: OperatingMode::Active,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Decay by `drain`, floored at zero, then evaluate the threshold.
    ///
    /// Returns `Some` only on the tick that flips the mode.
    pub fn tick(&mut self, drain: f64) -> Option<BatteryEvent> {
        self.level = (self.level - drain).max(0.0);
        if self.level <= self.threshold && self.mode == OperatingMode::Active {
            self.mode = OperatingMode::Returning;
            return Some(BatteryEvent::EnteredReturning);
        }
        None
    }

    /// Change the threshold. Takes effect on the next tick.
    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), ControlError> {
        if !threshold.is_finite() || !(0.0..=FULL_CHARGE).contains(&threshold) {
            return Err(ControlError::ThresholdOutOfRange(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }

    /// Recharge to full and resume `Active`. The threshold is kept.
    pub fn reset(&mut self) {
        self.level = FULL_CHARGE;
        self.mode = OperatingMode::Active;
    }
}

/// Run the decay loop until cancelled.
pub async fn run_battery_simulation(
    state: Arc<DroneState>,
    tick: Duration,
    drain: f64,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick);
    // A stalled runtime must not replay several decay steps back to back
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick of a tokio interval completes immediately
    interval.tick().await;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!(ticks, "[Battery] Received shutdown signal");
                return;
            }
            _ = interval.tick() => {
                ticks += 1;
                let (event, battery) = state.battery_tick(drain);
                debug!(level = battery.level(), mode = %battery.mode(), "[Battery] Tick");
                if let Some(BatteryEvent::EnteredReturning) = event {
                    warn!(
                        level = battery.level(),
                        threshold = battery.threshold(),
                        "Battery low: returning to base, forwarding suppressed"
                    );
                }
            }
        }
    }
}
