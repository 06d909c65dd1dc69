//! Drone State - single owner of all shared mutable state
//!
//! The rolling window, anomaly log, forward queue and battery live together
//! behind one mutex. Every operation takes the lock for a short, I/O-free
//! critical section; network sends work on snapshots taken here.
//!
//! The lock is a `std::sync::Mutex`. Its guard is `!Send`, so a spawned task
//! cannot hold it across an `.await`.

use crate::aggregation::RollingWindow;
use crate::anomaly;
use crate::battery::{BatteryEvent, BatteryState, ControlError};
use crate::config::DroneConfig;
use crate::types::{Anomaly, Batch, BatchEntry, OperatingMode, Reading, Summary};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Number of recent anomalies included in a status snapshot.
pub const STATUS_RECENT_ANOMALIES: usize = 10;

/// Construction parameters for [`DroneState`].
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub name: String,
    pub window_capacity: usize,
    pub battery_threshold: f64,
    /// Queue anomalies alongside summaries for the collector
    pub forward_anomalies: bool,
    /// Warn each time the forward queue grows by this many entries
    pub queue_warn_len: usize,
}

impl Default for StateSettings {
    fn default() -> Self {
        use crate::config::defaults;
        Self {
            name: defaults::DRONE_NAME.to_string(),
            window_capacity: defaults::WINDOW_CAPACITY,
            battery_threshold: defaults::BATTERY_THRESHOLD,
            forward_anomalies: true,
            queue_warn_len: defaults::QUEUE_WARN_LEN,
        }
    }
}

impl From<&DroneConfig> for StateSettings {
    fn from(config: &DroneConfig) -> Self {
        Self {
            name: config.drone.name.clone(),
            window_capacity: config.aggregation.window_capacity,
            battery_threshold: config.battery.threshold,
            forward_anomalies: config.forwarding.include_anomalies,
            queue_warn_len: config.forwarding.queue_warn_len,
        }
    }
}

/// Result of ingesting one reading.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub anomaly: Option<Anomaly>,
    pub summary: Summary,
    pub evicted: Option<Reading>,
    pub queue_len: usize,
}

/// Decision taken by the forward scheduler under the lock.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardGate {
    /// Mode is `Returning`; nothing may be sent
    Suppressed,
    /// Nothing queued
    Empty,
    /// Immutable copy of the queue at this instant
    Ready(Batch),
}

/// Running counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DroneCounters {
    pub readings_ingested: u64,
    pub malformed_records: u64,
    pub connections_total: u64,
    pub connections_active: u64,
    pub batches_forwarded: u64,
    pub entries_forwarded: u64,
    pub forward_failures: u64,
    pub forward_suppressed: u64,
}

/// Point-in-time view for the control surface and logs.
#[derive(Debug, Clone, Serialize)]
pub struct DroneStatus {
    pub name: String,
    pub battery_level: f64,
    pub battery_threshold: f64,
    pub mode: OperatingMode,
    pub window_len: usize,
    pub window_capacity: usize,
    pub avg_temp: f64,
    pub avg_humid: f64,
    pub queue_len: usize,
    pub anomaly_count: usize,
    pub recent_anomalies: Vec<Anomaly>,
    pub counters: DroneCounters,
}

#[derive(Debug)]
struct DroneCore {
    window: RollingWindow,
    anomalies: Vec<Anomaly>,
    forward_queue: Vec<BatchEntry>,
    battery: BatteryState,
    counters: DroneCounters,
}

/// Synchronised owner of the window, anomaly log, forward queue and battery.
///
/// Shared as `Arc<DroneState>`; raw containers are never handed out.
#[derive(Debug)]
pub struct DroneState {
    name: String,
    forward_anomalies: bool,
    queue_warn_len: usize,
    core: Mutex<DroneCore>,
}

impl DroneState {
    pub fn new(settings: StateSettings) -> Self {
        Self {
            name: settings.name,
            forward_anomalies: settings.forward_anomalies,
            queue_warn_len: settings.queue_warn_len.max(1),
            core: Mutex::new(DroneCore {
                window: RollingWindow::new(settings.window_capacity),
                anomalies: Vec::new(),
                forward_queue: Vec::new(),
                battery: BatteryState::new(settings.battery_threshold),
                counters: DroneCounters::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, DroneCore> {
        self.core.lock().unwrap_or_else(|e| {
            warn!("DroneState mutex poisoned, recovering");
            e.into_inner()
        })
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Classify, aggregate and queue one reading in a single critical section.
    pub fn ingest(&self, reading: Reading) -> IngestOutcome {
        let anomaly = anomaly::classify(&reading);

        let mut core = self.lock();
        core.counters.readings_ingested += 1;

        let evicted = core.window.ingest(reading);
        let summary = core.window.summarize(Utc::now());

        let before = core.forward_queue.len();
        if let Some(ref a) = anomaly {
            core.anomalies.push(a.clone());
            if self.forward_anomalies {
                core.forward_queue.push(a.clone().into());
            }
        }
        core.forward_queue.push(summary.clone().into());
        let queue_len = core.forward_queue.len();
        drop(core);

        if queue_len / self.queue_warn_len > before / self.queue_warn_len {
            warn!(
                queue_len,
                "Forward queue keeps growing; collector unreachable or forwarding suppressed"
            );
        }

        IngestOutcome {
            anomaly,
            summary,
            evicted,
            queue_len,
        }
    }

    pub fn record_malformed(&self) {
        self.lock().counters.malformed_records += 1;
    }

    pub fn connection_opened(&self) {
        let mut core = self.lock();
        core.counters.connections_total += 1;
        core.counters.connections_active += 1;
    }

    pub fn connection_closed(&self) {
        let mut core = self.lock();
        core.counters.connections_active = core.counters.connections_active.saturating_sub(1);
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    /// Exact rolling mean over the current window; `(0.0, 0.0)` when empty.
    pub fn current_average(&self) -> (f64, f64) {
        self.lock().window.current_average()
    }

    /// Window contents, oldest first.
    pub fn window_snapshot(&self) -> Vec<Reading> {
        self.lock().window.to_vec()
    }

    /// Window contents and their exact mean, read under one lock.
    pub fn window_view(&self) -> (Vec<Reading>, (f64, f64)) {
        let core = self.lock();
        (core.window.to_vec(), core.window.current_average())
    }

    /// Up to `limit` most recent anomalies, oldest first.
    pub fn recent_anomalies(&self, limit: usize) -> Vec<Anomaly> {
        let core = self.lock();
        let start = core.anomalies.len().saturating_sub(limit);
        core.anomalies[start..].to_vec()
    }

    pub fn anomaly_count(&self) -> usize {
        self.lock().anomalies.len()
    }

    // ------------------------------------------------------------------
    // Forward queue
    // ------------------------------------------------------------------

    /// Snapshot of the pending forward queue, in append order.
    pub fn forward_queue_snapshot(&self) -> Vec<BatchEntry> {
        self.lock().forward_queue.clone()
    }

    pub fn forward_queue_len(&self) -> usize {
        self.lock().forward_queue.len()
    }

    /// Check the mode and, if forwarding is allowed, copy the queue.
    pub fn begin_forward(&self) -> ForwardGate {
        let mut core = self.lock();
        if !core.battery.mode().forwarding_allowed() {
            core.counters.forward_suppressed += 1;
            return ForwardGate::Suppressed;
        }
        if core.forward_queue.is_empty() {
            return ForwardGate::Empty;
        }
        ForwardGate::Ready(Batch::new(core.forward_queue.clone()))
    }

    /// Remove exactly the `sent` oldest entries after a successful transmission.
    ///
    /// Entries appended while the batch was in flight sit behind the
    /// snapshotted prefix and stay queued.
    pub fn acknowledge_forward(&self, sent: usize) {
        let mut core = self.lock();
        let sent = sent.min(core.forward_queue.len());
        core.forward_queue.drain(..sent);
        core.counters.batches_forwarded += 1;
        core.counters.entries_forwarded += sent as u64;
    }

    /// Failed transmission: the queue is left as is.
    pub fn record_forward_failure(&self) {
        self.lock().counters.forward_failures += 1;
    }

    // ------------------------------------------------------------------
    // Battery and external controls
    // ------------------------------------------------------------------

    /// One decay tick. Returns the transition (if any) and the new state.
    pub fn battery_tick(&self, drain: f64) -> (Option<BatteryEvent>, BatteryState) {
        let mut core = self.lock();
        let event = core.battery.tick(drain);
        (event, core.battery)
    }

    pub fn battery(&self) -> BatteryState {
        self.lock().battery
    }

    pub fn mode(&self) -> OperatingMode {
        self.lock().battery.mode()
    }

    /// External command: change the return-to-base threshold.
    pub fn set_threshold(&self, threshold: f64) -> Result<BatteryState, ControlError> {
        let battery = {
            let mut core = self.lock();
            core.battery.set_threshold(threshold)?;
            core.battery
        };
        info!(threshold, "Battery threshold updated");
        Ok(battery)
    }

    /// External command: recharge to 100% and resume `Active`.
    pub fn reset_battery(&self) -> BatteryState {
        let battery = {
            let mut core = self.lock();
            core.battery.reset();
            core.battery
        };
        info!(level = battery.level(), "Battery reset, drone active");
        battery
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    pub fn counters(&self) -> DroneCounters {
        self.lock().counters.clone()
    }

    pub fn status(&self) -> DroneStatus {
        let core = self.lock();
        let (avg_temp, avg_humid) = core.window.current_average();
        let start = core.anomalies.len().saturating_sub(STATUS_RECENT_ANOMALIES);
        DroneStatus {
            name: self.name.clone(),
            battery_level: core.battery.level(),
            battery_threshold: core.battery.threshold(),
            mode: core.battery.mode(),
            window_len: core.window.len(),
            window_capacity: core.window.capacity(),
            avg_temp,
            avg_humid,
            queue_len: core.forward_queue.len(),
            anomaly_count: core.anomalies.len(),
            recent_anomalies: core.anomalies[start..].to_vec(),
            counters: core.counters.clone(),
        }
    }
}
