//! Built-in default values.
//!
//! Grouped by subsystem. `DroneConfig::default()` is built from these, and so
//! is a config file that omits a key.

// ============================================================================
// Drone
// ============================================================================

/// Drone name shown in logs and the status endpoint.
pub const DRONE_NAME: &str = "drone-01";

// ============================================================================
// Sensor Ingestion
// ============================================================================

/// Sensor listener bind address.
pub const LISTEN_ADDR: &str = "0.0.0.0:5000";

// ============================================================================
// Central Collector
// ============================================================================

/// Central collector address.
pub const COLLECTOR_ADDR: &str = "127.0.0.1:6000";

/// Bound on connect + write of one batch (seconds).
pub const COLLECTOR_TIMEOUT_SECS: f64 = 5.0;

// ============================================================================
// Timers
// ============================================================================

/// Shortest accepted tick, interval or timeout.
pub const MIN_PERIOD: std::time::Duration = std::time::Duration::from_millis(1);

/// Longest accepted tick, interval or timeout (one day, seconds).
pub const MAX_PERIOD_SECS: f64 = 86_400.0;

// ============================================================================
// Battery
// ============================================================================

/// Level at or below which the drone returns to base (percent).
pub const BATTERY_THRESHOLD: f64 = 20.0;

/// Level lost per decay tick (percent).
pub const BATTERY_DRAIN_PER_TICK: f64 = 0.5;

/// Decay tick period (seconds).
pub const BATTERY_TICK_SECS: f64 = 1.0;

// ============================================================================
// Forwarding
// ============================================================================

/// Forward interval (seconds).
pub const FORWARD_INTERVAL_SECS: f64 = 5.0;

/// Queue growth step that triggers a warning.
///
/// One summary per reading: 1 000 entries is a few minutes of a busy sensor
/// field with no successful forward.
pub const QUEUE_WARN_LEN: usize = 1_000;

// ============================================================================
// Aggregation
// ============================================================================

/// Rolling window capacity (readings).
pub const WINDOW_CAPACITY: usize = 10;

// ============================================================================
// Control API
// ============================================================================

/// HTTP control surface bind address.
pub const CONTROL_ADDR: &str = "127.0.0.1:8080";
