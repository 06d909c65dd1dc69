//! drone-edge: edge telemetry aggregator
//!
//! Sensors stream JSON readings to the drone over TCP. The drone keeps a
//! rolling window of recent readings, flags out-of-bounds values, and
//! periodically forwards summaries and anomalies to a central collector
//! while its simulated battery allows.
//!
//! ## Architecture
//!
//! - **Acquisition**: sensor listener, one task per connection, newline-delimited JSON
//! - **Pipeline**: `DroneState`, the single lock-protected owner of all shared state
//! - **Aggregation / Anomaly**: rolling window averages and fixed sanity bounds
//! - **Battery**: decay loop driving the `Active -> Returning` mode switch
//! - **Forwarding**: timer-driven batch transmission gated by the mode
//! - **API**: HTTP status views and the threshold / reset commands

pub mod acquisition;
pub mod aggregation;
pub mod anomaly;
pub mod api;
pub mod battery;
pub mod collector;
pub mod config;
pub mod forwarding;
pub mod pipeline;
pub mod types;

pub use config::DroneConfig;
pub use pipeline::{DroneState, DroneStatus, StateSettings};
pub use types::{Anomaly, Batch, BatchEntry, OperatingMode, Reading, Summary};
