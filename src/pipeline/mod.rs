//! Shared drone state
//!
//! Ingestion, forwarding, the battery simulator and the control API all go
//! through [`DroneState`]; none of them own data of their own.

mod state;

pub use state::{
    DroneCounters, DroneState, DroneStatus, ForwardGate, IngestOutcome, StateSettings,
    STATUS_RECENT_ANOMALIES,
};
