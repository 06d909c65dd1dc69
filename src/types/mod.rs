//! Shared data model for the edge aggregator.
//!
//! Everything here is plain data: owned by [`DroneState`](crate::pipeline::DroneState)
//! inside the process, and only ever seen by sensors and the collector as
//! serialized copies.

mod batch;
mod reading;

pub use batch::{Batch, BatchEntry};
pub use reading::{Anomaly, AnomalyTag, Reading, Summary};

use serde::{Deserialize, Serialize};

/// Drone operating mode, driven by the battery simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Normal operation, batches are forwarded
    #[default]
    Active,
    /// Low battery; ingestion continues, forwarding is suppressed
    Returning,
}

impl OperatingMode {
    pub fn forwarding_allowed(self) -> bool {
        self == OperatingMode::Active
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::Active => write!(f, "Active"),
            OperatingMode::Returning => write!(f, "Returning to base"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_active() {
        assert_eq!(OperatingMode::default(), OperatingMode::Active);
        assert!(OperatingMode::Active.forwarding_allowed());
        assert!(!OperatingMode::Returning.forwarding_allowed());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(format!("{}", OperatingMode::Active), "Active");
        assert_eq!(format!("{}", OperatingMode::Returning), "Returning to base");
    }
}
