//! Sensor data acquisition
//!
//! Sensors connect over TCP and stream newline-delimited JSON readings.
//! [`framing`] turns a byte stream into records; [`listener`] owns the accept
//! loop and one task per sensor connection.

pub mod framing;
pub mod listener;

pub use framing::{FrameError, FrameEvent, JsonLineReader};
pub use listener::IngestionListener;
