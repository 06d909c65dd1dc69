//! Sensor readings and the values derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single sensor observation as received on the ingestion socket.
///
/// Wire shape (one JSON object per line):
/// `{"sensor_id": "...", "temperature": f, "humidity": f, "timestamp": "<ISO-8601>"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Sensor-side capture time, normalised to UTC
    pub timestamp: DateTime<Utc>,
}

/// Rolling-window aggregate scheduled for forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub avg_temp: f64,
    pub avg_humid: f64,
    pub last_update: DateTime<Utc>,
}

/// Marker serialised as `"type": "anomaly"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyTag {
    Anomaly,
}

/// A reading that violated the fixed sanity bounds.
///
/// Serialises as the reading's own fields plus `"type": "anomaly"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(flatten)]
    pub reading: Reading,
    #[serde(rename = "type")]
    pub tag: AnomalyTag,
}

impl Anomaly {
    pub fn new(reading: Reading) -> Self {
        Self {
            reading,
            tag: AnomalyTag::Anomaly,
        }
    }
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} temp={:.2} humid={:.2} at {}",
            self.reading.sensor_id,
            self.reading.temperature,
            self.reading.humidity,
            self.reading.timestamp.to_rfc3339()
        )
    }
}
