//! Anomaly Detector
//!
//! Per-reading sanity check against fixed physical bounds. Independent of the
//! rolling window: an anomalous reading is still aggregated.

use crate::types::{Anomaly, Reading};

/// Lowest plausible temperature (°C). Readings strictly below are anomalous.
pub const TEMPERATURE_MIN: f64 = -10.0;
/// Highest plausible temperature (°C). Readings strictly above are anomalous.
pub const TEMPERATURE_MAX: f64 = 60.0;
/// Relative humidity lower bound (%).
pub const HUMIDITY_MIN: f64 = 0.0;
/// Relative humidity upper bound (%).
pub const HUMIDITY_MAX: f64 = 100.0;

/// True when the reading lies outside the sanity bounds (bounds inclusive).
///
/// NaN never compares, so a NaN field is not flagged here; the JSON decoder
/// cannot produce one anyway.
pub fn is_anomalous(reading: &Reading) -> bool {
    reading.temperature < TEMPERATURE_MIN
        || reading.temperature > TEMPERATURE_MAX
        || reading.humidity < HUMIDITY_MIN
        || reading.humidity > HUMIDITY_MAX
}

/// Classify a reading, returning the annotated anomaly if it is out of bounds.
pub fn classify(reading: &Reading) -> Option<Anomaly> {
    is_anomalous(reading).then(|| Anomaly::new(reading.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(temperature: f64, humidity: f64) -> Reading {
        Reading {
            sensor_id: "sensor_7".to_string(),
            temperature,
            humidity,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_out_of_bounds_readings_are_anomalies() {
        assert!(classify(&reading(61.0, 50.0)).is_some());
        assert!(classify(&reading(20.0, -1.0)).is_some());
        assert!(classify(&reading(-10.5, 50.0)).is_some());
        assert!(classify(&reading(20.0, 100.1)).is_some());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(classify(&reading(60.0, 100.0)).is_none());
        assert!(classify(&reading(-10.0, 0.0)).is_none());
    }

    #[test]
    fn test_nominal_reading_is_not_anomalous() {
        assert!(classify(&reading(22.4, 47.9)).is_none());
    }

    #[test]
    fn test_anomaly_preserves_reading() {
        let r = reading(100.0, 50.0);
        let anomaly = classify(&r).unwrap();
        assert_eq!(anomaly.reading, r);
    }
}
