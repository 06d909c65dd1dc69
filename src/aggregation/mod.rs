//! Rolling Aggregator
//!
//! Fixed-capacity FIFO window over the most recent readings. Averages are
//! recomputed from the window contents on every call; nothing is cached.

use crate::types::{Reading, Summary};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Decimal places kept in forwarded summaries.
pub const SUMMARY_DECIMALS: i32 = 2;

/// Ordered, bounded window of the most recent readings (arrival order).
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl RollingWindow {
    /// Create an empty window.
    ///
    /// Capacity is validated at config load; a zero here is clamped to 1 so
    /// the window can never be forced to hold nothing.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, evicting and returning the oldest one when full.
    pub fn ingest(&mut self, reading: Reading) -> Option<Reading> {
        let evicted = if self.readings.len() >= self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(reading);
        evicted
    }

    /// Arithmetic mean `(temperature, humidity)` over the window.
    ///
    /// An empty window yields `(0.0, 0.0)`.
    pub fn current_average(&self) -> (f64, f64) {
        if self.readings.is_empty() {
            return (0.0, 0.0);
        }
        let count = self.readings.len() as f64;
        let (temp_sum, humid_sum) = self
            .readings
            .iter()
            .fold((0.0, 0.0), |(t, h), r| (t + r.temperature, h + r.humidity));
        (temp_sum / count, humid_sum / count)
    }

    /// Build the summary that gets queued for forwarding.
    pub fn summarize(&self, now: DateTime<Utc>) -> Summary {
        let (avg_temp, avg_humid) = self.current_average();
        Summary {
            avg_temp: round_to(avg_temp, SUMMARY_DECIMALS),
            avg_humid: round_to(avg_humid, SUMMARY_DECIMALS),
            last_update: now,
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Owned copy of the window, oldest first.
    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
