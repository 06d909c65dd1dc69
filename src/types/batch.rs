//! Forward-queue entries and the batch envelope sent to the collector.

use super::reading::{Anomaly, Summary};
use serde::{Deserialize, Serialize};

/// One entry of the forward queue.
///
/// Untagged on the wire: anomalies are recognised by their `"type"` field,
/// everything else must look like a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Anomaly(Anomaly),
    Summary(Summary),
}

impl BatchEntry {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, BatchEntry::Anomaly(_))
    }
}

impl From<Summary> for BatchEntry {
    fn from(summary: Summary) -> Self {
        BatchEntry::Summary(summary)
    }
}

impl From<Anomaly> for BatchEntry {
    fn from(anomaly: Anomaly) -> Self {
        BatchEntry::Anomaly(anomaly)
    }
}

/// `{"batch": [...]}`, written as a single newline-terminated line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Batch {
    pub batch: Vec<BatchEntry>,
}

impl Batch {
    pub fn new(entries: Vec<BatchEntry>) -> Self {
        Self { batch: entries }
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Number of (summaries, anomalies) carried by this batch.
    pub fn counts(&self) -> (usize, usize) {
        let anomalies = self.batch.iter().filter(|e| e.is_anomaly()).count();
        (self.batch.len() - anomalies, anomalies)
    }

    /// Encode as one wire line, including the trailing newline.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}
