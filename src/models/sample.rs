use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One scalar reading of one metric. `value = None` is a failed sensor read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub metric: String,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, metric: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            timestamp,
            metric: metric.into(),
            value,
        }
    }
}

/// Canonical real-time snapshot of one metric group, as produced by the fetch adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub values: BTreeMap<String, Option<f64>>,
    /// Set when the backend reported a read failure for the whole group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SensorReading {
    /// Samples for every metric at `timestamp`; all `None` when the group errored.
    pub fn samples(&self, timestamp: NaiveDateTime) -> Vec<Sample> {
        self.values
            .iter()
            .map(|(metric, value)| {
                let value = if self.error.is_some() { None } else { *value };
                Sample::new(timestamp, metric.clone(), value)
            })
            .collect()
    }
}
