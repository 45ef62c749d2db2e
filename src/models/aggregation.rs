// Aggregated record: one row per metric per closed minute bucket.

use serde::{Deserialize, Serialize};

/// Average/peak summary emitted when a minute bucket closes. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub metric: String,
    pub minute_key: String,
    pub average: f64,
    pub peak: f64,
    /// Number of numeric samples in the bucket (nulls excluded).
    pub count: usize,
    /// Ordinal of the bucket that produced this record, in arrival order.
    pub bucket: u64,
    /// True when produced by a flush before the wall clock left the minute.
    #[serde(default)]
    pub partial: bool,
}

impl AggregateRecord {
    /// Series name for the average column, e.g. `temperature_avg`.
    pub fn avg_series(metric: &str) -> String {
        format!("{metric}_avg")
    }

    /// Series name for the peak column, e.g. `temperature_peak`.
    pub fn peak_series(metric: &str) -> String {
        format!("{metric}_peak")
    }
}
