// Fixed-capacity FIFO of real-time readings feeding the live chart.
// Slot-aligned across metrics: one slot per poll, every series advances together.

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::NaiveDateTime;

use crate::error::InvalidSampleError;
use crate::models::ChartFrame;

/// `hh:mm:ss AM` labels, as on the real-time charts.
pub const DEFAULT_LABEL_FORMAT: &str = "%I:%M:%S %p";

/// Rejects values that would poison chart arithmetic. `None` passes through.
pub fn ensure_finite(metric: &str, value: Option<f64>) -> Result<Option<f64>, InvalidSampleError> {
    match value {
        Some(v) if !v.is_finite() => Err(InvalidSampleError::NotFinite {
            metric: metric.to_string(),
            value: v,
        }),
        other => Ok(other),
    }
}

#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    label_format: String,
    timestamps: VecDeque<NaiveDateTime>,
    series: BTreeMap<String, VecDeque<Option<f64>>>,
    /// Metrics already written into the newest slot.
    written: HashSet<String>,
}

impl SampleBuffer {
    /// Creates an empty buffer holding at most `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self::with_label_format(capacity, DEFAULT_LABEL_FORMAT)
    }

    pub fn with_label_format(capacity: usize, label_format: &str) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            label_format: label_format.to_string(),
            timestamps: VecDeque::with_capacity(capacity + 1),
            series: BTreeMap::new(),
            written: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Appends one reading. A new slot opens when `timestamp` differs from the newest
    /// slot or when `metric` was already written into it; the oldest slot is evicted
    /// beyond capacity. `None` still occupies a slot so metrics stay aligned.
    pub fn push(
        &mut self,
        metric: &str,
        value: Option<f64>,
        timestamp: NaiveDateTime,
    ) -> Result<(), InvalidSampleError> {
        let value = ensure_finite(metric, value)?;
        if self.timestamps.back() != Some(&timestamp) || self.written.contains(metric) {
            self.open_slot(timestamp);
        }
        self.write(metric, value);
        Ok(())
    }

    /// Appends one slot for a metric group sampled together. Validates every value
    /// before touching the buffer, so a bad value leaves it unchanged.
    pub fn push_frame(
        &mut self,
        timestamp: NaiveDateTime,
        values: &[(&str, Option<f64>)],
    ) -> Result<(), InvalidSampleError> {
        let checked = values
            .iter()
            .map(|(metric, value)| ensure_finite(metric, *value).map(|v| (*metric, v)))
            .collect::<Result<Vec<_>, _>>()?;
        self.open_slot(timestamp);
        for (metric, value) in checked {
            self.write(metric, value);
        }
        Ok(())
    }

    /// Appends one slot holding `None` for every metric in `metrics`.
    pub fn push_blank(&mut self, timestamp: NaiveDateTime, metrics: &[&str]) {
        self.open_slot(timestamp);
        for metric in metrics {
            self.write(metric, None);
        }
    }

    /// Most recent value of `metric`, if its newest slot holds one.
    pub fn latest(&self, metric: &str) -> Option<f64> {
        self.series.get(metric).and_then(|v| v.back().copied().flatten())
    }

    /// Chart-ready copy; every series has exactly `labels.len()` entries.
    pub fn snapshot(&self) -> ChartFrame {
        ChartFrame {
            labels: self
                .timestamps
                .iter()
                .map(|ts| ts.format(&self.label_format).to_string())
                .collect(),
            series: self
                .series
                .iter()
                .map(|(metric, values)| (metric.clone(), values.iter().copied().collect()))
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.series.clear();
        self.written.clear();
    }

    fn open_slot(&mut self, timestamp: NaiveDateTime) {
        self.timestamps.push_back(timestamp);
        for values in self.series.values_mut() {
            values.push_back(None);
        }
        if self.timestamps.len() > self.capacity {
            self.timestamps.pop_front();
            for values in self.series.values_mut() {
                values.pop_front();
            }
        }
        self.written.clear();
    }

    fn write(&mut self, metric: &str, value: Option<f64>) {
        let slots = self.timestamps.len();
        let capacity = self.capacity;
        let values = self.series.entry(metric.to_string()).or_insert_with(|| {
            let mut padded = VecDeque::with_capacity(capacity + 1);
            padded.resize(slots, None);
            padded
        });
        if let Some(last) = values.back_mut() {
            *last = value;
        }
        self.written.insert(metric.to_string());
    }
}
