// Minute bucketing: raw samples of any spacing -> one {average, peak} per metric per minute.
// Buckets are keyed by the formatted wall-clock minute; a key change closes the open bucket.
// A clock that jumps backward simply opens a new bucket under its own key, so records are
// ordered by arrival, not by key.

use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::buffer::ensure_finite;
use crate::models::AggregateRecord;

/// `HH:MM`, as on the per-minute history charts.
pub const DEFAULT_MINUTE_FORMAT: &str = "%H:%M";
pub const DEFAULT_RECORD_CAPACITY: usize = 10;
/// f64 carries about 15 significant decimal digits; more decimals round nothing.
pub const MAX_ROUND_DECIMALS: u32 = 15;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub minute_format: String,
    /// Records kept per metric; oldest evicted beyond this.
    pub record_capacity: usize,
    /// Round averages and peaks to this many decimals when set.
    pub round_decimals: Option<u32>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            minute_format: DEFAULT_MINUTE_FORMAT.to_string(),
            record_capacity: DEFAULT_RECORD_CAPACITY,
            round_decimals: None,
        }
    }
}

/// Raw samples of one wall-clock minute, per metric. Nulls are not stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteBucket {
    pub minute_key: String,
    pub samples: BTreeMap<String, Vec<f64>>,
    pub closed: bool,
    ordinal: u64,
}

impl MinuteBucket {
    fn new(minute_key: String, ordinal: u64) -> Self {
        Self {
            minute_key,
            samples: BTreeMap::new(),
            closed: false,
            ordinal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinuteAggregator {
    config: AggregatorConfig,
    open: Option<MinuteBucket>,
    next_ordinal: u64,
    records: BTreeMap<String, VecDeque<AggregateRecord>>,
}

impl Default for MinuteAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

impl MinuteAggregator {
    pub fn new(mut config: AggregatorConfig) -> Self {
        config.record_capacity = config.record_capacity.max(1);
        Self {
            config,
            open: None,
            next_ordinal: 0,
            records: BTreeMap::new(),
        }
    }

    pub fn minute_key(&self, timestamp: NaiveDateTime) -> String {
        timestamp.format(&self.config.minute_format).to_string()
    }

    /// Routes one sample into its minute bucket. If the sample belongs to a different
    /// minute than the open bucket, that bucket is finalized first; the records it
    /// produced are returned. Null and non-finite values open buckets but are not
    /// aggregated.
    pub fn record(
        &mut self,
        metric: &str,
        value: Option<f64>,
        timestamp: NaiveDateTime,
    ) -> Vec<AggregateRecord> {
        let key = self.minute_key(timestamp);
        let value = ensure_finite(metric, value).unwrap_or_else(|e| {
            warn!(error = %e, "dropping sample from aggregation");
            None
        });

        let finalized = if self.is_other_minute(&key) {
            self.finalize(false)
        } else {
            Vec::new()
        };

        if self.open.is_none() {
            self.open = Some(MinuteBucket::new(key, self.next_ordinal));
            self.next_ordinal += 1;
        }
        let Some(bucket) = self.open.as_mut() else {
            return finalized;
        };
        let samples = bucket.samples.entry(metric.to_string()).or_default();
        if let Some(v) = value {
            samples.push(v);
        }
        finalized
    }

    /// Finalizes the open bucket only when `now` has left its minute. Lets a poller close
    /// a minute even when the sensor stalls and no new sample arrives.
    pub fn close_elapsed(&mut self, now: NaiveDateTime) -> Vec<AggregateRecord> {
        let key = self.minute_key(now);
        if self.is_other_minute(&key) {
            self.finalize(false)
        } else {
            Vec::new()
        }
    }

    /// Force-finalizes the open bucket. Records are marked partial when `now` is still
    /// inside that minute. No-op without an open bucket.
    pub fn flush(&mut self, now: NaiveDateTime) -> Vec<AggregateRecord> {
        let key = self.minute_key(now);
        let partial = self.open.as_ref().is_some_and(|b| b.minute_key == key);
        self.finalize(partial)
    }

    pub fn open_bucket(&self) -> Option<&MinuteBucket> {
        self.open.as_ref()
    }

    /// Retained records of one metric, oldest first.
    pub fn records(&self, metric: &str) -> impl Iterator<Item = &AggregateRecord> {
        self.records.get(metric).into_iter().flatten()
    }

    /// Retained records of all metrics in arrival order (by bucket, then metric name).
    pub fn all_records(&self) -> Vec<AggregateRecord> {
        let mut out: Vec<AggregateRecord> = self.records.values().flatten().cloned().collect();
        out.sort_by_key(|r| r.bucket);
        out
    }

    /// Drops retained records and any open bucket.
    pub fn clear(&mut self) {
        self.records.clear();
        self.open = None;
    }

    fn is_other_minute(&self, key: &str) -> bool {
        self.open.as_ref().is_some_and(|b| b.minute_key != key)
    }

    fn finalize(&mut self, partial: bool) -> Vec<AggregateRecord> {
        let Some(mut bucket) = self.open.take() else {
            return Vec::new();
        };
        bucket.closed = true;

        let mut emitted = Vec::with_capacity(bucket.samples.len());
        for (metric, samples) in &bucket.samples {
            let Some((average, peak)) = aggregate_samples(samples) else {
                continue;
            };
            let record = AggregateRecord {
                metric: metric.clone(),
                minute_key: bucket.minute_key.clone(),
                average: round_to(average, self.config.round_decimals),
                peak: round_to(peak, self.config.round_decimals),
                count: samples.len(),
                bucket: bucket.ordinal,
                partial,
            };
            let kept = self.records.entry(metric.clone()).or_default();
            kept.push_back(record.clone());
            while kept.len() > self.config.record_capacity {
                kept.pop_front();
            }
            emitted.push(record);
        }

        debug!(
            minute_key = %bucket.minute_key,
            records = emitted.len(),
            partial,
            "minute bucket finalized"
        );
        emitted
    }
}

/// Average and peak of one bucket's samples; `None` for an empty bucket (never NaN).
pub fn aggregate_samples(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let sum = samples.iter().sum::<f64>();
    let average = if sum.is_finite() {
        sum / n
    } else {
        // Finite samples near f64::MAX overflow the plain sum.
        samples.iter().map(|v| v / n).sum()
    };
    let peak = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((average, peak))
}

fn round_to(value: f64, decimals: Option<u32>) -> f64 {
    let Some(d) = decimals else {
        return value;
    };
    let factor = 10f64.powi(d.min(MAX_ROUND_DECIMALS) as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
