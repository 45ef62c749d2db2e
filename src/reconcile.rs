// History reconciliation: backend history + local minute records -> one fixed-shape frame.
// Pure function of its inputs; never fails. Backend data wins, local records fill gaps,
// anything else becomes nulls. Arrays are right-aligned so the newest value sits under
// the newest label.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{AggregateRecord, HistoryFrame};

/// Backend history in canonical names (`<metric>_avg`, `<metric>_peak`), as produced
/// by the fetch adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPayload {
    /// `None` when the backend supplied no label axis at all (local-only rendering);
    /// `Some(vec![])` is the backend's "no history yet".
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

impl HistoryPayload {
    pub fn with_labels(labels: Vec<String>) -> Self {
        Self {
            labels: Some(labels),
            series: BTreeMap::new(),
        }
    }

    pub fn series(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        self.series.insert(name.to_string(), values);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stat {
    Average,
    Peak,
}

fn split_series(name: &str) -> Option<(&str, Stat)> {
    if let Some(metric) = name.strip_suffix("_avg") {
        Some((metric, Stat::Average))
    } else {
        name.strip_suffix("_peak").map(|metric| (metric, Stat::Peak))
    }
}

fn stat_of(record: &AggregateRecord, stat: Stat) -> f64 {
    match stat {
        Stat::Average => record.average,
        Stat::Peak => record.peak,
    }
}

/// Right-aligns `values` to exactly `len`: left-pads short arrays with `None`,
/// keeps only the last `len` entries of long ones.
pub fn normalize_series(mut values: Vec<Option<f64>>, len: usize) -> Vec<Option<f64>> {
    if values.len() > len {
        values.drain(..values.len() - len);
        return values;
    }
    let mut out = vec![None; len - values.len()];
    out.extend(values);
    out
}

#[derive(Debug, Clone, Default)]
pub struct HistoryReconciler {
    expected: Vec<String>,
}

impl HistoryReconciler {
    pub fn new<I, S>(expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expected: expected.into_iter().map(Into::into).collect(),
        }
    }

    /// Expects `<metric>_avg` and `<metric>_peak` for every metric.
    pub fn for_metrics(metrics: &[String]) -> Self {
        Self::new(metrics.iter().flat_map(|m| {
            [
                AggregateRecord::avg_series(m),
                AggregateRecord::peak_series(m),
            ]
        }))
    }

    pub fn expected_series(&self) -> &[String] {
        &self.expected
    }

    /// Builds the display frame. Every series in the result has exactly `labels.len()`
    /// entries. `target_length` is the caller's display width: it is not applied here,
    /// callers cut the whole frame with `HistoryFrame::truncate_to`.
    pub fn reconcile(
        &self,
        payload: &HistoryPayload,
        local: &[AggregateRecord],
        target_length: usize,
    ) -> HistoryFrame {
        let mut names: BTreeSet<String> = self.expected.iter().cloned().collect();
        names.extend(payload.series.keys().cloned());

        let frame = match &payload.labels {
            Some(labels) => self.merge_backend(labels, &names, payload, local),
            None => {
                for record in local {
                    names.insert(AggregateRecord::avg_series(&record.metric));
                    names.insert(AggregateRecord::peak_series(&record.metric));
                }
                local_only(&names, local)
            }
        };

        if frame.labels.len() > target_length {
            debug!(
                labels = frame.labels.len(),
                target_length, "history frame wider than display target"
            );
        }
        frame
    }

    fn merge_backend(
        &self,
        labels: &[String],
        names: &BTreeSet<String>,
        payload: &HistoryPayload,
        local: &[AggregateRecord],
    ) -> HistoryFrame {
        let len = labels.len();
        if len == 0 {
            return HistoryFrame::default();
        }
        let series = names
            .iter()
            .map(|name| {
                let values = match payload.series.get(name) {
                    Some(backend) => backend.clone(),
                    None => derive_from_local(name, local).unwrap_or_default(),
                };
                (name.clone(), normalize_series(values, len))
            })
            .collect();
        HistoryFrame {
            labels: labels.to_vec(),
            series,
        }
    }
}

/// Values of `name` taken from local records of its metric, in arrival order.
/// `None` when the name is not an avg/peak series or the metric has no records.
fn derive_from_local(name: &str, local: &[AggregateRecord]) -> Option<Vec<Option<f64>>> {
    let (metric, stat) = split_series(name)?;
    let mut records: Vec<&AggregateRecord> = local.iter().filter(|r| r.metric == metric).collect();
    if records.is_empty() {
        return None;
    }
    records.sort_by_key(|r| r.bucket);
    Some(records.iter().map(|r| Some(stat_of(r, stat))).collect())
}

/// Frame built from local records only: one column per bucket, labelled by its minute key.
fn local_only(names: &BTreeSet<String>, local: &[AggregateRecord]) -> HistoryFrame {
    let mut buckets: Vec<(u64, &str)> = Vec::new();
    let mut by_bucket: BTreeMap<(u64, &str), &AggregateRecord> = BTreeMap::new();
    for record in local {
        if !buckets.iter().any(|(b, _)| *b == record.bucket) {
            buckets.push((record.bucket, &record.minute_key));
        }
        by_bucket.insert((record.bucket, &record.metric), record);
    }
    buckets.sort_by_key(|(b, _)| *b);

    let series = names
        .iter()
        .map(|name| {
            let values = match split_series(name) {
                Some((metric, stat)) => buckets
                    .iter()
                    .map(|(b, _)| by_bucket.get(&(*b, metric)).map(|r| stat_of(r, stat)))
                    .collect(),
                None => vec![None; buckets.len()],
            };
            (name.clone(), values)
        })
        .collect();

    HistoryFrame {
        labels: buckets.iter().map(|(_, key)| key.to_string()).collect(),
        series,
    }
}
