// Fetch-boundary normalization: every accepted backend spelling is mapped to one
// canonical shape here, so the buffer, aggregator and reconciler only ever see
// canonical names.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::warn;

use crate::buffer::ensure_finite;
use crate::error::InvalidSampleError;
use crate::models::{AggregateRecord, SensorReading};
use crate::reconcile::HistoryPayload;

const LABEL_KEYS: [&str; 3] = ["labels", "times", "timestamps"];

/// Looks `key` up at the top level, then under a `data` object.
fn lookup<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key)
        .or_else(|| body.get("data").and_then(|d| d.get(key)))
}

/// Dotted paths reach into nested objects (`accel.x`).
fn lookup_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    parts.try_fold(lookup(body, first)?, |v, part| v.get(part))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Accepted spellings of one stat for one backend stem, canonical first.
fn stat_keys(stem: &str, stat: &str) -> [String; 4] {
    [
        format!("{stem}_{stat}"),
        format!("{stat}_{stem}"),
        format!("{stat}{}", capitalize(stem)),
        format!("{stem}{}", capitalize(stat)),
    ]
}

/// Parses one JSON value as a reading. `null` is a failed read (never `0`); booleans
/// and ON/OFF strings are flags.
pub fn parse_value(metric: &str, value: &Value) -> Result<Option<f64>, InvalidSampleError> {
    let unparsable = || InvalidSampleError::Unparsable {
        metric: metric.to_string(),
        raw: value.to_string(),
    };
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::Number(n) => ensure_finite(metric, n.as_f64()),
        Value::String(s) => {
            let s = s.trim();
            match s.to_ascii_lowercase().as_str() {
                "on" | "true" => return Ok(Some(1.0)),
                "off" | "false" => return Ok(Some(0.0)),
                _ => {}
            }
            let parsed: f64 = s.parse().map_err(|_| unparsable())?;
            ensure_finite(metric, Some(parsed))
        }
        Value::Array(_) | Value::Object(_) => Err(unparsable()),
    }
}

fn parse_array(metric: &str, items: &[Value]) -> Vec<Option<f64>> {
    items
        .iter()
        .map(|item| parse_value(metric, item).unwrap_or(None))
        .collect()
}

/// Canonical real-time reading for `metrics`. Missing fields and values that fail to
/// parse become `None`; parse failures are logged.
pub fn parse_reading(body: &Value, metrics: &[String]) -> SensorReading {
    let error = match body.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    let values = metrics
        .iter()
        .map(|metric| {
            let value = match lookup_path(body, metric) {
                Some(v) => parse_value(metric, v).unwrap_or_else(|e| {
                    warn!(error = %e, operation = "parse_reading", "substituting null");
                    None
                }),
                None => None,
            };
            (metric.clone(), value)
        })
        .collect();

    SensorReading { values, error }
}

/// Canonical history payload. `aliases` maps a metric to the stems the backend uses
/// for it in history keys (e.g. `temperature` -> `temp`). A payload without any
/// label key is "no history yet". Legacy payloads that only carry averages get the
/// averages as peaks.
pub fn parse_history(
    body: &Value,
    metrics: &[String],
    aliases: &BTreeMap<String, Vec<String>>,
) -> HistoryPayload {
    let labels = LABEL_KEYS
        .iter()
        .find_map(|k| lookup(body, k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut series = BTreeMap::new();
    let mut consumed: BTreeSet<String> = BTreeSet::new();
    for metric in metrics {
        let mut stems = vec![metric.clone()];
        if let Some(extra) = aliases.get(metric) {
            stems.extend(extra.iter().cloned());
        }

        let find = |stat: &str, bare: bool| {
            stems.iter().find_map(|stem| {
                let keys = stat_keys(stem, stat);
                keys.iter()
                    .map(String::as_str)
                    .chain(bare.then_some(stem.as_str()))
                    .find_map(|k| {
                        lookup(body, k)
                            .and_then(Value::as_array)
                            .map(|items| (k.to_string(), items))
                    })
            })
        };

        let avg = find("avg", true).map(|(key, items)| {
            consumed.insert(key);
            parse_array(metric, items)
        });
        let peak = find("peak", false).map(|(key, items)| {
            consumed.insert(key);
            parse_array(metric, items)
        });
        let peak = peak.or_else(|| avg.clone());
        if let Some(avg) = avg {
            series.insert(AggregateRecord::avg_series(metric), avg);
        }
        if let Some(peak) = peak {
            series.insert(AggregateRecord::peak_series(metric), peak);
        }
    }

    // Canonical series the backend reports for metrics not configured here pass through.
    for obj in [Some(body), body.get("data")].into_iter().flatten() {
        let Some(map) = obj.as_object() else { continue };
        for (key, value) in map {
            if (key.ends_with("_avg") || key.ends_with("_peak"))
                && !series.contains_key(key)
                && !consumed.contains(key)
                && let Some(items) = value.as_array()
            {
                series.insert(key.clone(), parse_array(key, items));
            }
        }
    }

    HistoryPayload {
        labels: Some(labels),
        series,
    }
}

/// Outcome of a clear-history POST: `status` of `"success"` or `"ok"` means cleared.
pub fn parse_clear_status(body: &Value) -> Result<(), String> {
    match body.get("status").and_then(Value::as_str) {
        Some("success") | Some("ok") => Ok(()),
        _ => Err(body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string())),
    }
}
