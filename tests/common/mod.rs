// Shared test helpers
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use sensordash::aggregator::AggregatorConfig;
use sensordash::dashboard::DashboardSettings;
use sensordash::error::SourceError;
use sensordash::source::SensorSource;
use sensordash::worker::WorkerConfig;
use serde_json::{Value, json};

/// 2024-05-01 at `h:m:s`, local wall clock.
pub fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn metrics(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn settings(name: &str, metric_names: &[&str]) -> DashboardSettings {
    DashboardSettings {
        name: name.to_string(),
        metrics: metrics(metric_names),
        history_aliases: BTreeMap::new(),
        buffer_capacity: 10,
        label_format: "%H:%M:%S".to_string(),
        aggregator: AggregatorConfig::default(),
        max_history_points: 1440,
    }
}

pub fn worker_config(settings: DashboardSettings) -> WorkerConfig {
    WorkerConfig {
        sample_interval_ms: 20,
        history_interval_secs: 60,
        dashboard: settings,
    }
}

/// Canned backend. `reading = None` makes every snapshot fetch fail.
pub struct FakeSource {
    pub reading: Mutex<Option<Value>>,
    pub history: Mutex<Option<Value>>,
    pub clear_response: Mutex<Value>,
    pub clear_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(reading: Value) -> Self {
        Self {
            reading: Mutex::new(Some(reading)),
            history: Mutex::new(Some(json!({ "labels": [] }))),
            clear_response: Mutex::new(json!({ "status": "success" })),
            clear_calls: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        let source = Self::new(Value::Null);
        *source.reading.lock().unwrap() = None;
        *source.history.lock().unwrap() = None;
        source
    }

    pub fn with_history(self, history: Value) -> Self {
        *self.history.lock().unwrap() = Some(history);
        self
    }

    pub fn with_clear_response(self, response: Value) -> Self {
        *self.clear_response.lock().unwrap() = response;
        self
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

impl SensorSource for FakeSource {
    async fn fetch_reading(&self) -> Result<Value, SourceError> {
        self.reading
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SourceError::Transport("connection refused".into()))
    }

    async fn fetch_history(&self) -> Result<Value, SourceError> {
        self.history
            .lock()
            .unwrap()
            .clone()
            .ok_or(SourceError::Status(500))
    }

    async fn clear_history(&self) -> Result<Value, SourceError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.clear_response.lock().unwrap().clone())
    }
}

/// Polls `check` every 10 ms until it holds or 3 s pass (tokio time, so paused
/// runtimes get there without waiting).
pub async fn wait_until<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    check()
}
