// Per-activity dashboard state: owns one buffer, one aggregator and the reconciler
// call-site. Synchronous; the worker drives it from its timers.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::adapter;
use crate::aggregator::{AggregatorConfig, MinuteAggregator};
use crate::buffer::SampleBuffer;
use crate::config::DashboardConfig;
use crate::error::SourceError;
use crate::models::{AggregateRecord, DashboardView, HistoryFrame, SensorReading};
use crate::reconcile::{HistoryPayload, HistoryReconciler};

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub name: String,
    pub metrics: Vec<String>,
    pub history_aliases: BTreeMap<String, Vec<String>>,
    pub buffer_capacity: usize,
    pub label_format: String,
    pub aggregator: AggregatorConfig,
    pub max_history_points: usize,
}

impl From<&DashboardConfig> for DashboardSettings {
    fn from(c: &DashboardConfig) -> Self {
        Self {
            name: c.name.clone(),
            metrics: c.metrics.clone(),
            history_aliases: c.history_aliases.clone(),
            buffer_capacity: c.buffer_capacity,
            label_format: c.label_format.clone(),
            aggregator: AggregatorConfig {
                minute_format: c.minute_format.clone(),
                record_capacity: c.record_capacity,
                round_decimals: Some(c.round_decimals),
            },
            max_history_points: c.max_history_points,
        }
    }
}

pub struct Dashboard {
    settings: DashboardSettings,
    buffer: SampleBuffer,
    aggregator: MinuteAggregator,
    reconciler: HistoryReconciler,
    history: HistoryFrame,
    connected: bool,
    last_error: Option<String>,
    updated_at: Option<NaiveDateTime>,
}

impl Dashboard {
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            buffer: SampleBuffer::with_label_format(
                settings.buffer_capacity,
                &settings.label_format,
            ),
            aggregator: MinuteAggregator::new(settings.aggregator.clone()),
            reconciler: HistoryReconciler::for_metrics(&settings.metrics),
            history: HistoryFrame::default(),
            connected: false,
            last_error: None,
            updated_at: None,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn aggregator(&self) -> &MinuteAggregator {
        &self.aggregator
    }

    /// Applies one successful snapshot fetch: one buffer slot for the group, one
    /// aggregator sample per metric. Returns the minute records this closed.
    pub fn apply_reading(
        &mut self,
        reading: &SensorReading,
        now: NaiveDateTime,
    ) -> Vec<AggregateRecord> {
        self.connected = true;
        self.last_error = None;
        self.updated_at = Some(now);
        if let Some(e) = &reading.error {
            debug!(dashboard = %self.settings.name, error = %e, "sensor reported read failure");
        }

        let samples = reading.samples(now);
        let frame: Vec<(&str, Option<f64>)> = samples
            .iter()
            .map(|s| (s.metric.as_str(), s.value))
            .collect();
        if let Err(e) = self.buffer.push_frame(now, &frame) {
            // Adapter output is finite; fall back to an empty slot to keep the axis aligned.
            warn!(dashboard = %self.settings.name, error = %e, "invalid sample");
            let metrics: Vec<&str> = frame.iter().map(|(metric, _)| *metric).collect();
            self.buffer.push_blank(now, &metrics);
        }

        let mut finalized = Vec::new();
        for sample in &samples {
            finalized.extend(
                self.aggregator
                    .record(&sample.metric, sample.value, sample.timestamp),
            );
        }
        finalized
    }

    /// Raw backend JSON variant of `apply_reading`.
    pub fn apply_reading_json(
        &mut self,
        body: &serde_json::Value,
        now: NaiveDateTime,
    ) -> Vec<AggregateRecord> {
        let reading = adapter::parse_reading(body, &self.settings.metrics);
        self.apply_reading(&reading, now)
    }

    /// A failed snapshot fetch: nothing is pushed, the view goes disconnected.
    pub fn apply_fetch_error(&mut self, error: &SourceError) {
        self.connected = false;
        self.last_error = Some(error.to_string());
    }

    /// Closes the open minute if the clock has left it.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<AggregateRecord> {
        self.aggregator.close_elapsed(now)
    }

    pub fn flush(&mut self, now: NaiveDateTime) -> Vec<AggregateRecord> {
        self.aggregator.flush(now)
    }

    /// Merges backend history with local records into the display frame.
    pub fn apply_history(&mut self, payload: &HistoryPayload) {
        let local = self.aggregator.all_records();
        let mut frame =
            self.reconciler
                .reconcile(payload, &local, self.settings.max_history_points);
        frame.truncate_to(self.settings.max_history_points);
        self.history = frame;
    }

    pub fn apply_history_json(&mut self, body: &serde_json::Value) {
        let payload = adapter::parse_history(
            body,
            &self.settings.metrics,
            &self.settings.history_aliases,
        );
        self.apply_history(&payload);
    }

    /// History could not be fetched: show local aggregates only.
    pub fn apply_history_unavailable(&mut self) {
        self.apply_history(&HistoryPayload::default());
    }

    /// Clears real-time and locally aggregated state after the backend confirmed a clear.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.aggregator.clear();
        self.history = HistoryFrame::default();
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            name: self.settings.name.clone(),
            connected: self.connected,
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
            realtime: self.buffer.snapshot(),
            history: self.history.clone(),
            records: self.aggregator.all_records(),
        }
    }
}
