// Per-dashboard state tests: snapshot fetches feed the buffer and aggregator,
// history fetches merge with local records.

mod common;

use common::{settings, ts};
use sensordash::dashboard::Dashboard;
use sensordash::error::SourceError;
use sensordash::models::SensorReading;
use serde_json::json;

#[test]
fn test_reading_feeds_buffer_and_aggregator() {
    let mut dashboard = Dashboard::new(settings("act1", &["temperature", "humidity"]));
    dashboard.apply_reading_json(&json!({ "temperature": 21.0, "humidity": 40.0 }), ts(10, 0, 0));
    dashboard.apply_reading_json(&json!({ "temperature": 23.0, "humidity": null }), ts(10, 0, 5));

    let view = dashboard.view();
    assert!(view.connected);
    assert_eq!(view.updated_at, Some(ts(10, 0, 5)));
    assert_eq!(view.realtime.labels, vec!["10:00:00", "10:00:05"]);
    assert_eq!(view.realtime.series["humidity"], vec![Some(40.0), None]);

    let closed = dashboard.apply_reading_json(&json!({ "temperature": 25.0, "humidity": 42.0 }), ts(10, 1, 0));
    assert_eq!(closed.len(), 2);
    let temp = closed.iter().find(|r| r.metric == "temperature").unwrap();
    assert_eq!(temp.average, 22.0);
    assert_eq!(temp.peak, 23.0);
    assert_eq!(dashboard.view().records.len(), 2);
}

#[test]
fn test_sensor_error_pushes_blank_slot() {
    let mut dashboard = Dashboard::new(settings("act1", &["temperature", "humidity"]));
    dashboard.apply_reading_json(
        &json!({ "temperature": 0, "humidity": 0, "error": "Sensor read failed" }),
        ts(10, 0, 0),
    );
    let view = dashboard.view();
    assert!(view.connected);
    assert_eq!(view.realtime.labels.len(), 1);
    assert_eq!(view.realtime.series["temperature"], vec![None]);
    assert!(dashboard.flush(ts(10, 1, 0)).is_empty());
}

#[test]
fn test_fetch_error_marks_disconnected_without_pushing() {
    let mut dashboard = Dashboard::new(settings("act2", &["distance1"]));
    dashboard.apply_reading_json(&json!({ "distance1": 12.0 }), ts(10, 0, 0));
    dashboard.apply_fetch_error(&SourceError::Status(503));

    let view = dashboard.view();
    assert!(!view.connected);
    assert_eq!(view.last_error.as_deref(), Some("backend returned HTTP 503"));
    assert_eq!(dashboard.buffer().len(), 1);

    dashboard.apply_reading_json(&json!({ "distance1": 13.0 }), ts(10, 0, 2));
    let view = dashboard.view();
    assert!(view.connected);
    assert!(view.last_error.is_none());
}

#[test]
fn test_tick_closes_stalled_minute() {
    let mut dashboard = Dashboard::new(settings("act4", &["gas"]));
    dashboard.apply_reading_json(&json!({ "gas": "ON" }), ts(10, 0, 50));
    assert!(dashboard.tick(ts(10, 0, 55)).is_empty());
    let closed = dashboard.tick(ts(10, 1, 2));
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].average, 1.0);
    assert!(dashboard.aggregator().open_bucket().is_none());
}

#[test]
fn test_backend_history_merges_with_local_records() {
    let mut s = settings("act1", &["temperature", "humidity"]);
    s.history_aliases.insert("temperature".into(), vec!["temp".into()]);
    let mut dashboard = Dashboard::new(s);
    dashboard.apply_reading_json(&json!({ "temperature": 20.0, "humidity": 50.0 }), ts(10, 0, 0));
    dashboard.flush(ts(10, 1, 0));

    dashboard.apply_history_json(&json!({
        "times": ["09:59", "10:00"],
        "avg_temp": [19.0, 20.0],
        "peak_temp": [19.5, 20.0],
    }));
    let history = dashboard.view().history;
    assert_eq!(history.labels, vec!["09:59", "10:00"]);
    assert_eq!(history.series["temperature_avg"], vec![Some(19.0), Some(20.0)]);
    assert_eq!(history.series["humidity_avg"], vec![None, Some(50.0)]);
    assert_eq!(history.series["humidity_peak"], vec![None, Some(50.0)]);
}

#[test]
fn test_unavailable_history_shows_local_aggregates() {
    let mut dashboard = Dashboard::new(settings("act2", &["distance1", "distance2"]));
    dashboard.apply_reading_json(&json!({ "distance1": 10.0, "distance2": 30.0 }), ts(10, 0, 0));
    dashboard.apply_reading_json(&json!({ "distance1": 14.0, "distance2": 30.0 }), ts(10, 1, 0));
    dashboard.flush(ts(10, 2, 0));

    dashboard.apply_history_unavailable();
    let history = dashboard.view().history;
    assert_eq!(history.labels, vec!["10:00", "10:01"]);
    assert_eq!(history.series["distance1_avg"], vec![Some(10.0), Some(14.0)]);
    assert_eq!(history.series.len(), 4);
}

#[test]
fn test_history_is_capped_to_display_width() {
    let mut s = settings("act4", &["gas"]);
    s.max_history_points = 2;
    let mut dashboard = Dashboard::new(s);
    dashboard.apply_history_json(&json!({
        "labels": ["10:00", "10:01", "10:02"],
        "gas_avg": [1.0, 0.0, 1.0],
    }));
    let history = dashboard.view().history;
    assert_eq!(history.labels, vec!["10:01", "10:02"]);
    assert_eq!(history.series["gas_avg"], vec![Some(0.0), Some(1.0)]);
    assert_eq!(history.series["gas_peak"], vec![Some(0.0), Some(1.0)]);
}

#[test]
fn test_clear_drops_local_state() {
    let mut dashboard = Dashboard::new(settings("act1", &["temperature"]));
    dashboard.apply_reading_json(&json!({ "temperature": 20.0 }), ts(10, 0, 0));
    dashboard.flush(ts(10, 1, 0));
    dashboard.apply_history_unavailable();
    assert!(!dashboard.view().history.is_empty());

    dashboard.clear();
    let view = dashboard.view();
    assert!(view.realtime.labels.is_empty());
    assert!(view.records.is_empty());
    assert!(view.history.is_empty());
    assert_eq!(dashboard.name(), "act1");
}

#[test]
fn test_non_finite_reading_keeps_axis_aligned() {
    let mut dashboard = Dashboard::new(settings("act1", &["temperature", "humidity"]));
    let reading = SensorReading {
        values: [
            ("temperature".to_string(), Some(f64::NAN)),
            ("humidity".to_string(), Some(40.0)),
        ]
        .into_iter()
        .collect(),
        error: None,
    };
    dashboard.apply_reading(&reading, ts(10, 0, 0));

    let realtime = dashboard.view().realtime;
    assert_eq!(realtime.labels.len(), 1);
    assert_eq!(realtime.series["temperature"], vec![None]);
    assert_eq!(realtime.series["humidity"], vec![None]);

    let records = dashboard.flush(ts(10, 1, 0));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metric, "humidity");
}
