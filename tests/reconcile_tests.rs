// History reconciliation tests

mod common;

use common::{metrics, ts};
use sensordash::aggregator::MinuteAggregator;
use sensordash::models::AggregateRecord;
use sensordash::reconcile::{HistoryPayload, HistoryReconciler, normalize_series};

fn labels(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|s| s.to_string()).collect()
}

fn record(metric: &str, minute_key: &str, average: f64, peak: f64, bucket: u64) -> AggregateRecord {
    AggregateRecord {
        metric: metric.to_string(),
        minute_key: minute_key.to_string(),
        average,
        peak,
        count: 1,
        bucket,
        partial: false,
    }
}

#[test]
fn test_short_series_is_left_padded() {
    let reconciler = HistoryReconciler::new(["temperature_avg"]);
    let payload = HistoryPayload::with_labels(labels(&["10:00", "10:01", "10:02"]))
        .series("temperature_avg", vec![Some(5.0)]);
    let frame = reconciler.reconcile(&payload, &[], 3);
    assert_eq!(frame.series["temperature_avg"], vec![None, None, Some(5.0)]);
}

#[test]
fn test_long_series_keeps_newest_values() {
    let reconciler = HistoryReconciler::new(["temperature_avg"]);
    let payload = HistoryPayload::with_labels(labels(&["10:03", "10:04", "10:05"])).series(
        "temperature_avg",
        vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
    );
    let frame = reconciler.reconcile(&payload, &[], 3);
    assert_eq!(
        frame.series["temperature_avg"],
        vec![Some(3.0), Some(4.0), Some(5.0)]
    );
}

#[test]
fn test_empty_labels_give_empty_frame() {
    let reconciler = HistoryReconciler::for_metrics(&metrics(&["temperature"]));
    let frame = reconciler.reconcile(&HistoryPayload::with_labels(vec![]), &[], 5);
    assert!(frame.labels.is_empty());
    assert!(frame.series.is_empty());
    assert!(frame.is_empty());
}

#[test]
fn test_expected_series_missing_everywhere_are_nulls() {
    let reconciler = HistoryReconciler::for_metrics(&metrics(&["distance1", "distance2"]));
    assert_eq!(reconciler.expected_series().len(), 4);
    let payload = HistoryPayload::with_labels(labels(&["10:00", "10:01"]))
        .series("distance1_avg", vec![Some(10.0), Some(11.0)]);
    let frame = reconciler.reconcile(&payload, &[], 60);
    assert_eq!(frame.series.len(), 4);
    assert_eq!(frame.series["distance2_peak"], vec![None, None]);
    assert_eq!(frame.series["distance1_avg"], vec![Some(10.0), Some(11.0)]);
    for values in frame.series.values() {
        assert_eq!(values.len(), frame.labels.len());
    }
}

#[test]
fn test_backend_wins_and_local_fills_gaps() {
    let reconciler = HistoryReconciler::for_metrics(&metrics(&["temperature"]));
    let local = vec![
        record("temperature", "10:01", 20.0, 21.0, 0),
        record("temperature", "10:02", 22.0, 23.0, 1),
    ];
    let payload = HistoryPayload::with_labels(labels(&["10:00", "10:01", "10:02"]))
        .series("temperature_avg", vec![Some(19.0), Some(20.5), Some(22.5)]);
    let frame = reconciler.reconcile(&payload, &local, 60);
    assert_eq!(
        frame.series["temperature_avg"],
        vec![Some(19.0), Some(20.5), Some(22.5)]
    );
    assert_eq!(
        frame.series["temperature_peak"],
        vec![None, Some(21.0), Some(23.0)]
    );
}

#[test]
fn test_unexpected_backend_series_are_carried() {
    let reconciler = HistoryReconciler::for_metrics(&metrics(&["temperature"]));
    let payload = HistoryPayload::with_labels(labels(&["10:00", "10:01"]))
        .series("pressure_avg", vec![Some(1013.0)]);
    let frame = reconciler.reconcile(&payload, &[], 60);
    assert_eq!(frame.series["pressure_avg"], vec![None, Some(1013.0)]);
    assert_eq!(frame.series.len(), 3);
}

#[test]
fn test_round_trip_of_local_records_without_backend() {
    let mut agg = MinuteAggregator::default();
    for (m, v) in [(0, 10.0), (1, 20.0), (2, 30.0)] {
        agg.record("temperature", Some(v), ts(10, m, 0));
        agg.record("temperature", Some(v + 2.0), ts(10, m, 30));
        agg.record("humidity", Some(v * 2.0), ts(10, m, 30));
    }
    agg.flush(ts(10, 3, 0));

    let reconciler = HistoryReconciler::for_metrics(&metrics(&["temperature", "humidity"]));
    let frame = reconciler.reconcile(&HistoryPayload::default(), &agg.all_records(), 60);
    assert_eq!(frame.labels, labels(&["10:00", "10:01", "10:02"]));
    assert_eq!(
        frame.series["temperature_avg"],
        vec![Some(11.0), Some(21.0), Some(31.0)]
    );
    assert_eq!(
        frame.series["temperature_peak"],
        vec![Some(12.0), Some(22.0), Some(32.0)]
    );
    assert_eq!(
        frame.series["humidity_peak"],
        vec![Some(20.0), Some(40.0), Some(60.0)]
    );
}

#[test]
fn test_local_only_leaves_holes_for_missing_metrics() {
    let reconciler = HistoryReconciler::for_metrics(&metrics(&["gas", "vibration"]));
    let local = vec![
        record("gas", "10:00", 1.0, 1.0, 0),
        record("vibration", "10:00", 0.5, 1.0, 0),
        record("gas", "10:01", 0.0, 0.0, 1),
    ];
    let frame = reconciler.reconcile(&HistoryPayload::default(), &local, 60);
    assert_eq!(frame.labels, labels(&["10:00", "10:01"]));
    assert_eq!(frame.series["vibration_avg"], vec![Some(0.5), None]);
    assert_eq!(frame.series["gas_avg"], vec![Some(1.0), Some(0.0)]);
}

#[test]
fn test_reconcile_is_deterministic() {
    let reconciler = HistoryReconciler::for_metrics(&metrics(&["temperature", "humidity"]));
    let local = vec![record("humidity", "10:00", 40.0, 41.0, 0)];
    let payload = HistoryPayload::with_labels(labels(&["10:00"]))
        .series("temperature_avg", vec![Some(20.0), Some(21.0)]);
    let a = reconciler.reconcile(&payload, &local, 60);
    let b = reconciler.reconcile(&payload, &local, 60);
    assert_eq!(a, b);
}

#[test]
fn test_target_length_is_left_to_caller() {
    let reconciler = HistoryReconciler::new(["t_avg"]);
    let payload = HistoryPayload::with_labels(labels(&["a", "b", "c", "d"]))
        .series("t_avg", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    let mut frame = reconciler.reconcile(&payload, &[], 2);
    assert_eq!(frame.labels.len(), 4);
    frame.truncate_to(2);
    assert_eq!(frame.labels, labels(&["c", "d"]));
    assert_eq!(frame.series["t_avg"], vec![Some(3.0), Some(4.0)]);
}

#[test]
fn test_normalize_series() {
    assert_eq!(normalize_series(vec![], 2), vec![None, None]);
    assert!(normalize_series(vec![Some(1.0), Some(2.0)], 0).is_empty());
    assert_eq!(normalize_series(vec![Some(1.0)], 1), vec![Some(1.0)]);
}
