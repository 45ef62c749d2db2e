// Chart-ready frames: one label axis plus equally long series.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Real-time chart data. Every series has exactly `labels.len()` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartFrame {
    pub labels: Vec<String>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

/// Display-ready history. Every series has exactly `labels.len()` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFrame {
    pub labels: Vec<String>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

impl HistoryFrame {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Keeps only the most recent `max` columns, cutting labels and all series together.
    pub fn truncate_to(&mut self, max: usize) {
        let len = self.labels.len();
        if len <= max {
            return;
        }
        let cut = len - max;
        self.labels.drain(..cut);
        for values in self.series.values_mut() {
            let cut = values.len().saturating_sub(max);
            values.drain(..cut);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_most_recent_columns() {
        let mut frame = HistoryFrame {
            labels: vec!["a".into(), "b".into(), "c".into()],
            series: BTreeMap::from([("t_avg".to_string(), vec![Some(1.0), None, Some(3.0)])]),
        };
        frame.truncate_to(2);
        assert_eq!(frame.labels, vec!["b", "c"]);
        assert_eq!(frame.series["t_avg"], vec![None, Some(3.0)]);
    }

    #[test]
    fn truncate_wider_than_frame_is_noop() {
        let mut frame = HistoryFrame {
            labels: vec!["a".into()],
            series: BTreeMap::from([("t_avg".to_string(), vec![Some(1.0)])]),
        };
        frame.truncate_to(5);
        assert_eq!(frame.labels.len(), 1);
        assert_eq!(frame.series["t_avg"].len(), 1);
    }
}
