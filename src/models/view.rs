use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{AggregateRecord, ChartFrame, HistoryFrame};

/// Latest state of one dashboard as published by its worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub name: String,
    /// False after a failed snapshot fetch; drives the connectivity badge.
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Local wall-clock time of the last successful snapshot.
    pub updated_at: Option<NaiveDateTime>,
    pub realtime: ChartFrame,
    pub history: HistoryFrame,
    /// Retained minute records, arrival order.
    #[serde(default)]
    pub records: Vec<AggregateRecord>,
}
