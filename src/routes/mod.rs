// HTTP + WebSocket routes

mod http;
mod ws;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::PublishingConfig;
use crate::error::ApiError;
use crate::worker::DashboardHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dashboards: Arc<BTreeMap<String, DashboardHandle>>,
    pub(crate) publishing: PublishingConfig,
}

impl AppState {
    pub(crate) fn dashboard(&self, name: &str) -> Result<&DashboardHandle, ApiError> {
        self.dashboards
            .get(name)
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }
}

pub fn app(dashboards: Vec<DashboardHandle>, publishing: PublishingConfig) -> Router {
    let state = AppState {
        dashboards: Arc::new(
            dashboards
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        ),
        publishing,
    };
    Router::new()
        .route("/", get(|| async { "sensordash: sensor dashboards" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/dashboards", get(http::list_handler)) // GET /api/dashboards
        .route("/api/{name}", get(http::view_handler)) // GET /api/{name}
        .route("/api/{name}/realtime", get(http::realtime_handler)) // GET /api/{name}/realtime
        .route("/api/{name}/history", get(http::history_handler)) // GET /api/{name}/history
        .route("/api/{name}/records", get(http::records_handler)) // GET /api/{name}/records
        .route("/api/{name}/clear", post(http::clear_handler)) // POST /api/{name}/clear
        .route("/api/{name}/flush", post(http::flush_handler)) // POST /api/{name}/flush
        .route("/ws/{name}", get(ws::ws_records)) // WS /ws/{name}
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
