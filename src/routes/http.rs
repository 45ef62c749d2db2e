// GET/POST handlers: version, dashboard views, clear and flush

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::AppState;
use crate::error::ApiError;

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(super) async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboards.keys().cloned().collect::<Vec<_>>())
}

/// GET /api/{name}: full published view (connectivity, real-time, history, records).
pub(super) async fn view_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.dashboard(&name)?.view()))
}

pub(super) async fn realtime_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.dashboard(&name)?.view().realtime))
}

pub(super) async fn history_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.dashboard(&name)?.view().history))
}

pub(super) async fn records_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.dashboard(&name)?.view().records))
}

/// POST /api/{name}/clear: clears backend history, then local buffers and records.
pub(super) async fn clear_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.dashboard(&name)?.clear_history().await?;
    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Historical data cleared",
    })))
}

/// POST /api/{name}/flush: emits the current partial minute.
pub(super) async fn flush_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.dashboard(&name)?.flush().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "records": records,
    })))
}
