// Error taxonomy. Only transport and API errors ever reach a caller as failures;
// malformed sensor data and history shapes degrade to placeholders instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// A reading that cannot enter a buffer or aggregate. Callers substitute `None`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidSampleError {
    #[error("metric {metric}: value is not a finite number ({value})")]
    NotFinite { metric: String, value: f64 },

    #[error("metric {metric}: cannot parse {raw:?} as a number")]
    Unparsable { metric: String, raw: String },
}

/// Fetch failures against the sensor backend.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend returned HTTP {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            SourceError::Status(status.as_u16())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown dashboard: {0}")]
    NotFound(String),

    #[error("sensor backend error: {0}")]
    Backend(#[from] SourceError),

    #[error("dashboard worker stopped")]
    WorkerGone,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(e) => {
                tracing::warn!(error = %e, "sensor backend error");
                StatusCode::BAD_GATEWAY
            }
            Self::WorkerGone => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
