// Sensor backend access. Returns raw JSON; the adapter turns it into canonical shapes.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::instrument;

use crate::config::DashboardConfig;
use crate::error::SourceError;

/// Data source for one dashboard: real-time snapshot, history and clear-history.
pub trait SensorSource: Send + Sync + 'static {
    fn fetch_reading(&self) -> impl Future<Output = Result<Value, SourceError>> + Send;

    fn fetch_history(&self) -> impl Future<Output = Result<Value, SourceError>> + Send;

    fn clear_history(&self) -> impl Future<Output = Result<Value, SourceError>> + Send;
}

/// JSON-over-HTTP backend (`GET snapshot`, `GET history`, `POST clear`).
pub struct HttpSource {
    client: Client,
    snapshot_url: String,
    history_url: String,
    clear_url: String,
}

impl HttpSource {
    pub fn new(config: &DashboardConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SourceError::Transport(format!("http client: {e}")))?;
        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            snapshot_url: format!("{base}{}", config.snapshot_path),
            history_url: format!("{base}{}", config.history_path),
            clear_url: format!("{base}{}", config.clear_path),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

impl SensorSource for HttpSource {
    #[instrument(skip(self), fields(source = "http", operation = "fetch_reading", url = %self.snapshot_url))]
    async fn fetch_reading(&self) -> Result<Value, SourceError> {
        self.send(self.client.get(&self.snapshot_url)).await
    }

    #[instrument(skip(self), fields(source = "http", operation = "fetch_history", url = %self.history_url))]
    async fn fetch_history(&self) -> Result<Value, SourceError> {
        self.send(self.client.get(&self.history_url)).await
    }

    #[instrument(skip(self), fields(source = "http", operation = "clear_history", url = %self.clear_url))]
    async fn clear_history(&self) -> Result<Value, SourceError> {
        self.send(
            self.client
                .post(&self.clear_url)
                .header(reqwest::header::CONTENT_TYPE, "application/json"),
        )
        .await
    }
}
