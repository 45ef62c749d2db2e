use anyhow::Result;
use sensordash::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let mut handles = Vec::with_capacity(app_config.dashboards.len());
    let mut workers = Vec::with_capacity(app_config.dashboards.len());
    for dashboard in &app_config.dashboards {
        let source = Arc::new(
            source::HttpSource::new(dashboard)
                .map_err(|e| anyhow::anyhow!("dashboard {}: {}", dashboard.name, e))?,
        );
        let spawned = worker::start(
            source,
            worker::WorkerConfig {
                sample_interval_ms: dashboard.sample_interval_ms,
                history_interval_secs: dashboard.history_interval_secs,
                dashboard: dashboard.into(),
            },
            app_config.publishing.broadcast_capacity,
        );
        tracing::info!(
            dashboard = %dashboard.name,
            backend = %dashboard.base_url,
            metrics = ?dashboard.metrics,
            "dashboard worker started"
        );
        handles.push(spawned.handle);
        workers.push((spawned.shutdown_tx, spawned.join));
    }

    let app = routes::app(handles, app_config.publishing.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Received shutdown signal; flushing dashboards");
    let joins = workers.into_iter().map(|(shutdown_tx, join)| {
        let _ = shutdown_tx.send(());
        join
    });
    for result in futures_util::future::join_all(joins).await {
        if let Err(e) = result {
            tracing::warn!(error = %e, "dashboard worker ended abnormally");
        }
    }

    Ok(())
}
