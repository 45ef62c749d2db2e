// Background dashboard worker: one task per activity, timer-driven.
// The task exclusively owns its Dashboard; everything else sees it through the
// published view (watch), the record stream (broadcast) and commands (mpsc).

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Duration, interval};
use tracing::instrument;

use crate::adapter;
use crate::dashboard::{Dashboard, DashboardSettings};
use crate::error::{ApiError, SourceError};
use crate::models::{AggregateRecord, DashboardView};
use crate::source::SensorSource;

const COMMAND_CHANNEL_CAPACITY: usize = 8;

pub enum Command {
    /// POST clear to the backend; on success drop local state and re-fetch history.
    ClearHistory {
        reply: oneshot::Sender<Result<(), SourceError>>,
    },
    /// Force-finalize the open minute now.
    Flush {
        reply: oneshot::Sender<Vec<AggregateRecord>>,
    },
}

/// Channels and shutdown for the worker.
pub struct WorkerDeps<S> {
    pub source: Arc<S>,
    pub view_tx: watch::Sender<DashboardView>,
    pub records_tx: broadcast::Sender<AggregateRecord>,
    pub commands_rx: mpsc::Receiver<Command>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Worker timing config.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    pub history_interval_secs: u64,
    pub dashboard: DashboardSettings,
}

/// What the HTTP layer holds for one dashboard.
#[derive(Clone)]
pub struct DashboardHandle {
    pub name: String,
    view_rx: watch::Receiver<DashboardView>,
    records_tx: broadcast::Sender<AggregateRecord>,
    commands_tx: mpsc::Sender<Command>,
}

impl DashboardHandle {
    pub fn view(&self) -> DashboardView {
        self.view_rx.borrow().clone()
    }

    /// Finalized minute records as they are produced.
    pub fn subscribe(&self) -> broadcast::Receiver<AggregateRecord> {
        self.records_tx.subscribe()
    }

    pub async fn clear_history(&self) -> Result<(), ApiError> {
        let (reply, rx) = oneshot::channel();
        self.commands_tx
            .send(Command::ClearHistory { reply })
            .await
            .map_err(|_| ApiError::WorkerGone)?;
        rx.await.map_err(|_| ApiError::WorkerGone)??;
        Ok(())
    }

    pub async fn flush(&self) -> Result<Vec<AggregateRecord>, ApiError> {
        let (reply, rx) = oneshot::channel();
        self.commands_tx
            .send(Command::Flush { reply })
            .await
            .map_err(|_| ApiError::WorkerGone)?;
        rx.await.map_err(|_| ApiError::WorkerGone)
    }
}

/// A spawned dashboard worker: its handle, its shutdown trigger and its task.
pub struct SpawnedDashboard {
    pub handle: DashboardHandle,
    pub shutdown_tx: oneshot::Sender<()>,
    pub join: tokio::task::JoinHandle<()>,
}

/// Wires channels and spawns the worker for one dashboard.
pub fn start<S: SensorSource>(
    source: Arc<S>,
    config: WorkerConfig,
    broadcast_capacity: usize,
) -> SpawnedDashboard {
    let name = config.dashboard.name.clone();
    let (view_tx, view_rx) = watch::channel(DashboardView {
        name: name.clone(),
        ..Default::default()
    });
    let (records_tx, _) = broadcast::channel(broadcast_capacity);
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let join = spawn(
        WorkerDeps {
            source,
            view_tx,
            records_tx: records_tx.clone(),
            commands_rx,
            shutdown_rx,
        },
        config,
    );

    SpawnedDashboard {
        handle: DashboardHandle {
            name,
            view_rx,
            records_tx,
            commands_tx,
        },
        shutdown_tx,
        join,
    }
}

pub fn spawn<S: SensorSource>(
    deps: WorkerDeps<S>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(deps, config).await;
    })
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn publish_records(records_tx: &broadcast::Sender<AggregateRecord>, records: Vec<AggregateRecord>) {
    for record in records {
        if records_tx.send(record).is_err() {
            tracing::trace!(operation = "publish_record", "no record subscribers");
        }
    }
}

#[instrument(skip_all, fields(dashboard = %config.dashboard.name, sample_interval_ms = config.sample_interval_ms))]
async fn run<S: SensorSource>(deps: WorkerDeps<S>, config: WorkerConfig) {
    let WorkerDeps {
        source,
        view_tx,
        records_tx,
        mut commands_rx,
        mut shutdown_rx,
    } = deps;

    let mut dashboard = Dashboard::new(config.dashboard);

    let mut sample_tick = interval(Duration::from_millis(config.sample_interval_ms));
    sample_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut history_tick = interval(Duration::from_secs(config.history_interval_secs));
    history_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = sample_tick.tick() => {
                let now = local_now();
                match source.fetch_reading().await {
                    Ok(body) => {
                        let records = dashboard.apply_reading_json(&body, now);
                        publish_records(&records_tx, records);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, operation = "fetch_reading", "sensor fetch failed");
                        dashboard.apply_fetch_error(&e);
                    }
                }
                let records = dashboard.tick(local_now());
                publish_records(&records_tx, records);
                view_tx.send_replace(dashboard.view());
            }
            _ = history_tick.tick() => {
                refresh_history(source.as_ref(), &mut dashboard).await;
                view_tx.send_replace(dashboard.view());
            }
            Some(command) = commands_rx.recv() => {
                match command {
                    Command::ClearHistory { reply } => {
                        let outcome = clear_history(source.as_ref(), &mut dashboard).await;
                        let _ = reply.send(outcome);
                    }
                    Command::Flush { reply } => {
                        let records = dashboard.flush(local_now());
                        publish_records(&records_tx, records.clone());
                        let _ = reply.send(records);
                    }
                }
                view_tx.send_replace(dashboard.view());
            }
            _ = &mut shutdown_rx => {
                let records = dashboard.flush(local_now());
                tracing::debug!(flushed = records.len(), "dashboard worker shutting down");
                publish_records(&records_tx, records);
                view_tx.send_replace(dashboard.view());
                break;
            }
        }
    }
}

async fn refresh_history<S: SensorSource>(source: &S, dashboard: &mut Dashboard) {
    match source.fetch_history().await {
        Ok(body) => dashboard.apply_history_json(&body),
        Err(e) => {
            tracing::warn!(error = %e, operation = "fetch_history", "history fetch failed; showing local aggregates");
            dashboard.apply_history_unavailable();
        }
    }
}

async fn clear_history<S: SensorSource>(
    source: &S,
    dashboard: &mut Dashboard,
) -> Result<(), SourceError> {
    let body = source.clear_history().await?;
    adapter::parse_clear_status(&body).map_err(SourceError::Rejected)?;
    dashboard.clear();
    tracing::info!(dashboard = %dashboard.name(), "historical data cleared");
    refresh_history(source, dashboard).await;
    Ok(())
}
