// WebSocket record stream: one JSON text message per finalized minute record.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::error::ApiError;
use crate::models::AggregateRecord;

pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_records(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state.dashboard(&name)?.clone();
    let ping_every = Duration::from_secs(state.publishing.ws_ping_interval_secs);
    Ok(ws.on_upgrade(move |socket| async move {
        let mut rx = handle.subscribe();
        if let Err(e) = stream_records(socket, &mut rx, &handle.name, ping_every).await {
            tracing::info!(dashboard = %handle.name, "record stream error: {}", e);
        }
    }))
}

/// Sends `msg`; false when the client is gone or too slow.
async fn send_or_close(socket: &mut WebSocket, msg: Message) -> bool {
    matches!(timeout(WS_SEND_TIMEOUT, socket.send(msg)).await, Ok(Ok(())))
}

async fn stream_records(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<AggregateRecord>,
    name: &str,
    ping_every: Duration,
) -> anyhow::Result<()> {
    tracing::info!(dashboard = %name, "client connected to record stream");

    let mut ping_interval = tokio::time::interval(ping_every);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(record) => {
                        let json = serde_json::to_string(&record)?;
                        if !send_or_close(&mut socket, Message::Text(json.into())).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dashboard = %name, "record stream client lagged, skipped {} records", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                if !send_or_close(&mut socket, Message::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    Ok(())
}
