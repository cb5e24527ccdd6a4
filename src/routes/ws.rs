// WebSocket relays of live sampler events

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::LiveEvent;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the live-stream connection count on drop (connect = +1, drop = -1).
struct WsConnectionGuard(Arc<AtomicUsize>);

impl Drop for WsConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

fn is_bandwidth(event: &LiveEvent) -> bool {
    matches!(event, LiveEvent::Bandwidth(_))
}

fn is_ping(event: &LiveEvent) -> bool {
    matches!(event, LiveEvent::Ping(_) | LiveEvent::PingAggregate(_))
}

pub(super) async fn ws_bandwidth(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    upgrade(ws, state, "bandwidth", is_bandwidth)
}

pub(super) async fn ws_ping(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    upgrade(ws, state, "ping", is_ping)
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    stream: &'static str,
    wanted: fn(&LiveEvent) -> bool,
) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no event emitted in between is missed.
    let rx = state.events.subscribe();
    let conn_count = state.ws_connections.clone();
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_events(socket, rx, conn_count, stream, wanted).await {
            tracing::info!(stream, error = %e, "live stream error");
        }
    })
}

async fn stream_events(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<LiveEvent>,
    conn_count: Arc<AtomicUsize>,
    stream: &'static str,
    wanted: fn(&LiveEvent) -> bool,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsConnectionGuard(conn_count);
    tracing::info!(stream, "Client connected to live stream");

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !wanted(&event) {
                            continue;
                        }
                        let json = serde_json::to_string(&event)?;
                        let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
                        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(stream, skipped = n, "WebSocket client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!(stream, "Client disconnected from live stream");
    Ok(())
}
