// WebSocket handlers: per-chart series streams and the fleet broadcast

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::matcher::{Selector, build_match_expression};
use crate::models::FleetUpdate;
use crate::prom_repo::MetricsSource;
use crate::scheduler::Scheduler;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a chart client may take to send its selector.
pub(super) const WS_SELECTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements ws_fleet connection count on drop (connect = +1, drop = -1).
struct WsFleetGuard(Arc<AtomicUsize>);

impl Drop for WsFleetGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

pub(super) async fn ws_chart<S: MetricsSource>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let scheduler = state.scheduler.clone();
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_chart(socket, scheduler).await {
            tracing::info!("Chart stream error: {}", e);
        }
    })
}

/// First text frame is the selector JSON; after that every merge is pushed as series JSON.
/// Leaving this function drops the subscription, which tears it down.
async fn stream_chart<S: MetricsSource>(
    socket: WebSocket,
    scheduler: Scheduler<S>,
) -> anyhow::Result<()> {
    let (mut sender, mut receiver) = socket.split();

    let selector: Selector = loop {
        match timeout(WS_SELECTOR_TIMEOUT, receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => break serde_json::from_str(text.as_str())?,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(Some(Ok(_))) => anyhow::bail!("expected a JSON selector as first message"),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => return Ok(()),
            Err(_) => anyhow::bail!("no selector received"),
        }
    };
    anyhow::ensure!(!selector.is_empty(), "empty selector");
    let match_expr = build_match_expression(&selector);
    tracing::info!(selector = %match_expr, "Client subscribed to chart stream");

    let subscription = scheduler.subscribe(selector);
    let mut updates = subscription.updates();
    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let series = updates.borrow_and_update().clone();
                let json = serde_json::to_string(series.as_ref())?;
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    subscription.teardown();
    tracing::info!(selector = %match_expr, "Chart stream closed");
    Ok(())
}

pub(super) async fn ws_fleet<S: MetricsSource>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let tx = state.fleet_tx.clone();
    let conn_count = state.ws_fleet_connections.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_fleet(socket, &mut rx, conn_count).await {
            tracing::info!("Fleet stream error: {}", e);
        }
    })
}

async fn stream_fleet(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<FleetUpdate>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsFleetGuard(conn_count);
    tracing::info!("Client connected to fleet stream");

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        let json = serde_json::to_string(&update)?;
                        let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
                        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/fleet client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
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
    Ok(())
}
