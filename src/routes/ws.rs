// WebSocket panel stream: current view on connect, then view / notice / refresh events

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::PanelEvent;
use crate::monitor::Panel;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_panel(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> Response {
    let Some(panel) = state.panels.get(&plugin_id).await else {
        return (
            axum::http::StatusCode::NOT_FOUND,
            format!("no panel mounted for {}", plugin_id),
        )
            .into_response();
    };
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_panel(socket, panel).await {
            tracing::info!(plugin_id = %plugin_id, "panel stream error: {}", e);
        }
    })
}

async fn stream_panel(socket: WebSocket, panel: Arc<Panel>) -> anyhow::Result<()> {
    let plugin_id = panel.handle.plugin_id().to_string();
    tracing::info!(plugin_id = %plugin_id, "client connected to panel stream");
    let (mut sender, mut receiver) = socket.split();
    let mut events = panel.events.subscribe();
    let mut views = panel.handle.subscribe();

    let welcome = PanelEvent::View(views.borrow_and_update().clone());
    let json = serde_json::to_string(&welcome)?;
    let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await;
    if r.is_err() || r.unwrap_or(Ok(())).is_err() {
        return Ok(());
    }

    let mut views_open = true;
    let mut ping_interval = tokio::time::interval_at(
        tokio::time::Instant::now() + WS_PING_INTERVAL,
        WS_PING_INTERVAL,
    );
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        let outgoing = tokio::select! {
            changed = views.changed(), if views_open => {
                match changed {
                    Ok(()) => {
                        let view = views.borrow_and_update().clone();
                        PanelEvent::View(view)
                    }
                    Err(_) => {
                        // Session ended; notices already queued may still arrive.
                        views_open = false;
                        continue;
                    }
                }
            }
            result = events.recv() => {
                match result {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(plugin_id = %plugin_id, "panel stream client lagged, skipped {} events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
                continue;
            }
        };
        let json = serde_json::to_string(&outgoing)?;
        let r = timeout(WS_SEND_TIMEOUT, sender.send(Message::Text(json.into()))).await;
        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
            break;
        }
    }
    tracing::info!(plugin_id = %plugin_id, "client left panel stream");
    Ok(())
}
