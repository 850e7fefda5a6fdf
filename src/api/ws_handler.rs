//! WebSocket handler for the chat relay
//!
//! Protocol:
//! - Client → Server: JSON frames with an `action` field used as the route
//!   (`{"action":"sendMessage","message":"..."}`). Frames without `action`, or
//!   that are not JSON, go to the `$default` route.
//! - Server → Client: `{"type":"chunk"|"done"|"error",..}` events
//!
//! Each connection gets a registry id, a writer task draining its outbound
//! channel (with a 30 s ping), and a reader loop that relays one message at a time.

use crate::relay::InboundTransportEvent;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Route for frames that carry no usable `action`
pub const DEFAULT_ROUTE: &str = "$default";

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler for `/ws`
pub async fn ws_relay(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_relay(socket, state))
}

/// Route key for one client frame
pub fn route_for_frame(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.get("action")
                .and_then(|a| a.as_str())
                .filter(|a| !a.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| DEFAULT_ROUTE.to_string())
}

fn lifecycle_event(route: &str, connection_id: &str) -> InboundTransportEvent {
    InboundTransportEvent {
        route: route.to_string(),
        connection_id: connection_id.to_string(),
        body: None,
    }
}

async fn handle_ws_relay(socket: WebSocket, state: AppState) {
    let (connection_id, mut outbound_rx) = state.registry.register();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    state
        .relay
        .dispatch(&lifecycle_event("$connect", &connection_id))
        .await;
    state.registry.mark_open(&connection_id);
    info!(connection_id = %connection_id, "Relay WebSocket connected");

    // ========================================================================
    // Writer: outbound events + keepalive pings
    // ========================================================================
    let writer_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = interval(PING_INTERVAL);
        ping_interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                payload = outbound_rx.recv() => {
                    match payload {
                        Some(payload) => {
                            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                                debug!(connection_id = %writer_id, "Send failed, client disconnected");
                                break;
                            }
                        }
                        // Unregistered: every sender is gone
                        None => break,
                    }
                }

                // Send periodic pings to detect dead clients
                _ = ping_interval.tick() => {
                    if ws_sender.send(Message::Ping(vec![].into())).await.is_err() {
                        debug!(connection_id = %writer_id, "Ping failed, client disconnected");
                        break;
                    }
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    // ========================================================================
    // Reader: one relay at a time, in arrival order
    // ========================================================================
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let text_str: &str = &text;
                let event = InboundTransportEvent {
                    route: route_for_frame(text_str),
                    connection_id: connection_id.clone(),
                    body: Some(text_str.to_string()),
                };
                state.relay.dispatch(&event).await;
            }
            Ok(Message::Close(_)) => {
                debug!(connection_id = %connection_id, "Relay WebSocket close frame");
                break;
            }
            Ok(_) => {
                // Ignore binary, ping, pong
            }
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "Relay WebSocket error");
                break;
            }
        }
    }

    state.registry.mark_closing(&connection_id);
    state
        .relay
        .dispatch(&lifecycle_event("$disconnect", &connection_id))
        .await;
    state.registry.unregister(&connection_id);
    let _ = writer.await;

    info!(connection_id = %connection_id, "Relay WebSocket connection closed");
}
