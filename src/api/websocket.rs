//! WebSocket support for live ledger updates
//!
//! Provides a broadcast channel for pushing receipts to connected clients.

use crate::core::Receipt;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant};

/// Maximum number of events to buffer per subscriber
const BROADCAST_CAPACITY: usize = 100;

/// Idle time after which a `Ping` is sent to the client
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket events that can be broadcast to clients
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    /// A call was sequenced (committed or reverted)
    Receipt { receipt: Receipt },
    /// Connection established
    Connected { message: String },
    /// Heartbeat sent every `HEARTBEAT_INTERVAL`
    Ping,
}

/// Broadcaster for WebSocket events
#[derive(Debug)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsEvent>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event: WsEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<crate::api::handlers::ApiState>,
) -> impl IntoResponse {
    let broadcaster = state.ws_broadcaster.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, broadcaster: Arc<WsBroadcaster>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the welcome so nothing sequenced after it is missed
    let rx = broadcaster.subscribe();

    let welcome = WsEvent::Connected {
        message: "Connected to ledger event feed".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    let mut send_task = tokio::spawn(forward_events(sender, rx, HEARTBEAT_INTERVAL));

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    log::debug!("Received text message: {}", text);
                }
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    log::info!("WebSocket connection closed");
}

/// Push broadcast events to `sink`, with a `Ping` whenever `heartbeat` passes
async fn forward_events<S>(mut sink: S, mut rx: broadcast::Receiver<WsEvent>, heartbeat: Duration)
where
    S: Sink<Message> + Unpin,
{
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);

    loop {
        let event = tokio::select! {
            received = rx.recv() => match received {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("WebSocket client lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => WsEvent::Ping,
        };

        if let Ok(json) = serde_json::to_string(&event) {
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }
}
