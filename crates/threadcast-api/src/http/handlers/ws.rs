//! WebSocket handler for real-time posting events.
//!
//! The `/ws/events` endpoint upgrades an HTTP connection to a WebSocket.
//! Once connected, the handler:
//!
//! - **Forwards events:** Subscribes to the orchestrator's event bus and
//!   pushes every [`PostingEvent`] to the client as a JSON text frame.
//! - **Receives commands:** Parses incoming text frames as [`WsCommand`]
//!   (`stop`, `status`, `ping`).
//! - **Heartbeat:** Sends a WebSocket ping every 30 seconds so idle
//!   connections between runs stay open through proxies.
//!
//! Disconnecting does **not** stop the active run.

use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use threadcast_types::event::PostingEvent;
use tokio::sync::broadcast;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed messages are logged and ignored.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Request a user stop of the active run.
    Stop,
    /// Ask for a status snapshot. Answered with `{"type":"status", ...}`.
    Status,
    /// Keep-alive. Answered with `{"type":"pong"}`.
    Ping,
}

/// Upgrade an HTTP request to a WebSocket connection for posting events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = state.orchestrator.events().subscribe();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately.
    heartbeat.tick().await;

    tracing::debug!("WebSocket client connected");

    loop {
        tokio::select! {
            event_result = event_rx.recv() => {
                match event_result {
                    Ok(event) => {
                        if send_event(&mut ws_sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WebSocket subscriber lagged, skipping {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = process_command(&text, &state).await {
                            if ws_sender.send(Message::Text(reply.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            _ = heartbeat.tick() => {
                if ws_sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("WebSocket connection closed");
}

async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &PostingEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await,
        Err(err) => {
            tracing::warn!("Failed to serialize PostingEvent: {err}");
            Ok(())
        }
    }
}

/// Handle one client command, returning the reply frame if any.
async fn process_command(text: &str, state: &AppState) -> Option<serde_json::Value> {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(raw = %text, error = %err, "Ignoring malformed WebSocket command");
            return None;
        }
    };

    match cmd {
        WsCommand::Stop => match state.orchestrator.stop().await {
            Ok(accepted) => {
                tracing::info!(run_id = %accepted.run_id, "stop requested via WebSocket");
                Some(json!({ "type": "stop_accepted", "run_id": accepted.run_id }))
            }
            Err(err) => Some(json!({ "type": "error", "code": "NO_ACTIVE_RUN", "message": err.to_string() })),
        },
        WsCommand::Status => {
            let snapshot = state.orchestrator.status().await;
            let mut reply = serde_json::to_value(snapshot).unwrap_or_else(|_| json!({}));
            if let Some(map) = reply.as_object_mut() {
                map.insert("type".to_string(), json!("status"));
            }
            Some(reply)
        }
        WsCommand::Ping => Some(json!({ "type": "pong" })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert!(matches!(
            serde_json::from_str::<WsCommand>(r#"{"type":"stop"}"#).unwrap(),
            WsCommand::Stop
        ));
        assert!(matches!(
            serde_json::from_str::<WsCommand>(r#"{"type":"ping"}"#).unwrap(),
            WsCommand::Ping
        ));
        assert!(serde_json::from_str::<WsCommand>(r#"{"type":"launch"}"#).is_err());
    }
}
