//! WebSocket handler for live conversation updates
//!
//! Every `ConversationEvent` is forwarded as JSON. Clients may also submit
//! prompts over the socket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::conversation::spawn_submission;
use super::AppState;

/// Connection-level messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect
    Welcome { input_enabled: bool, entries: usize },
    /// A client message was rejected
    Error { message: String },
}

/// Messages sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a prompt
    Submit { text: String },
    /// Cancel the in-flight generation
    Cancel,
    /// Ping to keep connection alive
    Ping,
}

/// Handle WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, msg: &T) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {}", e);
            true
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Subscribe before the welcome so no event slips between them
    let mut events = state.controller.subscribe();

    info!("WebSocket connected");

    let welcome = ServerMessage::Welcome {
        input_enabled: state.controller.is_input_enabled(),
        entries: state.controller.entries().len(),
    };
    if !send_json(&mut socket, &welcome).await {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send_json(&mut socket, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("WebSocket client lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if let Some(reply) = handle_client_message(&state, msg) {
                                    if !send_json(&mut socket, &reply).await {
                                        break;
                                    }
                                }
                            }
                            Err(e) => debug!("Ignoring malformed client message: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket disconnected");
}

/// Handle a message from the client, returning a direct reply if any
fn handle_client_message(state: &AppState, msg: ClientMessage) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Submit { text } => match spawn_submission(&state.controller, &text) {
            // The entry reaches the client through the event stream
            Ok(_) => None,
            Err(e) => Some(ServerMessage::Error {
                message: e.to_string(),
            }),
        },
        ClientMessage::Cancel => {
            state.controller.cancel_pending();
            None
        }
        ClientMessage::Ping => None,
    }
}
