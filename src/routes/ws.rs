// ============================================================================
// WebSocket Session Route
// ============================================================================
//
// GET /ws?user_id=… upgrades the connection and registers a session for the
// user. Every event the engine fans out to that user is forwarded as a small
// JSON frame: {"type": "notify" | "friend_request" | …}. Delivery is
// best-effort; a closed socket just stops receiving.
//
// ============================================================================

use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    extract::{Extension, Query},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::notify::SessionRegistry;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Uuid,
}

/// GET /ws
pub async fn attach_session(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    Extension(sessions): Extension<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params.user_id, sessions))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, sessions: Arc<SessionRegistry>) {
    let (session_id, mut events) = sessions.attach(user_id).await;
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(kind) = event else { break };
                let frame = json!({ "type": kind }).to_string();
                if sink.send(WsMessage::Text(frame)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sink.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    // Clients only listen on this channel; inbound frames
                    // are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    sessions.detach(user_id, session_id).await;
    tracing::debug!(user_id = %user_id, session_id, "WebSocket session closed");
}
