//! Clipboard socket channel at `/ws`.
//!
//! On connect the client receives the current clipboard; afterwards every
//! change is pushed as a `clipboard_update` frame. Frames from the client go
//! through the same write path as `POST /api/clipboard`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use protocol::{ClipboardUpdate, SocketMessage};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::clipboard::ClipboardSource;

/// Handle WebSocket upgrade request.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    // Subscribe before the snapshot so no change falls in between
    let mut updates = state.clipboard.broadcaster().subscribe();
    info!(conn_id = %conn_id, "Socket connected");

    let snapshot = ClipboardUpdate::new(state.clipboard.content());
    if send_update(&mut socket, snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    if send_update(&mut socket, update).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(conn_id = %conn_id, skipped = n, "Socket lagged, resending clipboard");
                    let snapshot = ClipboardUpdate::new(state.clipboard.content());
                    if send_update(&mut socket, snapshot).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => handle_frame(&state, conn_id, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "Socket receive failed");
                    break;
                }
            },
        }
    }

    info!(conn_id = %conn_id, "Socket disconnected");
}

async fn handle_frame(state: &AppState, conn_id: Uuid, text: &str) {
    let message = match SocketMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(conn_id = %conn_id, error = %e, "Ignoring malformed frame");
            return;
        }
    };

    match message {
        SocketMessage::ClipboardUpdate(update) => {
            let store = Arc::clone(&state.clipboard);
            let result = tokio::task::spawn_blocking(move || {
                store.set_content(update.text, ClipboardSource::Socket)
            })
            .await;
            if let Err(e) = result {
                warn!(conn_id = %conn_id, error = %e, "Clipboard update task failed");
            }
        }
    }
}

async fn send_update(socket: &mut WebSocket, update: ClipboardUpdate) -> Result<(), ()> {
    let frame = SocketMessage::ClipboardUpdate(update)
        .to_json()
        .map_err(|e| warn!(error = %e, "Failed to encode clipboard frame"))?;
    socket
        .send(Message::Text(frame))
        .await
        .map_err(|e| debug!(error = %e, "Socket send failed"))
}
