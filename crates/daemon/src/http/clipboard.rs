//! Clipboard REST routes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use protocol::{ClipboardContent, MessageBody};

use super::error::ApiError;
use super::AppState;
use crate::clipboard::ClipboardSource;

/// `GET /api/clipboard`.
pub async fn get_clipboard(State(state): State<AppState>) -> Json<ClipboardContent> {
    Json(ClipboardContent {
        content: state.clipboard.content(),
    })
}

/// `POST /api/clipboard` with `{"content": "..."}`.
pub async fn set_clipboard(
    State(state): State<AppState>,
    payload: Result<Json<ClipboardContent>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let Json(body) =
        payload.map_err(|e| ApiError::invalid(format!("Invalid JSON body: {}", e.body_text())))?;

    let store = Arc::clone(&state.clipboard);
    tokio::task::spawn_blocking(move || store.set_content(body.content, ClipboardSource::Http))
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(MessageBody::new("Clipboard updated")))
}
