//! Web UI entry point and static assets.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::fs;

use super::AppState;

const MISSING_UI: &str = "<!doctype html><title>LanShare</title>\
<p>The web UI is not installed. The API is available under <code>/api/</code>.</p>";

/// Serve `<ui_dir>/index.html`.
pub async fn index(State(state): State<AppState>) -> Response {
    let path = state.ui_dir.join("index.html");

    let body = match fs::read(&path).await {
        Ok(content) => Body::from(content),
        Err(e) => {
            tracing::warn!("Failed to read {:?}: {}", path, e);
            Body::from(MISSING_UI)
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}
