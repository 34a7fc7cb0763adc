//! HTTP and WebSocket surface.
//!
//! | Method   | Path                    | Handler                        |
//! |----------|-------------------------|--------------------------------|
//! | GET      | `/`                     | [`assets::index`]              |
//! | GET      | `/api/files[/path]`     | [`files::list_dir`]            |
//! | GET      | `/api/download/*path`   | [`files::download`]            |
//! | GET      | `/api/view/*path`       | [`files::view`]                |
//! | POST     | `/api/upload`           | [`files::upload`]              |
//! | GET/POST | `/api/clipboard`        | [`clipboard`]                  |
//! | GET      | `/api/server-info`      | [`info::server_info`]          |
//! | GET      | `/ws`                   | [`socket::ws_handler`]         |
//! | GET      | `/static/*file`         | `<ui_dir>/static`              |
//!
//! Every route except `/static/*`, `/ws` and `/api/server-info` requires
//! `?token=<access token>`.

pub mod assets;
pub mod clipboard;
pub mod error;
pub mod files;
pub mod info;
pub mod socket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::AuthToken;
use crate::clipboard::ClipboardStore;
use crate::files::{ArchiveBuilder, ChunkedTransfer, DirectoryLister, PathGuard};

pub use error::ApiError;

/// Paths reachable without a token.
const PUBLIC_PREFIXES: &[&str] = &["/static/"];
const PUBLIC_PATHS: &[&str] = &["/ws", "/api/server-info"];

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub token: AuthToken,
    pub guard: Arc<PathGuard>,
    pub lister: Arc<DirectoryLister>,
    pub transfer: Arc<ChunkedTransfer>,
    pub archives: Arc<ArchiveBuilder>,
    pub clipboard: Arc<ClipboardStore>,
    pub ui_dir: PathBuf,
    /// Port the server is reachable on, for the access URLs.
    pub port: u16,
    pub max_upload_size: u64,
    /// Cancelled at shutdown; ends open sockets.
    pub shutdown: CancellationToken,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_upload_size).unwrap_or(usize::MAX);
    let static_dir = state.ui_dir.join("static");

    Router::new()
        .route("/", get(assets::index))
        .route("/api/files", get(files::list_roots))
        .route("/api/files/", get(files::list_roots))
        .route("/api/files/*path", get(files::list_dir))
        .route("/api/download/*path", get(files::download))
        .route("/api/view/*path", get(files::view))
        .route("/api/upload", post(files::upload))
        .route(
            "/api/clipboard",
            get(clipboard::get_clipboard).post(clipboard::set_clipboard),
        )
        .route("/api/server-info", get(info::server_info))
        .route("/ws", get(socket::ws_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
struct TokenParam {
    token: Option<String>,
}

/// Reject requests without the access token.
async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let public = PUBLIC_PATHS.contains(&path)
        || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix));

    if !public {
        let token = Query::<TokenParam>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(param)| param.token);

        if !state.token.verify(token.as_deref()) {
            tracing::debug!(path = %path, "Rejected request without valid token");
            return ApiError::Unauthorized("Invalid or missing access token").into_response();
        }
    }

    next.run(request).await
}
