use axum::extract::{Query, State};
use axum::Json;
use protocol::ServerInfo;
use serde::Deserialize;
use tracing::warn;

use super::error::ApiError;
use super::AppState;
use crate::net;
use crate::ui::{png_data_url, AccessUrls};

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// `GET /api/server-info?token=`. Exempt from the auth layer so the UI can
/// validate a token, but checks it itself.
pub async fn server_info(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<ServerInfo>, ApiError> {
    if !state.token.verify(query.token.as_deref()) {
        return Err(ApiError::Unauthorized("Invalid access token"));
    }

    let ip = net::lan_ip().to_string();
    let urls = AccessUrls::new(&ip, state.port, state.token.as_str());
    let qr_base64 = png_data_url(&urls.network).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to render QR code");
        String::new()
    });

    Ok(Json(ServerInfo {
        ip,
        port: state.port,
        local_url: urls.local,
        network_url: urls.network,
        qr_base64,
        token: state.token.as_str().to_string(),
    }))
}
