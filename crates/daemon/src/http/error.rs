//! Route-boundary error mapping.
//!
//! Every failure leaves the server as `{ "error": string }`. Messages for
//! denied or missing paths are fixed strings and never echo the path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::ErrorBody;
use tracing::{error, warn};

use crate::files::{AccessError, ArchiveError, BrowseError, TransferError};

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Path outside the roots or a traversal attempt.
    AccessDenied,
    /// Missing path, or a file where a directory is needed (or vice versa).
    NotFound,
    /// Archive creation failed.
    Build(String),
    /// Missing upload files, malformed JSON and the like.
    InvalidInput(String),
    /// Missing or wrong access token.
    Unauthorized(&'static str),
    /// Anything else. The detail is logged, not returned.
    Internal(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AccessDenied | ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Build(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::AccessDenied => "Access denied".to_string(),
            ApiError::NotFound => "Path not found".to_string(),
            ApiError::Build(_) => "Failed to create archive".to_string(),
            ApiError::InvalidInput(msg) => msg.clone(),
            ApiError::Unauthorized(msg) => msg.to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Build(detail) => warn!(error = %detail, "Archive build failed"),
            ApiError::Internal(detail) => error!(error = %detail, "Request failed"),
            _ => {}
        }

        (self.status_code(), Json(ErrorBody::new(self.message()))).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Denied => ApiError::AccessDenied,
            AccessError::NotFound => ApiError::NotFound,
            AccessError::Io(e) => ApiError::internal(e),
        }
    }
}

impl From<BrowseError> for ApiError {
    fn from(err: BrowseError) -> Self {
        match err {
            BrowseError::Access(e) => e.into(),
            BrowseError::NotADirectory(_) => ApiError::NotFound,
            BrowseError::Io(e) => io_error(e),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Access(e) => e.into(),
            TransferError::NotAFile(_) | TransferError::NotADirectory(_) => ApiError::NotFound,
            TransferError::InvalidName(name) => {
                ApiError::InvalidInput(format!("Invalid file name: {name:?}"))
            }
            TransferError::Body(detail) => ApiError::InvalidInput(format!("Upload failed: {detail}")),
            TransferError::Io(e) => io_error(e),
        }
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotADirectory(_) => ApiError::NotFound,
            other => ApiError::Build(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        io_error(err)
    }
}

fn io_error(err: std::io::Error) -> ApiError {
    match err.kind() {
        std::io::ErrorKind::NotFound => ApiError::NotFound,
        std::io::ErrorKind::PermissionDenied => ApiError::AccessDenied,
        _ => ApiError::internal(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_access_denied_is_generic() {
        let (status, body) = render(ApiError::AccessDenied).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, serde_json::json!({"error": "Access denied"}));
    }

    #[tokio::test]
    async fn test_internal_hides_detail() {
        let (status, body) =
            render(ApiError::internal("disk on fire at /secret/place")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("/secret"));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (status, body) = render(ApiError::Unauthorized("Invalid access token")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid access token");
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ApiError::from(AccessError::Denied),
            ApiError::AccessDenied
        ));
        assert!(matches!(
            ApiError::from(BrowseError::NotADirectory("/x".into())),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from(TransferError::InvalidName("..".into())),
            ApiError::InvalidInput(_)
        ));
        assert!(matches!(
            ApiError::from(ArchiveError::Task("cancelled".into())),
            ApiError::Build(_)
        ));
        assert!(matches!(
            ApiError::from(io::Error::new(io::ErrorKind::NotFound, "gone")),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from(io::Error::new(io::ErrorKind::PermissionDenied, "no")),
            ApiError::AccessDenied
        ));
    }
}
