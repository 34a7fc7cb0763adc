//! File routes: listing, download, inline view and upload.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::{DirectoryListing, UploadResponse};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info};

use super::error::ApiError;
use super::AppState;
use crate::files::Download;

/// Extensions served directly (with Range support) by `/api/view`.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "3gp", "mp3", "wav", "ogg", "flac",
    "jpg", "jpeg", "png", "gif", "bmp", "webp",
];

/// `GET /api/files` and `GET /api/files/`.
pub async fn list_roots(State(state): State<AppState>) -> Result<Json<DirectoryListing>, ApiError> {
    list(state, String::new()).await
}

/// `GET /api/files/*path`.
pub async fn list_dir(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<DirectoryListing>, ApiError> {
    list(state, path).await
}

async fn list(state: AppState, path: String) -> Result<Json<DirectoryListing>, ApiError> {
    let lister = Arc::clone(&state.lister);
    let listing = tokio::task::spawn_blocking(move || lister.list(&path))
        .await
        .map_err(ApiError::internal)??;
    Ok(Json(listing))
}

/// `GET /api/download/*path`: a file as-is, a directory as a zip archive.
pub async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let resolved = state.guard.resolve(&path)?;
    let metadata = tokio::fs::metadata(&resolved).await?;

    if metadata.is_dir() {
        let name = format!("{}.zip", display_name(&resolved, "archive"));
        let archive = Arc::clone(&state.archives).build_async(resolved).await?;
        let download = state.transfer.open_path(archive.path).await?;
        info!(archive = %name, size = download.len, "Sending directory archive");
        return Ok(stream_response(download, "application/zip", "attachment", &name));
    }

    let download = state.transfer.open_path(resolved).await?;
    let name = download.file_name();
    debug!(file = %name, size = download.len, "Sending file");
    Ok(stream_response(
        download,
        "application/octet-stream",
        "attachment",
        &name,
    ))
}

/// `GET /api/view/*path`: inline display in the browser.
pub async fn view(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let resolved = state.guard.resolve(&path)?;
    let metadata = tokio::fs::metadata(&resolved).await?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound);
    }

    if is_media(&resolved) {
        let response = ServeFile::new(&resolved)
            .oneshot(request)
            .await
            .map_err(ApiError::internal)?;
        return Ok(response.map(Body::new));
    }

    let download = state.transfer.open_path(resolved).await?;
    let name = download.file_name();
    let mime = guess_mime(&download.path);
    Ok(stream_response(download, mime, "inline", &name))
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    path: Option<String>,
}

/// `POST /api/upload`, multipart with a `path` field (or query parameter)
/// followed by one or more `files` parts.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut target = match query.path.filter(|p| !p.is_empty()) {
        Some(path) => Some(state.transfer.upload_dir(&path).await?),
        None => None,
    };
    let mut saw_files = false;
    let mut stored = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("Malformed upload: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("path") => {
                let path = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid(format!("Malformed upload: {e}")))?;
                if !path.is_empty() {
                    target = Some(state.transfer.upload_dir(&path).await?);
                }
            }
            Some("files") | Some("file") => {
                saw_files = true;
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if file_name.is_empty() {
                    continue;
                }
                let dir = target
                    .as_deref()
                    .ok_or_else(|| ApiError::invalid("No target path provided"))?;
                let name = state.transfer.receive(dir, &file_name, field).await?;
                stored.push(name);
            }
            _ => {}
        }
    }

    if !saw_files {
        return Err(ApiError::invalid("No files provided"));
    }

    info!(count = stored.len(), "Upload complete");
    Ok(Json(UploadResponse {
        message: format!("Uploaded {} files", stored.len()),
        files: stored,
    }))
}

fn stream_response(download: Download, mime: &str, disposition: &str, name: &str) -> Response {
    let len = download.len;
    let body = Body::from_stream(download.into_stream());

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(disposition, name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

fn display_name(path: &FsPath, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// `Content-Disposition` value with an ASCII fallback name and an RFC 6266
/// `filename*` for anything else.
pub fn content_disposition(disposition: &str, name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("{disposition}; filename=\"{name}\"")
    } else {
        format!(
            "{disposition}; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(name)
        )
    }
}

fn extension(path: &FsPath) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn is_media(path: &FsPath) -> bool {
    MEDIA_EXTENSIONS.contains(&extension(path).as_str())
}

/// MIME type for inline viewing of non-media files.
pub fn guess_mime(path: &FsPath) -> &'static str {
    match extension(path).as_str() {
        "txt" | "log" | "ini" | "conf" | "cfg" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "text/yaml; charset=utf-8",
        "toml" => "text/x-toml; charset=utf-8",
        "rs" | "py" | "sh" | "c" | "h" | "cpp" | "java" | "go" | "ts" => {
            "text/plain; charset=utf-8"
        }
        "pdf" => "application/pdf",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "opus" => "audio/opus",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("attachment", "report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_unicode() {
        let value = content_disposition("inline", "café menu.txt");
        assert_eq!(
            value,
            "inline; filename=\"caf_ menu.txt\"; filename*=UTF-8''caf%C3%A9%20menu.txt"
        );
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn test_content_disposition_quotes() {
        let value = content_disposition("attachment", "say \"hi\".txt");
        assert!(value.starts_with("attachment; filename=\"say _hi_.txt\""));
        assert!(value.contains("filename*=UTF-8''say%20%22hi%22.txt"));
    }

    #[test]
    fn test_is_media() {
        assert!(is_media(FsPath::new("/videos/Holiday.MP4")));
        assert!(is_media(FsPath::new("photo.webp")));
        assert!(!is_media(FsPath::new("notes.txt")));
        assert!(!is_media(FsPath::new("Makefile")));
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(FsPath::new("a.json")), "application/json");
        assert_eq!(guess_mime(FsPath::new("a.PDF")), "application/pdf");
        assert_eq!(guess_mime(FsPath::new("README.md")), "text/markdown; charset=utf-8");
        assert_eq!(guess_mime(FsPath::new("blob")), "application/octet-stream");
    }
}
