//! Wire message definitions for LanShare.
//!
//! Every HTTP response body and every socket frame exchanged between the
//! server and browser clients is one of the types in this module. All of
//! them are JSON; field names use the camelCase spelling the web UI expects.

use serde::{Deserialize, Serialize};

/// Event name used for clipboard changes on the socket channel.
pub const CLIPBOARD_UPDATE_EVENT: &str = "clipboard_update";

// ============================================================================
// File Messages
// ============================================================================

/// One entry of a directory listing, or one root of the drives view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Entry name (the mount point itself for roots).
    pub name: String,
    /// Absolute path, usable as the next `/api/files/<path>` request.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes. Files report their length, directories 0, roots the
    /// total capacity of the volume.
    pub size: u64,
    /// Last modification time in seconds since the Unix epoch.
    pub modified: f64,
    /// Free bytes on the volume (roots only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<u64>,
    /// Used bytes on the volume (roots only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
}

/// Response for `GET /api/files/[path]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    /// The path as requested by the client (empty for the drives view).
    pub path: String,
    /// Listed entries.
    pub files: Vec<FileEntry>,
    /// True when `files` are the configured roots.
    pub is_root: bool,
}

/// Response for `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Human readable summary, e.g. "Uploaded 2 files".
    pub message: String,
    /// Stored file names, after sanitisation.
    pub files: Vec<String>,
}

// ============================================================================
// Clipboard Messages
// ============================================================================

/// Body of `GET /api/clipboard` and `POST /api/clipboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardContent {
    /// Clipboard text.
    #[serde(default)]
    pub content: String,
}

/// Payload of a `clipboard_update` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardUpdate {
    /// The new clipboard text.
    #[serde(default)]
    pub text: String,
}

impl ClipboardUpdate {
    /// Create an update carrying `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A frame on the socket channel.
///
/// Encoded as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SocketMessage {
    /// Clipboard content changed (server to client) or was edited
    /// (client to server).
    ClipboardUpdate(ClipboardUpdate),
}

impl SocketMessage {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Control Messages
// ============================================================================

/// Error envelope returned by every failing route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Client-safe error description.
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for `GET /api/server-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// LAN address of the host.
    pub ip: String,
    /// Listening port.
    pub port: u16,
    /// URL for a browser on the host itself.
    pub local_url: String,
    /// URL for other devices on the network.
    pub network_url: String,
    /// `data:image/png;base64,...` QR code of `network_url`, or empty if
    /// rendering failed.
    pub qr_base64: String,
    /// The access token.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_entry_uses_camel_case() {
        let entry = FileEntry {
            name: "notes.txt".to_string(),
            path: "/home/me/notes.txt".to_string(),
            is_dir: false,
            size: 12,
            modified: 1704067200.0,
            free: None,
            used: None,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["isDir"], json!(false));
        assert_eq!(value["size"], json!(12));
        // Volume stats are omitted for plain entries
        assert!(value.get("free").is_none());
        assert!(value.get("used").is_none());
    }

    #[test]
    fn test_root_entry_carries_volume_stats() {
        let entry = FileEntry {
            name: "/media/usb".to_string(),
            path: "/media/usb".to_string(),
            is_dir: true,
            size: 1000,
            modified: 0.0,
            free: Some(400),
            used: Some(600),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["free"], json!(400));
        assert_eq!(value["used"], json!(600));
    }

    #[test]
    fn test_listing_shape() {
        let listing = DirectoryListing {
            path: String::new(),
            files: vec![],
            is_root: true,
        };
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(value, json!({"path": "", "files": [], "isRoot": true}));
    }

    #[test]
    fn test_socket_message_format() {
        let msg = SocketMessage::ClipboardUpdate(ClipboardUpdate::new("hello"));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": CLIPBOARD_UPDATE_EVENT, "data": {"text": "hello"}})
        );
    }

    #[test]
    fn test_socket_message_parse() {
        let msg =
            SocketMessage::from_json(r#"{"event":"clipboard_update","data":{"text":"hi"}}"#)
                .unwrap();
        assert_eq!(msg, SocketMessage::ClipboardUpdate(ClipboardUpdate::new("hi")));
    }

    #[test]
    fn test_socket_message_missing_text_defaults_empty() {
        let msg = SocketMessage::from_json(r#"{"event":"clipboard_update","data":{}}"#).unwrap();
        assert_eq!(msg, SocketMessage::ClipboardUpdate(ClipboardUpdate::new("")));
    }

    #[test]
    fn test_socket_message_unknown_event() {
        let result = SocketMessage::from_json(r#"{"event":"shutdown","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_clipboard_content_default() {
        let body: ClipboardContent = serde_json::from_str("{}").unwrap();
        assert_eq!(body.content, "");
    }

    #[test]
    fn test_server_info_shape() {
        let info = ServerInfo {
            ip: "192.168.1.20".to_string(),
            port: 8080,
            local_url: "http://localhost:8080/?token=t".to_string(),
            network_url: "http://192.168.1.20:8080/?token=t".to_string(),
            qr_base64: String::new(),
            token: "t".to_string(),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["localUrl"], json!("http://localhost:8080/?token=t"));
        assert_eq!(value["networkUrl"], json!("http://192.168.1.20:8080/?token=t"));
        assert_eq!(value["qrBase64"], json!(""));
    }
}
