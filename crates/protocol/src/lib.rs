//! # LanShare Protocol Library
//!
//! Wire types shared by the LanShare server and its clients.
//!
//! ## Overview
//!
//! LanShare exposes a directory tree over HTTP and keeps a shared clipboard
//! in sync over a socket channel. This crate defines the JSON bodies of both:
//!
//! - **File Messages**: directory listings, root (drive) entries, upload results
//! - **Clipboard Messages**: REST bodies and the `clipboard_update` socket frame
//! - **Control Messages**: the `{ "error": ... }` envelope and server info
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{ClipboardUpdate, SocketMessage};
//!
//! let frame = SocketMessage::ClipboardUpdate(ClipboardUpdate::new("hello"));
//! let json = frame.to_json().unwrap();
//! assert_eq!(SocketMessage::from_json(&json).unwrap(), frame);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Message definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    ClipboardContent, ClipboardUpdate, DirectoryListing, ErrorBody, FileEntry, MessageBody,
    ServerInfo, SocketMessage, UploadResponse, CLIPBOARD_UPDATE_EVENT,
};
