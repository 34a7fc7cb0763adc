//! # LanShare Daemon Library
//!
//! This crate provides the server side of LanShare: a single token-protected
//! HTTP service that exposes a directory tree and a shared text clipboard to
//! browsers on the local network.
//!
//! ## Overview
//!
//! - **File Access**: Browse directories confined to the configured roots,
//!   download files in chunks, download directories as zip archives, upload
//! - **Clipboard**: A text file mirrored to every connected client over a
//!   WebSocket, picking up edits made outside the service
//! - **Access Control**: A per-run (or configured) token required on every
//!   API call
//! - **User Interface**: Startup banner with access URLs and a QR code
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Daemon Orchestrator                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │            HTTP router (token layer, /api, /ws)            │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐  │
//! │  │  Directory   │  │   Chunked    │  │  Archive builder +   │  │
//! │  │   lister     │  │   transfer   │  │  temp registry       │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────┬───────────┘  │
//! │         └─────────── PathGuard (roots) ─────────┘              │
//! │  ┌──────────────────────────┐  ┌────────────────────────────┐  │
//! │  │  Clipboard store/poller  │──│   Clipboard broadcaster    │  │
//! │  └──────────────────────────┘  └────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lanshare::{Config, DaemonOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     let mut orchestrator = DaemonOrchestrator::new(config)?;
//!     let addr = orchestrator.start().await?;
//!     println!("listening on {addr}, token {}", orchestrator.token().as_str());
//!
//!     tokio::signal::ctrl_c().await?;
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`auth`]: Access token generation and checks
//! - [`files`]: Path confinement, listing, transfer, archives
//! - [`clipboard`]: Clipboard store, poller and broadcaster
//! - [`http`]: Router and handlers
//! - [`net`]: LAN address discovery
//! - [`ui`]: Startup banner and QR codes
//! - [`orchestrator`]: Main daemon coordinator

pub mod auth;
pub mod clipboard;
pub mod config;
pub mod files;
pub mod http;
pub mod net;
pub mod orchestrator;
pub mod ui;

// Re-export protocol for convenience
pub use protocol;

pub use auth::AuthToken;
pub use config::Config;

pub use clipboard::{ClipboardBroadcaster, ClipboardSource, ClipboardStore};

pub use files::{
    ArchiveBuilder, ChunkedTransfer, DirectoryLister, PathGuard, ProcMounts, StaticMounts,
    TempArtifactRegistry,
};

pub use http::{router, AppState};

pub use orchestrator::{DaemonOrchestrator, OrchestratorState};
