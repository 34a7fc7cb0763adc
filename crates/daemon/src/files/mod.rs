//! File access for directory browsing and transfer.
//!
//! This module provides:
//! - Root confinement for every client-supplied path ([`guard`])
//! - Directory listing and the drives view ([`browser`])
//! - Chunked downloads and write-through uploads ([`transfer`])
//! - Store-only zip archives for directory downloads ([`archive`])
//! - Tracking and cleanup of those archives ([`registry`])
//!
//! # Security
//!
//! All paths are validated against the allowed roots. Traversal is blocked
//! textually before canonicalization, and symlinks that resolve outside the
//! roots are rejected wherever they are encountered.

pub mod archive;
pub mod browser;
pub mod guard;
pub mod registry;
pub mod transfer;

pub use archive::{Archive, ArchiveBuilder, ArchiveError};
pub use browser::{BrowseError, DirectoryEntry, DirectoryLister, VolumeStats};
pub use guard::{AccessError, MountTable, PathGuard, ProcMounts, StaticMounts};
pub use registry::TempArtifactRegistry;
pub use transfer::{ChunkedTransfer, Download, TransferError, DEFAULT_CHUNK_SIZE};
