//! Directory listing with path validation.
//!
//! Listings are built fresh from live `stat` data on every call. Entries
//! are never cached.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use protocol::{DirectoryListing, FileEntry};
use thiserror::Error;
use tracing::debug;

use super::guard::{AccessError, PathGuard};

/// Errors that can occur during directory browsing.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The path failed confinement.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The requested path is not a directory.
    #[error("path is not a directory")]
    NotADirectory(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A directory entry with metadata.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Full path of the entry as seen from the listed directory.
    pub path: PathBuf,
    /// Whether the entry (or its symlink target) is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modified timestamp.
    pub modified: SystemTime,
}

impl DirectoryEntry {
    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        FileEntry {
            name: self.name.clone(),
            path: self.path.to_string_lossy().to_string(),
            is_dir: self.is_dir,
            size: self.size,
            modified: epoch_seconds(self.modified),
            free: None,
            used: None,
        }
    }
}

/// Capacity figures for a mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

impl VolumeStats {
    /// Query the volume holding `path`.
    pub fn for_path(path: &Path) -> Option<Self> {
        let stat = nix::sys::statvfs::statvfs(path).ok()?;
        let fragment = stat.fragment_size() as u64;
        let total = stat.blocks() as u64 * fragment;
        let free = stat.blocks_available() as u64 * fragment;
        let used = total.saturating_sub(stat.blocks_free() as u64 * fragment);
        Some(Self { total, free, used })
    }
}

/// Lists directories under the allowed roots.
pub struct DirectoryLister {
    guard: Arc<PathGuard>,
}

impl DirectoryLister {
    pub fn new(guard: Arc<PathGuard>) -> Self {
        Self { guard }
    }

    /// List `client_path`, or the roots when it is empty.
    pub fn list(&self, client_path: &str) -> Result<DirectoryListing, BrowseError> {
        if client_path.trim_matches('/').is_empty() {
            return Ok(DirectoryListing {
                path: String::new(),
                files: self.list_roots().iter().map(root_to_protocol).collect(),
                is_root: true,
            });
        }

        let canonical = self.guard.resolve(client_path)?;
        let entries = self.list_directory(&canonical)?;

        Ok(DirectoryListing {
            path: client_path.to_string(),
            files: entries.iter().map(DirectoryEntry::to_protocol).collect(),
            is_root: false,
        })
    }

    /// The drives view: every current root with its volume statistics.
    pub fn list_roots(&self) -> Vec<(DirectoryEntry, Option<VolumeStats>)> {
        self.guard
            .roots()
            .into_iter()
            .map(|root| {
                let modified = fs::metadata(&root)
                    .and_then(|m| m.modified())
                    .unwrap_or_else(|_| SystemTime::now());
                let stats = VolumeStats::for_path(&root);
                let entry = DirectoryEntry {
                    name: root.to_string_lossy().to_string(),
                    path: root,
                    is_dir: true,
                    size: stats.map(|s| s.total).unwrap_or(0),
                    modified,
                };
                (entry, stats)
            })
            .collect()
    }

    /// List the immediate children of an already confined directory.
    ///
    /// Dotfiles are skipped, as is any child whose resolved location falls
    /// outside the roots (a symlink pointing elsewhere) and any child that
    /// cannot be stat'ed.
    pub fn list_directory(&self, canonical: &Path) -> Result<Vec<DirectoryEntry>, BrowseError> {
        let metadata = fs::metadata(canonical)?;
        if !metadata.is_dir() {
            return Err(BrowseError::NotADirectory(canonical.to_path_buf()));
        }

        let mut names: Vec<String> = fs::read_dir(canonical)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        let mut results = Vec::with_capacity(names.len());

        for name in names {
            if name.starts_with('.') {
                continue;
            }

            let path = canonical.join(&name);

            let resolved = match self.guard.confine(&path) {
                Ok(p) => p,
                Err(e) => {
                    debug!(path = ?path, error = %e, "Skipping entry");
                    continue;
                }
            };

            // Follows symlinks; the target has already been confined
            let metadata = match fs::metadata(&resolved) {
                Ok(m) => m,
                Err(_) => continue, // Deleted or unreadable since read_dir
            };

            let is_dir = metadata.is_dir();
            results.push(DirectoryEntry {
                name,
                path,
                is_dir,
                size: if is_dir { 0 } else { metadata.len() },
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        Ok(results)
    }
}

fn root_to_protocol((entry, stats): &(DirectoryEntry, Option<VolumeStats>)) -> FileEntry {
    let mut file = entry.to_protocol();
    file.free = stats.map(|s| s.free);
    file.used = stats.map(|s| s.used);
    file
}

fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
