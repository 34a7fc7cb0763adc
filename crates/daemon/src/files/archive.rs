//! On-demand directory archives.
//!
//! A directory download is materialised as a store-only zip in the scratch
//! directory. Entries are not compressed: on a LAN the bottleneck is disk
//! and network I/O.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::guard::PathGuard;
use super::registry::TempArtifactRegistry;

/// Errors that can occur while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The source path is not a directory.
    #[error("path is not a directory")]
    NotADirectory(PathBuf),

    /// Walking the source tree failed.
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Writing the archive failed.
    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The blocking build task did not complete.
    #[error("archive task failed: {0}")]
    Task(String),
}

/// A finished archive, owned by the registry.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Location in the scratch directory.
    pub path: PathBuf,
    /// Size of the archive in bytes.
    pub len: u64,
    /// Number of files stored.
    pub files: usize,
}

/// Builds zip archives of confined directories.
pub struct ArchiveBuilder {
    guard: Arc<PathGuard>,
    registry: Arc<TempArtifactRegistry>,
}

impl ArchiveBuilder {
    pub fn new(guard: Arc<PathGuard>, registry: Arc<TempArtifactRegistry>) -> Self {
        Self { guard, registry }
    }

    /// Archive `dir` on the blocking pool.
    pub async fn build_async(self: Arc<Self>, dir: PathBuf) -> Result<Archive, ArchiveError> {
        tokio::task::spawn_blocking(move || self.build(&dir))
            .await
            .map_err(|e| ArchiveError::Task(e.to_string()))?
    }

    /// Archive every regular file under `dir`, which must already be
    /// confined.
    ///
    /// Each file is confined again before it is added, so a symlink in the
    /// tree cannot pull in content from outside the roots. Symlinked
    /// directories are not descended into. On failure the partial archive
    /// is discarded through the registry.
    pub fn build(&self, dir: &Path) -> Result<Archive, ArchiveError> {
        if !fs::metadata(dir)?.is_dir() {
            return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
        }

        let stem = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());
        let path = self.registry.allocate(&stem)?;

        match self.write_archive(dir, &path) {
            Ok(files) => {
                let len = fs::metadata(&path)?.len();
                info!(source = ?dir, archive = ?path, files, size = len, "Archive built");
                Ok(Archive { path, len, files })
            }
            Err(e) => {
                self.registry.discard(&path);
                Err(e)
            }
        }
    }

    fn write_archive(&self, dir: &Path, archive_path: &Path) -> Result<usize, ArchiveError> {
        // Never archive our own scratch files
        let scratch = fs::canonicalize(self.registry.scratch_dir())?;

        let mut zip = ZipWriter::new(BufWriter::new(File::create(archive_path)?));
        let mut files = 0;

        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let resolved = match self.guard.confine(entry.path()) {
                Ok(p) => p,
                Err(e) => {
                    debug!(path = ?entry.path(), error = %e, "Excluded from archive");
                    continue;
                }
            };
            if resolved.starts_with(&scratch) {
                continue;
            }

            let metadata = fs::metadata(&resolved)?;
            if !metadata.is_file() {
                continue;
            }

            let Some(name) = archive_name(dir, entry.path()) else {
                continue;
            };

            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .unix_permissions(metadata.permissions().mode())
                .large_file(metadata.len() >= u32::MAX as u64);

            zip.start_file(name, options)?;
            let mut source = File::open(&resolved)?;
            io::copy(&mut source, &mut zip)?;
            files += 1;
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
        Ok(files)
    }
}

/// Relative path of `path` under `dir`, joined with `/`.
fn archive_name(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
