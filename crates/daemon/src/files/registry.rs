//! Registry of temporary archive files.
//!
//! Every archive created for a directory download is allocated here and
//! stays registered until [`TempArtifactRegistry::cleanup_all`] runs. The
//! registry is the only component that deletes archive files.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extension of every archive the registry hands out.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Tracks temporary archives in a scratch directory.
#[derive(Debug)]
pub struct TempArtifactRegistry {
    scratch_dir: PathBuf,
    paths: Mutex<HashSet<PathBuf>>,
}

impl TempArtifactRegistry {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            paths: Mutex::new(HashSet::new()),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a fresh archive path for `stem` and register it.
    ///
    /// The name is `<stem>_<unix seconds>_<random>.zip`, so concurrent
    /// downloads of the same directory never collide. The scratch directory
    /// is created if needed; the file itself is not.
    pub fn allocate(&self, stem: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.scratch_dir)?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let suffix = Uuid::new_v4().simple().to_string();
        let stem: String = stem
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();

        let path = self.scratch_dir.join(format!(
            "{}_{}_{}.{}",
            stem,
            timestamp,
            &suffix[..8],
            ARCHIVE_EXTENSION
        ));
        self.register(path.clone());
        Ok(path)
    }

    /// Track `path` for deletion at shutdown.
    pub fn register(&self, path: PathBuf) {
        debug!(path = ?path, "Registered temporary artifact");
        self.lock().insert(path);
    }

    /// Delete one registered artifact right away (a failed build's output).
    pub fn discard(&self, path: &Path) {
        self.lock().remove(path);
        remove_quietly(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Delete every registered artifact and clear the set.
    ///
    /// Missing files and permission errors are swallowed. Safe to call any
    /// number of times.
    pub fn cleanup_all(&self) -> usize {
        let paths: Vec<PathBuf> = self.lock().drain().collect();
        let count = paths.len();

        for path in &paths {
            remove_quietly(path);
        }

        if count > 0 {
            info!(count, "Removed temporary archives");
        }
        count
    }

    /// Remove archives left in the scratch directory by an earlier run.
    ///
    /// Files currently registered are kept.
    pub fn sweep_stale(&self) -> usize {
        let entries = match fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = ?self.scratch_dir, error = %e, "Failed to scan scratch directory");
                return 0;
            }
        };

        let live = self.lock().clone();
        let mut removed = 0;

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_archive = path
                .extension()
                .is_some_and(|ext| ext == ARCHIVE_EXTENSION);
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);

            if is_archive && is_file && !live.contains(&path) {
                remove_quietly(&path);
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, dir = ?self.scratch_dir, "Swept stale archives");
        }
        removed
    }
}

impl Drop for TempArtifactRegistry {
    fn drop(&mut self) {
        self.cleanup_all();
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = ?path, "Removed temporary artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?path, error = %e, "Failed to remove temporary artifact"),
    }
}
