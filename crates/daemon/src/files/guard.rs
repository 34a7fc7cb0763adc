//! Path confinement for every filesystem-touching route.
//!
//! [`PathGuard`] turns a client-supplied path into a canonical absolute path
//! and rejects anything that does not live under one of the allowed roots.
//! The root set is the configured directories (the home directory by
//! default) plus whatever removable volumes are currently mounted; mounts are
//! re-read on every call so a drive plugged in after startup shows up
//! without a restart.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Default location of the kernel mount table.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Errors produced while confining a path.
///
/// The display strings never include the rejected path so they are safe to
/// hand back to clients.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Traversal attempt or path outside every allowed root.
    #[error("access denied")]
    Denied,

    /// The path does not exist.
    #[error("path not found")]
    NotFound,

    /// IO error while resolving the path.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Source of currently mounted volumes.
pub trait MountTable: Send + Sync {
    /// Returns the mount points that should be exposed as roots.
    fn mount_points(&self) -> Vec<PathBuf>;
}

/// Mount table backed by `/proc/self/mounts`.
///
/// Only block-device mounts living under one of `prefixes` are reported,
/// which keeps system mounts (`/`, `/boot`, pseudo filesystems) out of the
/// allow-list while still picking up USB drives and similar volumes.
#[derive(Debug, Clone)]
pub struct ProcMounts {
    table: PathBuf,
    prefixes: Vec<PathBuf>,
}

impl ProcMounts {
    pub fn new(prefixes: Vec<PathBuf>) -> Self {
        Self {
            table: PathBuf::from(PROC_MOUNTS),
            prefixes,
        }
    }

    /// Read mounts from a different table file.
    pub fn with_table(mut self, table: impl Into<PathBuf>) -> Self {
        self.table = table.into();
        self
    }

    /// Parse mount table contents (fstab format: device, mount point, ...).
    fn parse(&self, contents: &str) -> Vec<PathBuf> {
        contents
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?;
                let mount_point = fields.next()?;
                if !device.starts_with("/dev/") {
                    return None;
                }
                let mount_point = PathBuf::from(unescape_mount_field(mount_point));
                self.prefixes
                    .iter()
                    .any(|prefix| mount_point.starts_with(prefix) && &mount_point != prefix)
                    .then_some(mount_point)
            })
            .collect()
    }
}

impl MountTable for ProcMounts {
    fn mount_points(&self) -> Vec<PathBuf> {
        match fs::read_to_string(&self.table) {
            Ok(contents) => self.parse(&contents),
            Err(e) => {
                debug!(table = ?self.table, error = %e, "Mount table unavailable");
                Vec::new()
            }
        }
    }
}

/// Fixed mount list.
#[derive(Debug, Clone, Default)]
pub struct StaticMounts(pub Vec<PathBuf>);

impl MountTable for StaticMounts {
    fn mount_points(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// The mount table escapes spaces, tabs, newlines and backslashes as octal.
fn unescape_mount_field(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

/// Resolves client paths and confines them to the allowed roots.
pub struct PathGuard {
    /// Configured roots, in display order.
    roots: Vec<PathBuf>,
    /// Volumes discovered at call time.
    mounts: Box<dyn MountTable>,
}

impl PathGuard {
    /// Create a guard over `roots` with no volume discovery.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            mounts: Box::new(StaticMounts::default()),
        }
    }

    /// Also expose the volumes reported by `mounts`.
    pub fn with_mounts(mut self, mounts: impl MountTable + 'static) -> Self {
        self.mounts = Box::new(mounts);
        self
    }

    /// Current canonical root set.
    ///
    /// Configured roots come first, followed by discovered mounts. Roots
    /// that do not exist are skipped and duplicates are dropped.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut result: Vec<PathBuf> = Vec::new();
        let candidates = self.roots.iter().cloned().chain(self.mounts.mount_points());

        for candidate in candidates {
            let canonical = match fs::canonicalize(&candidate) {
                Ok(p) => p,
                Err(_) => continue, // Skip unmounted or deleted roots
            };
            if !result.contains(&canonical) {
                result.push(canonical);
            }
        }

        result
    }

    /// Resolve a client-supplied path.
    ///
    /// A `..` segment (split on `/` or `\`) in the raw input is rejected
    /// before normalization so that a traversal sequence cannot be
    /// canonicalized into an allowed-looking path. Names that merely contain
    /// two dots, like `report..final.txt`, are fine. The remainder is treated
    /// as absolute, canonicalized (resolving symlinks) and accepted only if it
    /// lies under a current root.
    pub fn resolve(&self, client_path: &str) -> Result<PathBuf, AccessError> {
        if has_parent_segment(client_path) {
            debug!(path = %client_path, "Rejected traversal sequence");
            return Err(AccessError::Denied);
        }
        if client_path.contains('\0') {
            return Err(AccessError::Denied);
        }

        self.confine(&normalize(client_path))
    }

    /// Canonicalize an absolute host path and check it against the roots.
    ///
    /// Used for paths the server itself discovers (directory children,
    /// archive walk entries), which never come from client text.
    pub fn confine(&self, path: &Path) -> Result<PathBuf, AccessError> {
        let canonical = fs::canonicalize(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AccessError::NotFound,
            io::ErrorKind::PermissionDenied => AccessError::Denied,
            _ => AccessError::Io(e),
        })?;

        if self.roots().iter().any(|root| canonical.starts_with(root)) {
            Ok(canonical)
        } else {
            debug!(path = ?canonical, "Rejected path outside allowed roots");
            Err(AccessError::Denied)
        }
    }
}

fn has_parent_segment(client_path: &str) -> bool {
    client_path
        .split(|c: char| c == '/' || c == '\\')
        .any(|segment| segment == "..")
}

/// Map a client path onto the host's absolute path syntax.
///
/// URL wildcards arrive without their leading slash, so the path is always
/// anchored at the filesystem root.
fn normalize(client_path: &str) -> PathBuf {
    #[cfg(windows)]
    let client_path = client_path.replace('/', "\\");

    let trimmed = client_path.trim_start_matches(std::path::MAIN_SEPARATOR);
    let mut path = PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
    path.push(trimmed);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn create_test_structure(dir: &Path) {
        fs::create_dir_all(dir.join("subdir")).unwrap();
        fs::write(dir.join("file.txt"), "Hello").unwrap();
        fs::write(dir.join("subdir/nested.txt"), "Nested").unwrap();
    }

    fn client(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_resolve_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);
        let resolved = guard
            .resolve(&client(&temp_dir.path().join("subdir/nested.txt")))
            .unwrap();

        assert_eq!(
            resolved,
            fs::canonicalize(temp_dir.path().join("subdir/nested.txt")).unwrap()
        );
    }

    #[test]
    fn test_resolve_without_leading_slash() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);
        let raw = client(&temp_dir.path().join("file.txt"));

        // Wildcard captures drop the leading separator
        let resolved = guard.resolve(raw.trim_start_matches('/')).unwrap();
        assert!(resolved.ends_with("file.txt"));
    }

    #[test]
    fn test_resolve_root_itself() {
        let temp_dir = TempDir::new().unwrap();
        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);

        let resolved = guard.resolve(&client(temp_dir.path())).unwrap();
        assert!(guard.roots().contains(&resolved));
    }

    #[test]
    fn test_traversal_rejected_textually() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);

        // Would canonicalize back inside the root, still rejected
        let sneaky = format!("{}/subdir/../file.txt", client(temp_dir.path()));
        assert!(matches!(guard.resolve(&sneaky), Err(AccessError::Denied)));

        let backslashed = format!("{}/subdir\\..\\file.txt", client(temp_dir.path()));
        assert!(matches!(guard.resolve(&backslashed), Err(AccessError::Denied)));

        let trailing = format!("{}/subdir/..", client(temp_dir.path()));
        assert!(matches!(guard.resolve(&trailing), Err(AccessError::Denied)));
    }

    #[test]
    fn test_double_dot_inside_name_allowed() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("v1..2")).unwrap();
        fs::write(temp_dir.path().join("v1..2/report..final.txt"), "ok").unwrap();

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);

        let dir = guard
            .resolve(&client(&temp_dir.path().join("v1..2")))
            .unwrap();
        assert!(dir.ends_with("v1..2"));

        let file = guard
            .resolve(&client(&temp_dir.path().join("v1..2/report..final.txt")))
            .unwrap();
        assert!(file.ends_with("report..final.txt"));
    }

    #[test]
    fn test_parent_segment_detection() {
        assert!(has_parent_segment(".."));
        assert!(has_parent_segment("a/../b"));
        assert!(has_parent_segment("a\\..\\b"));
        assert!(has_parent_segment("/a/b/.."));
        assert!(!has_parent_segment("a..b"));
        assert!(!has_parent_segment("/srv/report..final.txt"));
        assert!(!has_parent_segment("..."));
        assert!(!has_parent_segment("/srv/.hidden"));
    }

    #[test]
    fn test_outside_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let other_dir = TempDir::new().unwrap();
        fs::write(other_dir.path().join("other.txt"), "Other").unwrap();

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);
        let result = guard.resolve(&client(&other_dir.path().join("other.txt")));
        assert!(matches!(result, Err(AccessError::Denied)));
    }

    #[test]
    fn test_sibling_prefix_rejected() {
        // "/tmp/abc" must not admit "/tmp/abcdef"
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("abc");
        let sibling = temp_dir.path().join("abcdef");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&sibling).unwrap();

        let guard = PathGuard::new(vec![root]);
        assert!(matches!(
            guard.resolve(&client(&sibling)),
            Err(AccessError::Denied)
        ));
    }

    #[test]
    fn test_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);

        let result = guard.resolve(&client(&temp_dir.path().join("missing.txt")));
        assert!(matches!(result, Err(AccessError::NotFound)));
    }

    #[test]
    fn test_symlink_escape_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let other_dir = TempDir::new().unwrap();
        fs::write(other_dir.path().join("secret.txt"), "Secret").unwrap();

        let link = temp_dir.path().join("sneaky_link");
        symlink(other_dir.path().join("secret.txt"), &link).unwrap();

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);
        assert!(matches!(
            guard.resolve(&client(&link)),
            Err(AccessError::Denied)
        ));
    }

    #[test]
    fn test_symlink_within_root_allowed() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        let link = temp_dir.path().join("link_to_file");
        symlink(temp_dir.path().join("file.txt"), &link).unwrap();

        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);
        let resolved = guard.resolve(&client(&link)).unwrap();
        assert!(resolved.ends_with("file.txt"));
    }

    #[test]
    fn test_nul_byte_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let guard = PathGuard::new(vec![temp_dir.path().to_path_buf()]);

        let path = format!("{}/file\0.txt", client(temp_dir.path()));
        assert!(matches!(guard.resolve(&path), Err(AccessError::Denied)));
    }

    #[test]
    fn test_mounts_extend_roots() {
        let home = TempDir::new().unwrap();
        let usb = TempDir::new().unwrap();
        fs::write(usb.path().join("photo.jpg"), "jpg").unwrap();

        let guard = PathGuard::new(vec![home.path().to_path_buf()])
            .with_mounts(StaticMounts(vec![usb.path().to_path_buf()]));

        let roots = guard.roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0], fs::canonicalize(home.path()).unwrap());
        assert!(guard.resolve(&client(&usb.path().join("photo.jpg"))).is_ok());
    }

    #[test]
    fn test_missing_and_duplicate_roots_skipped() {
        let home = TempDir::new().unwrap();
        let guard = PathGuard::new(vec![
            home.path().to_path_buf(),
            home.path().join("does-not-exist"),
        ])
        .with_mounts(StaticMounts(vec![home.path().to_path_buf()]));

        assert_eq!(guard.roots(), vec![fs::canonicalize(home.path()).unwrap()]);
    }

    #[test]
    fn test_proc_mounts_parsing() {
        let temp_dir = TempDir::new().unwrap();
        let table = temp_dir.path().join("mounts");
        fs::write(
            &table,
            "/dev/sda2 / ext4 rw,relatime 0 0\n\
             proc /proc proc rw 0 0\n\
             /dev/sdb1 /media/me/USB\\040STICK vfat rw 0 0\n\
             tmpfs /media/me/ram tmpfs rw 0 0\n\
             /dev/sdc1 /mnt/backup ext4 rw 0 0\n\
             /dev/sdd1 /mnt ext4 rw 0 0\n",
        )
        .unwrap();

        let mounts = ProcMounts::new(vec![PathBuf::from("/media"), PathBuf::from("/mnt")])
            .with_table(&table);

        assert_eq!(
            mounts.mount_points(),
            vec![
                PathBuf::from("/media/me/USB STICK"),
                PathBuf::from("/mnt/backup"),
            ]
        );
    }

    #[test]
    fn test_proc_mounts_missing_table() {
        let mounts = ProcMounts::new(vec![PathBuf::from("/media")]).with_table("/nonexistent/mounts");
        assert!(mounts.mount_points().is_empty());
    }

    #[test]
    fn test_fuzzed_traversal_always_denied() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let guard = PathGuard::new(vec![temp_dir.path().join("subdir")]);

        let segments = ["..", ".", "subdir", "file.txt", "", "a..b", "...", "%2e%2e", "~"];
        let mut rng = StdRng::seed_from_u64(0x1a45);

        for _ in 0..500 {
            let count = rng.gen_range(1..8);
            let mut parts: Vec<String> = vec![client(temp_dir.path())];
            for _ in 0..count {
                parts.push(segments[rng.gen_range(0..segments.len())].to_string());
            }
            // Guarantee a traversal sequence somewhere in the input
            let at = rng.gen_range(1..=parts.len());
            parts.insert(at, "..".to_string());

            let candidate = parts.join("/");
            assert!(
                matches!(guard.resolve(&candidate), Err(AccessError::Denied)),
                "accepted {candidate:?}"
            );
        }
    }

    #[test]
    fn test_fuzzed_paths_never_escape() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        let root = temp_dir.path().join("subdir");
        let canonical_root = fs::canonicalize(&root).unwrap();
        let guard = PathGuard::new(vec![root]);

        let alphabet: Vec<char> = "ab./\\~%-_ \u{e9}".chars().collect();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2000 {
            let len = rng.gen_range(0..24);
            let noise: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let candidate = if rng.gen_bool(0.5) {
                format!("{}/{}", client(temp_dir.path()), noise)
            } else {
                noise
            };

            if let Ok(resolved) = guard.resolve(&candidate) {
                assert!(
                    resolved.starts_with(&canonical_root),
                    "{candidate:?} resolved to {resolved:?}"
                );
            }
        }
    }
}
