//! Shared clipboard backed by a plain text file.
//!
//! The in-memory value and the backing file converge: HTTP and socket edits
//! are written to the file, external edits to the file are picked up by a
//! polling task. Every transition happens under one lock, so updates are
//! totally ordered and no reader sees a torn value.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use protocol::ClipboardUpdate;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcast::ClipboardBroadcaster;

/// Who produced a clipboard change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardSource {
    /// `POST /api/clipboard`.
    Http,
    /// A `clipboard_update` frame from a socket client.
    Socket,
    /// The backing file changed on disk.
    ExternalPoll,
}

#[derive(Debug)]
struct ClipboardState {
    content: String,
    last_observed: Option<SystemTime>,
}

/// The clipboard value and its backing file.
pub struct ClipboardStore {
    path: PathBuf,
    state: Mutex<ClipboardState>,
    broadcaster: ClipboardBroadcaster,
}

impl ClipboardStore {
    /// Load the clipboard from `path`. A missing or unreadable file yields
    /// an empty clipboard.
    pub fn open(path: impl Into<PathBuf>, broadcaster: ClipboardBroadcaster) -> Self {
        let path = path.into();

        let (content, last_observed) = match load(&path) {
            Ok(Some((content, mtime))) => (content, Some(mtime)),
            Ok(None) => (String::new(), None),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to load clipboard");
                (String::new(), None)
            }
        };

        info!(path = ?path, len = content.len(), "Clipboard loaded");

        Self {
            path,
            state: Mutex::new(ClipboardState {
                content,
                last_observed,
            }),
            broadcaster,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn broadcaster(&self) -> &ClipboardBroadcaster {
        &self.broadcaster
    }

    fn lock(&self) -> MutexGuard<'_, ClipboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current clipboard text.
    pub fn content(&self) -> String {
        self.lock().content.clone()
    }

    /// Replace the clipboard text.
    ///
    /// No-op (returns `false`) when `text` equals the current value.
    /// Otherwise the value is persisted (except for external edits, which
    /// are already on disk), updated and published. A failed save is logged
    /// and the in-memory value still changes.
    pub fn set_content(&self, text: impl Into<String>, source: ClipboardSource) -> bool {
        let mut state = self.lock();
        self.apply(&mut state, text.into(), source)
    }

    fn apply(&self, state: &mut ClipboardState, text: String, source: ClipboardSource) -> bool {
        if text == state.content {
            return false;
        }

        if source != ClipboardSource::ExternalPoll {
            match save(&self.path, &text) {
                Ok(mtime) => state.last_observed = Some(mtime),
                Err(e) => warn!(path = ?self.path, error = %e, "Failed to save clipboard"),
            }
        }

        debug!(?source, len = text.len(), "Clipboard updated");
        state.content = text;
        self.broadcaster
            .publish(ClipboardUpdate::new(state.content.clone()));
        true
    }

    /// Check the backing file once; returns `true` if an external change
    /// was applied.
    pub fn poll_once(&self) -> bool {
        let mut state = self.lock();

        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to stat clipboard file");
                return false;
            }
        };

        if state.last_observed == Some(mtime) {
            return false;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => trim_line_ending(content),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read clipboard file");
                return false;
            }
        };

        state.last_observed = Some(mtime);
        self.apply(&mut state, content, ClipboardSource::ExternalPoll)
    }

    /// Poll the backing file every `every` until `cancel` fires.
    pub fn spawn_poller(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let store = Arc::clone(&self);
                        if let Err(e) = tokio::task::spawn_blocking(move || store.poll_once()).await {
                            warn!(error = %e, "Clipboard poll task failed");
                        }
                    }
                }
            }

            debug!("Clipboard poller stopped");
        })
    }
}

fn load(path: &Path) -> io::Result<Option<(String, SystemTime)>> {
    let mtime = match fs::metadata(path) {
        Ok(m) => m.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let content = fs::read_to_string(path)?;
    Ok(Some((trim_line_ending(content), mtime)))
}

fn save(path: &Path, text: &str) -> io::Result<SystemTime> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    fs::metadata(path)?.modified()
}

// Editors append a final newline
fn trim_line_ending(mut content: String) -> String {
    let len = content.trim_end_matches(|c| c == '\r' || c == '\n').len();
    content.truncate(len);
    content
}
