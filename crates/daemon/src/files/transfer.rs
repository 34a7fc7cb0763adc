//! Chunked file transfer.
//!
//! Downloads are lazy streams of fixed-size chunks read from a single open
//! file handle; at most one chunk is resident at a time. Uploads are written
//! through to a hidden temp file in the target directory and renamed into
//! place once the body has been received completely.

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::{stream, Stream, StreamExt};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::guard::{AccessError, PathGuard};

/// Default chunk size for transfers (16MB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Maximum chunk size (256MB).
pub const MAX_CHUNK_SIZE: usize = 256 * 1024 * 1024;

/// Errors that can occur during file transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The path failed confinement.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The requested path is a directory, not a file.
    #[error("path is not a file")]
    NotAFile(PathBuf),

    /// The upload target is not a directory.
    #[error("path is not a directory")]
    NotADirectory(PathBuf),

    /// The uploaded file name is unusable after sanitisation.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// Reading the request body failed.
    #[error("upload interrupted: {0}")]
    Body(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// An opened file, ready to be streamed.
#[derive(Debug)]
pub struct Download {
    /// Location of the file on disk.
    pub path: PathBuf,
    /// File length at open time.
    pub len: u64,
    file: File,
    chunk_size: usize,
}

impl Download {
    /// File name used for `Content-Disposition`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string())
    }

    /// Consume the handle, yielding the file contents chunk by chunk.
    ///
    /// The stream stops after `len` bytes even if the file has grown since
    /// it was opened, so it always matches the advertised length.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        chunk_stream(self.file.take(self.len), self.chunk_size)
    }
}

/// Read `reader` sequentially in chunks of exactly `chunk_size` bytes (the
/// last one may be shorter). Empty chunks are never yielded; the stream ends
/// at EOF, or after yielding the first read error, and is not restartable.
pub fn chunk_stream<R>(
    reader: R,
    chunk_size: usize,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let chunk_size = chunk_size.max(1);

    stream::try_unfold(reader, move |mut file| async move {
        let mut buf = BytesMut::with_capacity(chunk_size);

        while buf.len() < chunk_size {
            let remaining = (chunk_size - buf.len()) as u64;
            let n = (&mut file).take(remaining).read_buf(&mut buf).await?;
            if n == 0 {
                break;
            }
        }

        if buf.is_empty() {
            Ok::<_, io::Error>(None)
        } else {
            Ok(Some((buf.freeze(), file)))
        }
    })
}

/// Reduce a client-supplied upload name to its final path component.
///
/// Both `/` and `\` are treated as separators. Returns `None` for names that
/// end up empty, `.`, `..` or containing NUL.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(|c| c == '/' || c == '\\').next()?;

    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return None;
    }

    Some(base.to_string())
}

/// File transfer handler.
///
/// Every client path passes through the [`PathGuard`] before a file is
/// opened or written.
pub struct ChunkedTransfer {
    guard: Arc<PathGuard>,
    chunk_size: usize,
}

impl ChunkedTransfer {
    /// Create a transfer handler, clamping `chunk_size` to
    /// `1..=MAX_CHUNK_SIZE`.
    pub fn new(guard: Arc<PathGuard>, chunk_size: usize) -> Self {
        Self {
            guard,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Resolve `client_path` and open it for streaming.
    pub async fn stream(&self, client_path: &str) -> Result<Download, TransferError> {
        let path = self.guard.resolve(client_path)?;
        self.open_path(path).await
    }

    /// Open a file the server already trusts: either a confined path or an
    /// archive owned by the artifact registry.
    pub async fn open_path(&self, path: PathBuf) -> Result<Download, TransferError> {
        let file = File::open(&path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(path));
        }

        debug!(path = ?path, size = metadata.len(), "Opened file for streaming");

        Ok(Download {
            path,
            len: metadata.len(),
            file,
            chunk_size: self.chunk_size,
        })
    }

    /// Resolve an upload target, which must be an existing directory.
    pub async fn upload_dir(&self, client_path: &str) -> Result<PathBuf, TransferError> {
        let dir = self.guard.resolve(client_path)?;
        let metadata = fs::metadata(&dir).await?;
        if !metadata.is_dir() {
            return Err(TransferError::NotADirectory(dir));
        }
        Ok(dir)
    }

    /// Write one uploaded file into `dir`.
    ///
    /// The body is written through to `.<name>.<uuid>.part` and renamed over
    /// `<dir>/<name>` on success, replacing any existing file. On failure the
    /// temp file is removed and an existing target is left untouched.
    /// Returns the stored (sanitised) name.
    pub async fn receive<S, E>(
        &self,
        dir: &Path,
        raw_name: &str,
        body: S,
    ) -> Result<String, TransferError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let name = sanitize_file_name(raw_name)
            .ok_or_else(|| TransferError::InvalidName(raw_name.to_string()))?;
        let destination = dir.join(&name);

        if let Ok(existing) = fs::symlink_metadata(&destination).await {
            if existing.is_dir() {
                return Err(TransferError::InvalidName(name));
            }
        }

        let temp_path = dir.join(format!(".{}.{}.part", name, Uuid::new_v4().simple()));

        let result = async {
            let written = write_body(&temp_path, body).await?;
            fs::rename(&temp_path, &destination).await?;
            Ok::<u64, TransferError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!(path = ?destination, size = written, "Upload stored");
                Ok(name)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(path = ?temp_path, error = %cleanup, "Failed to remove partial upload");
                    }
                }
                Err(e)
            }
        }
    }
}

async fn write_body<S, E>(path: &Path, body: S) -> Result<u64, TransferError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = pin!(body);
    let mut file = File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| TransferError::Body(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
