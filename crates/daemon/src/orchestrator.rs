//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that builds the file
//! components, the clipboard store and the HTTP router from a [`Config`],
//! runs the server and the clipboard poller, and tears everything down
//! (temporary archives included) on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::AuthToken;
use crate::clipboard::{ClipboardBroadcaster, ClipboardStore};
use crate::config::Config;
use crate::files::{
    ArchiveBuilder, ChunkedTransfer, DirectoryLister, PathGuard, ProcMounts, TempArtifactRegistry,
};
use crate::http::{self, AppState};

/// How long `stop` waits for each background task.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, binding the listener.
    Starting,
    /// Running and accepting connections.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Daemon orchestrator that manages all subsystems.
pub struct DaemonOrchestrator {
    /// Configuration.
    config: Config,
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// Access token.
    token: AuthToken,
    guard: Arc<PathGuard>,
    lister: Arc<DirectoryLister>,
    transfer: Arc<ChunkedTransfer>,
    archives: Arc<ArchiveBuilder>,
    registry: Arc<TempArtifactRegistry>,
    clipboard: Arc<ClipboardStore>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Server and poller tasks.
    tasks: Vec<JoinHandle<()>>,
    /// Bound address once running.
    local_addr: Option<SocketAddr>,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator.
    pub fn new(config: Config) -> Result<Self> {
        let token = AuthToken::from_config(config.server.token.as_deref());

        let mut guard = PathGuard::new(config.roots());
        if config.file.include_mounts {
            guard = guard.with_mounts(ProcMounts::new(config.file.mount_prefixes.clone()));
        }
        let guard = Arc::new(guard);
        debug!(roots = ?guard.roots(), "Resolved shared roots");

        let registry = Arc::new(TempArtifactRegistry::new(config.scratch_dir()));
        let lister = Arc::new(DirectoryLister::new(Arc::clone(&guard)));
        let transfer = Arc::new(ChunkedTransfer::new(
            Arc::clone(&guard),
            config.file.chunk_size,
        ));
        let archives = Arc::new(ArchiveBuilder::new(
            Arc::clone(&guard),
            Arc::clone(&registry),
        ));
        let clipboard = Arc::new(ClipboardStore::open(
            config.clipboard.path.clone(),
            ClipboardBroadcaster::default(),
        ));

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            token,
            guard,
            lister,
            transfer,
            archives,
            registry,
            clipboard,
            shutdown_token: CancellationToken::new(),
            tasks: Vec::new(),
            local_addr: None,
        })
    }

    fn app_state(&self, port: u16) -> AppState {
        AppState {
            token: self.token.clone(),
            guard: Arc::clone(&self.guard),
            lister: Arc::clone(&self.lister),
            transfer: Arc::clone(&self.transfer),
            archives: Arc::clone(&self.archives),
            clipboard: Arc::clone(&self.clipboard),
            ui_dir: self.config.ui_dir(),
            port,
            max_upload_size: self.config.file.max_upload_size,
            shutdown: self.shutdown_token.clone(),
        }
    }

    /// The HTTP router, reporting the configured port in access URLs.
    pub fn router(&self) -> Router {
        http::router(self.app_state(self.config.server.port))
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Starts serving. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }

        info!("Starting LanShare daemon...");

        // Archives orphaned by a previous crash
        self.registry.sweep_stale();

        let bind_addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                *self.state.write().await = OrchestratorState::Stopped;
                return Err(e).with_context(|| format!("Failed to bind {}", bind_addr));
            }
        };
        let local_addr = listener
            .local_addr()
            .context("Failed to read bound address")?;

        let app = http::router(self.app_state(local_addr.port()));
        let shutdown = self.shutdown_token.clone();
        self.tasks.push(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
            debug!("HTTP server stopped");
        }));

        self.tasks.push(
            Arc::clone(&self.clipboard)
                .spawn_poller(self.config.poll_interval(), self.shutdown_token.clone()),
        );
        debug!(path = ?self.clipboard.path(), "Started clipboard poller");

        self.local_addr = Some(local_addr);
        *self.state.write().await = OrchestratorState::Running;

        info!(addr = %local_addr, "LanShare daemon listening");
        Ok(local_addr)
    }

    /// Stops the daemon gracefully and removes temporary archives.
    pub async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                self.registry.cleanup_all();
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }

        info!("Stopping LanShare daemon...");

        // Signal shutdown to all tasks
        self.shutdown_token.cancel();

        for task in self.tasks.drain(..) {
            match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Background task failed: {}", e),
                Err(_) => warn!("Background task did not stop in time"),
            }
        }

        let removed = self.registry.cleanup_all();
        debug!(removed, "Temporary archives cleaned up");

        self.local_addr = None;
        *self.state.write().await = OrchestratorState::Stopped;

        info!("LanShare daemon stopped");
        Ok(())
    }

    /// Returns the access token.
    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Returns the bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the temporary archive registry.
    pub fn registry(&self) -> &Arc<TempArtifactRegistry> {
        &self.registry
    }

    /// Returns the clipboard store.
    pub fn clipboard(&self) -> &Arc<ClipboardStore> {
        &self.clipboard
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
