//! Configuration management for the LanShare daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/lanshare/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::transfer::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("chunk_size must be between 1 and {max} bytes, got {0}", max = MAX_CHUNK_SIZE)]
    InvalidChunkSize(usize),

    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("poll_interval_ms must be greater than 0, got {0}")]
    InvalidPollInterval(u64),

    #[error("token must not be empty when set")]
    EmptyToken,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the LanShare daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Shared file tree configuration.
    pub file: FileConfig,

    /// Shared clipboard configuration.
    pub clipboard: ClipboardConfig,

    /// Directory download archives.
    pub archive: ArchiveConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for daemon data (UI assets, scratch archives).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Write daily-rotated log files here in addition to stderr.
    pub log_dir: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Access token. A random token is generated at startup when unset.
    pub token: Option<String>,

    /// Web UI directory (`index.html` and `static/`). Defaults to
    /// `<data_dir>/ui`.
    pub ui_dir: Option<PathBuf>,
}

/// Shared file tree configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Directories clients may access. Empty means the home directory.
    pub roots: Vec<PathBuf>,

    /// Also expose removable volumes mounted under `mount_prefixes`.
    pub include_mounts: bool,

    /// Mount point prefixes that count as removable volumes.
    pub mount_prefixes: Vec<PathBuf>,

    /// Download chunk size in bytes (default: 16MB).
    pub chunk_size: usize,

    /// Maximum request body size for uploads in bytes (default: 100GB).
    pub max_upload_size: u64,
}

/// Shared clipboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Backing text file.
    pub path: PathBuf,

    /// How often the backing file is checked for external edits.
    pub poll_interval_ms: u64,
}

/// Directory download archives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Where archives are written. Defaults to `<data_dir>/temp_zips`.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            token: None,
            ui_dir: None,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            include_mounts: true,
            mount_prefixes: vec![
                PathBuf::from("/media"),
                PathBuf::from("/mnt"),
                PathBuf::from("/run/media"),
            ],
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_size: 100 * 1024 * 1024 * 1024, // 100GB
        }
    }
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            path: default_clipboard_path(),
            poll_interval_ms: 1000,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanshare")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lanshare")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

/// `~/Desktop/clipboard.txt`, or `~/clipboard.txt` without a desktop.
fn default_clipboard_path() -> PathBuf {
    dirs::desktop_dir()
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(home_dir)
        .join("clipboard.txt")
}

impl Config {
    /// Directories clients may access before mounts are added.
    pub fn roots(&self) -> Vec<PathBuf> {
        if self.file.roots.is_empty() {
            vec![home_dir()]
        } else {
            self.file.roots.clone()
        }
    }

    /// Effective web UI directory.
    pub fn ui_dir(&self) -> PathBuf {
        self.server
            .ui_dir
            .clone()
            .unwrap_or_else(|| self.daemon.data_dir.join("ui"))
    }

    /// Effective archive scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.archive
            .scratch_dir
            .clone()
            .unwrap_or_else(|| self.daemon.data_dir.join("temp_zips"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.clipboard.poll_interval_ms)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - LANSHARE_TOKEN: Override access token (AUTH_TOKEN is accepted too)
    /// - LANSHARE_PORT: Override listening port
    /// - LANSHARE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        let token = non_empty_env("LANSHARE_TOKEN").or_else(|| non_empty_env("AUTH_TOKEN"));
        if let Some(token) = token {
            tracing::info!("Overriding token from environment");
            self.server.token = Some(token);
        }

        if let Some(port) = non_empty_env("LANSHARE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Overriding port from environment: {}", port);
                    self.server.port = port;
                }
                Err(_) => tracing::warn!("Ignoring invalid LANSHARE_PORT: {}", port),
            }
        }

        if let Some(level) = non_empty_env("LANSHARE_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {}", level);
            self.daemon.log_level = level;
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.file.chunk_size == 0 || self.file.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidChunkSize(self.file.chunk_size));
        }

        if self.file.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(self.file.max_upload_size));
        }

        if self.clipboard.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(
                self.clipboard.poll_interval_ms,
            ));
        }

        if matches!(&self.server.token, Some(token) if token.is_empty()) {
            return Err(ConfigError::EmptyToken);
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
