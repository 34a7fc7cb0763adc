//! LanShare Daemon
//!
//! Shares a directory tree and a text clipboard with browsers on the LAN.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lanshare::config::Config;
use lanshare::files::TempArtifactRegistry;
use lanshare::net;
use lanshare::orchestrator::DaemonOrchestrator;
use lanshare::ui::{self, AccessUrls};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// LanShare - share files and a clipboard over the local network.
#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start serving
    Start {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(long, short)]
        port: Option<u16>,

        /// Access token (overrides config and environment)
        #[arg(long)]
        token: Option<String>,

        /// Do not print the QR code
        #[arg(long)]
        no_qr: bool,
    },

    /// Print the access QR code for the configured token
    Qr {
        /// Write a PNG instead of printing to the terminal
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Remove leftover download archives
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    if let Commands::Start {
        host, port, token, ..
    } = &cli.command
    {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(token) = token {
            config.server.token = Some(token.clone());
        }
    }

    let _log_guard = init_tracing(&config, cli.verbose);
    if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
    }

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Start { no_qr, .. } => {
            let mut orchestrator = DaemonOrchestrator::new(config)?;
            let addr = orchestrator.start().await?;

            let ip = net::lan_ip().to_string();
            let urls = AccessUrls::new(&ip, addr.port(), orchestrator.token().as_str());
            println!("{}", ui::banner(&urls, !no_qr));

            wait_for_shutdown_signal().await?;
            orchestrator.stop().await?;
        }
        Commands::Qr { output } => {
            let Some(token) = config.server.token.as_deref() else {
                anyhow::bail!(
                    "No access token configured; the token is generated at startup. \
                     Set server.token or LANSHARE_TOKEN to print a stable QR code."
                );
            };

            let ip = net::lan_ip().to_string();
            let urls = AccessUrls::new(&ip, config.server.port, token);

            match output {
                Some(path) => {
                    ui::generate_png_qr(&urls.network, &path)?;
                    println!("QR code saved to: {}", path.display());
                }
                None => {
                    println!("{}", ui::generate_terminal_qr(&urls.network)?);
                    println!("{}", urls.network);
                }
            }
        }
        Commands::Cleanup => {
            let registry = TempArtifactRegistry::new(config.scratch_dir());
            let removed = registry.sweep_stale();
            println!(
                "Removed {} archive(s) from {}",
                removed,
                registry.scratch_dir().display()
            );
        }
    }

    Ok(())
}

/// Install the stderr subscriber and, with `log_dir` set, a daily log file.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &Config, verbose: bool) -> Option<WorkerGuard> {
    let level = if verbose {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match &config.daemon.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "lanshare.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Wait for SIGTERM or SIGINT.
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }

    Ok(())
}
