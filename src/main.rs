// scopepad - terminal client for a remote script interpreter
//
// Write programs in a local editor, keep them as named files on the backend,
// and run them on the backend's interpreter.
//
// Architecture:
// - Coordinator: owns session, file list, and run state; every user intent
//   and every finished request goes through it
// - Runtime driver: performs the coordinator's backend calls on tokio tasks
//   and reports completions over an mpsc channel
// - Remote client (reqwest): authenticated JSON calls with token rotation
// - TUI (ratatui): renders coordinator state and turns keys into intents

mod auth;
mod cli;
mod config;
mod coordinator;
mod execution;
mod export;
mod logging;
mod parser;
mod remote;
mod runtime;
mod session;
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use coordinator::Coordinator;
use logging::{LogBuffer, TuiLogLayer};
use parser::SourceParser;
use remote::RemoteClient;
use runtime::Driver;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Interactive mode captures logs into `log_buffer` so they never reach the
/// alternate screen; every other mode writes them to stderr. File logging
/// (JSON, rotated) is added on top when enabled. The returned guard must
/// live until exit so buffered file logs are flushed.
fn init_tracing(config: &Config, log_buffer: &LogBuffer, interactive: bool) -> Option<WorkerGuard> {
    // Precedence: RUST_LOG env var > config file > default "info"
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directive().into());

    let mut guard = None;
    let file_layer = if config.logging.file_enabled {
        match config.logging.file_appender() {
            Ok(appender) => {
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard = Some(file_guard);
                Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_ansi(false),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not create log directory {:?}: {}",
                    config.logging.file_dir, e
                );
                None
            }
        }
    } else {
        None
    };

    let (tui_layer, stderr_layer) = if interactive {
        (Some(TuiLogLayer::new(log_buffer.clone())), None)
    } else {
        (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tui_layer)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config management runs before anything reads the config
    if let Some(Commands::Config { show, reset, path }) = &cli.command {
        return cli::handle_config(*show, *reset, *path);
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();
    let config = Config::from_env()?;

    let interactive = cli.command.is_none() && config.enable_tui;
    let log_buffer = LogBuffer::new();
    let _file_guard = init_tracing(&config, &log_buffer, interactive);

    match cli.command {
        Some(Commands::Login { token }) => return cli::handle_login(&config, &token),
        Some(Commands::Logout) => return cli::handle_logout(&config),
        Some(Commands::Files) => return cli::handle_files(&config).await,
        Some(Commands::Run { path }) => return cli::handle_run(&config, &path).await,
        Some(Commands::Config { .. }) | None => {}
    }

    if !interactive {
        tracing::info!("TUI disabled, nothing to do in headless mode");
        println!("Interactive editor disabled (SCOPEPAD_NO_TUI).");
        println!("Use `scopepad files` or `scopepad run <PATH>`.");
        return Ok(());
    }

    let auth = auth::AuthStore::load(config.token_file());
    let client = RemoteClient::new(&config.api_url, config.request_timeout(), auth.clone())
        .context("Failed to create backend client")?;
    let (driver, completions) = Driver::new(client);
    let coordinator = Coordinator::new(auth, Arc::new(SourceParser));

    tracing::info!(api_url = %config.api_url, "Starting TUI");
    if let Err(e) = tui::run_tui(coordinator, driver, completions, log_buffer, config).await {
        tracing::error!("TUI error: {:?}", e);
        return Err(e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
