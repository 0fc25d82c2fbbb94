// CLI module - command-line argument parsing and handlers
//
// Provides subcommands besides the interactive editor:
// - config --show / --path / --reset: configuration management
// - login / logout: manage the persisted session token
// - files: list the logged-in user's files
// - run <PATH>: execute a local source file (Ctrl+C stops it)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{AuthStore, Token};
use crate::config::{Config, VERSION};
use crate::coordinator::{
    Coordinator, Notice, STATUS_ABORTED, STATUS_ERROR, STATUS_STARTING, STATUS_SUCCESS,
};
use crate::execution::{ExecutionController, RunOutcome};
use crate::parser::SourceParser;
use crate::remote::{RemoteClient, RemoteError};
use crate::runtime::{self, Driver};

/// scopepad - terminal client for the scripting IDE backend
#[derive(Parser)]
#[command(name = "scopepad")]
#[command(version = VERSION)]
#[command(about = "Write, save and run scripts against a remote interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Store an access token and start a session
    Login {
        /// Bearer token issued by the backend
        #[arg(long)]
        token: String,
    },

    /// Forget the stored access token
    Logout,

    /// List your files
    Files,

    /// Run a local source file
    Run {
        /// File to execute
        path: PathBuf,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

pub fn handle_config(show: bool, reset: bool, path: bool) -> Result<()> {
    if path {
        handle_config_path()
    } else if show {
        handle_config_show()
    } else if reset {
        handle_config_reset()
    } else {
        // No flag provided, show help
        println!("Usage: scopepad config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
        Ok(())
    }
}

fn config_path() -> Result<PathBuf> {
    Config::config_path().context("Could not determine config path")
}

fn handle_config_path() -> Result<()> {
    println!("{}", config_path()?.display());
    Ok(())
}

fn handle_config_show() -> Result<()> {
    let config = Config::from_env()?;

    println!("# Effective configuration (env > file > defaults)");
    println!();
    print!("{}", config.to_toml());

    println!();
    let path = config_path()?;
    if path.exists() {
        println!("# Source: {}", path.display());
    } else {
        println!("# Source: defaults (no config file)");
    }
    Ok(())
}

fn handle_config_reset() -> Result<()> {
    let path = config_path()?;

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    Config::default().write_to(&path)?;
    println!("Config reset to defaults: {}", path.display());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

pub fn handle_login(config: &Config, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }
    let auth = AuthStore::load(config.token_file());
    auth.login(Token::new(token));
    println!("Logged in. Token stored at {}", config.token_path.display());
    Ok(())
}

pub fn handle_logout(config: &Config) -> Result<()> {
    let auth = AuthStore::load(config.token_file());
    if !auth.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    auth.clear();
    println!("Logged out.");
    Ok(())
}

fn client_for(config: &Config, auth: AuthStore) -> Result<RemoteClient> {
    RemoteClient::new(&config.api_url, config.request_timeout(), auth)
        .context("Failed to create backend client")
}

pub async fn handle_files(config: &Config) -> Result<()> {
    let auth = AuthStore::load(config.token_file());
    if !auth.is_authenticated() {
        bail!("Not logged in. Run `scopepad login --token <TOKEN>` first.");
    }

    let client = client_for(config, auth.clone())?;
    let (driver, mut rx) = Driver::new(client);
    let mut coordinator = Coordinator::new(auth, Arc::new(SourceParser));

    let initial = coordinator.startup();
    runtime::settle(&mut coordinator, &driver, &mut rx, initial).await;

    for notice in coordinator.take_notices() {
        match notice {
            Notice::SessionExpired | Notice::RequestFailed { .. } => bail!("{}", notice),
            _ => {}
        }
    }

    if coordinator.files().is_empty() {
        println!("No files yet.");
    }
    for file in coordinator.files().iter() {
        println!("{}\t{}", file.id, file.title);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle_run(config: &Config, path: &Path) -> Result<()> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let auth = AuthStore::load(config.token_file());
    let epoch = auth.epoch();
    let client = client_for(config, auth.clone())?;

    let mut execution = ExecutionController::new();
    let ticket = execution.run(&code, &SourceParser)?;
    eprintln!("{}", STATUS_STARTING);

    let mut request = {
        let client = client.clone();
        let program = ticket.program.clone();
        let cancel = ticket.cancel.clone();
        tokio::spawn(async move { client.execute(&program, &cancel).await })
    };

    let result = tokio::select! {
        joined = &mut request => joined.context("Run task failed")?,
        _ = tokio::signal::ctrl_c() => {
            execution.stop();
            // Let the request observe the cancellation before exiting
            let _ = request.await;
            eprintln!("{}", STATUS_ABORTED);
            return Ok(());
        }
    };

    match execution.complete(ticket.run, result) {
        Some(RunOutcome::Finished { output, error }) => {
            println!("{}", output);
            if error {
                bail!(STATUS_ERROR);
            }
            eprintln!("{}", STATUS_SUCCESS);
            Ok(())
        }
        Some(RunOutcome::Failed(RemoteError::Unauthorized)) => {
            auth.expire(epoch);
            bail!("Access expired. Please log in again.")
        }
        Some(RunOutcome::Failed(RemoteError::Cancelled(_))) => {
            eprintln!("{}", STATUS_ABORTED);
            Ok(())
        }
        Some(RunOutcome::Failed(e)) => Err(e).context("Run failed"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_path() {
        let cli = Cli::try_parse_from(["scopepad", "run", "main.sc"]).unwrap();
        match cli.command {
            Some(Commands::Run { path }) => assert_eq!(path, PathBuf::from("main.sc")),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn login_requires_token() {
        assert!(Cli::try_parse_from(["scopepad", "login"]).is_err());
    }

    #[test]
    fn login_and_logout_manage_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            token_path: dir.path().join("token.json"),
            ..Config::default()
        };

        handle_login(&config, " abc ").unwrap();
        assert_eq!(
            config.token_file().read().unwrap(),
            Some(Token::new("abc"))
        );

        handle_logout(&config).unwrap();
        assert_eq!(config.token_file().read().unwrap(), None);
    }

    #[test]
    fn blank_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            token_path: dir.path().join("token.json"),
            ..Config::default()
        };
        assert!(handle_login(&config, "  ").is_err());
    }
}
