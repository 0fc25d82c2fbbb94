//! Configuration for the editor client
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/scopepad/config.toml)
//! 3. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::TokenFile;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod observability;
mod serialization;


pub use observability::{FileLogging, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Theme
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    /// Parse theme string from config (unknown values fall back to dark)
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "light" => Self::Light,
            _ => Self::Dark,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL (interpreter and file storage)
    pub api_url: String,

    /// Timeout for file operations. Program runs have none; they end when
    /// the server answers or the user stops them.
    pub request_timeout_secs: u64,

    /// Where the session token is persisted
    pub token_path: PathBuf,

    /// Target directory for buffer downloads
    pub download_dir: PathBuf,

    /// Whether to start the TUI (disabled for headless mode)
    pub enable_tui: bool,

    /// Colour scheme
    pub theme: ThemeMode,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_path: default_token_path(),
            download_dir: PathBuf::from("."),
            enable_tui: true,
            theme: ThemeMode::Dark,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_token_path() -> PathBuf {
    TokenFile::default_path().unwrap_or_else(|| PathBuf::from("scopepad-token.json"))
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub token_path: Option<String>,
    pub download_dir: Option<String>,
    pub theme: Option<String>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/scopepad/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("scopepad").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };
        if path.exists() {
            return;
        }
        if let Err(e) = Self::default().write_to(&path) {
            // Config is optional
            tracing::debug!("Could not write config template: {:#}", e);
        }
    }

    /// Write this config as TOML, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Read a config file. A missing file yields defaults; a broken one is an
    /// error so the user fixes it instead of debugging silently ignored keys.
    pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => Err(e).with_context(|| format!("Cannot read config file {}", path.display())),
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) => Self::load_file_config(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::from_sources(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with environment lookups
    pub(crate) fn from_sources(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // API URL: env > file > default
        let api_url = env("SCOPEPAD_API_URL")
            .or(file.api_url)
            .unwrap_or(defaults.api_url);

        let request_timeout_secs = file
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.request_timeout_secs);

        // Token file: env > file > default
        let token_path = env("SCOPEPAD_TOKEN_FILE")
            .or(file.token_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.token_path);

        let download_dir = file
            .download_dir
            .map(PathBuf::from)
            .unwrap_or(defaults.download_dir);

        // TUI toggle: env only (runtime flag)
        let enable_tui = env("SCOPEPAD_NO_TUI")
            .map(|v| v != "1" && v.to_lowercase() != "true")
            .unwrap_or(true);

        let theme = file
            .theme
            .map(|s| ThemeMode::parse(&s))
            .unwrap_or(defaults.theme);

        let logging = LoggingConfig::from_file(file.logging);

        Self {
            api_url,
            request_timeout_secs,
            token_path,
            download_dir,
            enable_tui,
            theme,
            logging,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_file(&self) -> TokenFile {
        TokenFile::new(&self.token_path)
    }
}
