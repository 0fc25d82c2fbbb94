//! `[logging]` section: filter level and the optional JSON log file

use serde::Deserialize;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// One file for the lifetime of the install
    Never,
}

impl LogRotation {
    /// Unknown values fall back to daily
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Self::Hourly,
            "never" => Self::Never,
            _ => Self::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }

    fn rotation(self) -> Rotation {
        match self {
            Self::Hourly => Rotation::HOURLY,
            Self::Daily => Rotation::DAILY,
            Self::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error; RUST_LOG wins when set
    pub level: String,
    /// Also write JSON lines to `file_dir`
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    /// File names are `<prefix>.<date>` (or just `<prefix>` when never rotated)
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: PathBuf::from("./logs"),
            file_rotation: LogRotation::Daily,
            file_prefix: "scopepad".to_string(),
        }
    }
}

/// `[logging]` as written in the config file; every key optional
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Overlay the file section on the defaults
    pub fn from_file(section: Option<FileLogging>) -> Self {
        let mut config = Self::default();
        let Some(section) = section else {
            return config;
        };
        if let Some(level) = section.level {
            config.level = level;
        }
        if let Some(enabled) = section.file_enabled {
            config.file_enabled = enabled;
        }
        if let Some(dir) = section.file_dir {
            config.file_dir = PathBuf::from(dir);
        }
        if let Some(rotation) = section.file_rotation {
            config.file_rotation = LogRotation::parse(&rotation);
        }
        if let Some(prefix) = section.file_prefix {
            config.file_prefix = prefix;
        }
        config
    }

    /// Default `EnvFilter` directive when RUST_LOG is unset
    pub fn filter_directive(&self) -> String {
        format!("scopepad={}", self.level.trim())
    }

    /// Rolling writer for the JSON log file, creating the directory first
    pub fn file_appender(&self) -> std::io::Result<RollingFileAppender> {
        std::fs::create_dir_all(&self.file_dir)?;
        Ok(RollingFileAppender::new(
            self.file_rotation.rotation(),
            &self.file_dir,
            &self.file_prefix,
        ))
    }
}
