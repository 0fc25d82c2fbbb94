//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Render a value as a TOML string literal
fn quoted(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

impl Config {
    /// Serialize the full configuration, with comments, as a config file
    pub fn to_toml(&self) -> String {
        format!(
            r#"# scopepad configuration

# Backend base URL (SCOPEPAD_API_URL overrides)
api_url = {api_url}

# Timeout for file operations, in seconds. Program runs are never timed out.
request_timeout_secs = {timeout}

# Where the session token is kept (SCOPEPAD_TOKEN_FILE overrides)
token_path = {token_path}

# Directory that receives downloaded buffers
download_dir = {download_dir}

# Colour scheme: dark, light
theme = "{theme}"

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
# File logging (in addition to TUI buffer or stdout)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix}
"#,
            api_url = quoted(&self.api_url),
            timeout = self.request_timeout_secs,
            token_path = quoted(&self.token_path.to_string_lossy()),
            download_dir = quoted(&self.download_dir.to_string_lossy()),
            theme = self.theme.as_str(),
            log_level = quoted(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = quoted(&self.logging.file_dir.to_string_lossy()),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = quoted(&self.logging.file_prefix),
        )
    }
}
