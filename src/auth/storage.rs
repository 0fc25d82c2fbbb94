// Token persistence - keeps the session alive across restarts
//
// The token lives in a small JSON file next to the config. A missing file
// means anonymous mode.

use super::Token;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: ~/.config/scopepad/token.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("scopepad").join("token.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Option<Token>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let token: Token = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed token file {}", self.path.display()))?;
        if token.access_token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(token))
    }

    pub fn write(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create token directory")?;
        }
        let json = serde_json::to_string(token).context("Failed to serialize token")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
