//! Local download of the open buffer

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::session::File;

/// `<basename>.txt`, or `untitled.txt` for a buffer without a title
pub fn download_name(file: &File) -> String {
    let base = file.basename().trim();
    if base.is_empty() {
        "untitled.txt".to_string()
    } else {
        format!("{}.txt", base)
    }
}

/// Write the buffer's code under `dir`, replacing any earlier download
pub fn write_download(dir: &Path, file: &File) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create download directory {}", dir.display()))?;

    let path = dir.join(download_name(file));
    std::fs::write(&path, &file.code)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Downloaded {} to {}", file.title, path.display());
    Ok(path)
}
