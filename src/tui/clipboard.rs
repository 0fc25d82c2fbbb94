//! Copies the output pane to the system clipboard via `arboard`

use anyhow::{bail, Context, Result};
use arboard::Clipboard;

/// Copy program output; returns the number of lines copied.
///
/// Fails without a display server (headless Linux) or when access is denied.
pub fn copy_output(output: &str) -> Result<usize> {
    if output.is_empty() {
        bail!("Nothing to copy");
    }
    // Fresh handle per copy; holding one keeps X11 selections alive
    let mut clipboard = Clipboard::new().context("Clipboard unavailable")?;
    clipboard
        .set_text(output)
        .context("Could not write to clipboard")?;
    Ok(output.lines().count())
}
