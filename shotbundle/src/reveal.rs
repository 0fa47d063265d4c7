/// Opens a folder in the platform file browser.
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use crate::paths;

/// Program used to open a folder on this platform.
pub fn browser_command() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Launches the file browser on `folder` without waiting for it to exit.
pub fn reveal_folder(folder: &Path) -> Result<()> {
    let folder = paths::absolute(folder);
    let program = browser_command();
    let mut child = Command::new(program)
        .arg(&folder)
        .spawn()
        .with_context(|| format!("Failed to launch {program} for {}", folder.display()))?;

    // Reap the launcher in the background so it does not linger as a zombie.
    std::thread::Builder::new()
        .name("reveal-folder".into())
        .spawn(move || {
            let _ = child.wait();
        })
        .context("Failed to spawn reveal thread")?;
    log::info!("Opened {} with {program}", folder.display());
    Ok(())
}
