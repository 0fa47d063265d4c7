/// Locations of the ShotBundle settings and status files.
///
/// Both live in the per-user config directory (`~/.config/ShotBundle` on Linux,
/// `%APPDATA%\ShotBundle` on Windows, `~/Library/Application Support/ShotBundle`
/// on macOS):
///   - config.toml  Optional shell settings, read (never written) by the program.
///   - status.toml  Written on every state change for external UIs.
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "ShotBundle";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the ShotBundle application data directory.
pub fn app_data_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or_else(|| anyhow!("Could not determine the user config directory"))
}

pub fn config_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

pub fn status_file_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STATUS_FILE_NAME)
}

/// Resolves `path` against the working directory, for display and for handing to
/// the OS file browser.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_app_name() {
        // dirs returns None on systems without a home directory (some CI sandboxes).
        if let Ok(dir) = app_data_dir() {
            assert_eq!(dir.file_name().unwrap(), APP_DIR_NAME);
        }
    }

    #[test]
    fn config_and_status_share_parent() {
        let dir = PathBuf::from("/data/ShotBundle");
        let config = config_file_path(&dir);
        let status = status_file_path(&dir);
        assert_eq!(config.file_name().unwrap(), CONFIG_FILE_NAME);
        assert_eq!(status.file_name().unwrap(), STATUS_FILE_NAME);
        assert_eq!(config.parent(), status.parent());
    }

    #[test]
    fn absolute_resolves_relative_paths() {
        let abs = absolute(Path::new("screenshots"));
        assert!(abs.is_absolute());
        assert!(abs.ends_with("screenshots"));
    }

    #[test]
    fn absolute_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(absolute(dir.path()), dir.path());
    }
}
