use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::event::AppEvent;
use crate::session::DEFAULT_BASE_FOLDER;

/// Shell settings, deserialized from `<config dir>/ShotBundle/config.toml`.
/// The file is optional and never written by the program.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Folder under which `session_*` folders are created.  Relative paths are
    /// resolved against the working directory.
    #[serde(default = "default_base_folder")]
    pub base_folder: PathBuf,
    /// Initial state of the "capture all screens" option.
    #[serde(default)]
    pub capture_all_screens: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_folder: default_base_folder(),
            capture_all_screens: false,
        }
    }
}

fn default_base_folder() -> PathBuf {
    PathBuf::from(DEFAULT_BASE_FOLDER)
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Watches the parent directory of `path`.  Whenever the config file is created or
/// modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<AppEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            log::warn!("Failed to create config watcher: {e}");
            return;
        }
    };

    // Watch the directory, not the file, so editor-style atomic saves
    // (write-new + rename) are seen.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            log::warn!("Config path {} has no parent directory", path.display());
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        log::warn!("Failed to watch config directory {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        if !is_config_write(&event, &path) {
            continue;
        }
        match load_or_default(&path) {
            Ok(config) => {
                if tx.send(AppEvent::ConfigReloaded(config)).await.is_err() {
                    break;
                }
            }
            Err(e) => log::error!("Failed to reload config: {e:#}"),
        }
    }
}

fn is_config_write(event: &notify::Event, path: &Path) -> bool {
    let affects_config = event.paths.iter().any(|p| p == path);
    let is_write = matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    );
    affects_config && is_write
}
