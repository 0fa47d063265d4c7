use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::session::SessionState;

/// Session state as written to the status file.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    /// No session; Ctrl + Space is ignored.
    Stopped,
    /// A session is active and Ctrl + Space captures into its folder.
    Running,
}

impl From<SessionState> for StatusState {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Stopped => StatusState::Stopped,
            SessionState::Running => StatusState::Running,
        }
    }
}

/// Snapshot written to `status.toml` after every state change so another process
/// (a tray icon, a GUI) can follow the session without talking to us directly.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Status {
    /// Binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub state: StatusState,
    pub capture_all_screens: bool,
    /// Active session folder, or the last one after a stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_folder: Option<PathBuf>,
    /// RFC 3339 start time of that session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_started: Option<String>,
    /// Files written by the most recent capture.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_capture_files: Vec<PathBuf>,
    /// RFC 3339 timestamp of the most recent capture, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_capture_timestamp: Option<String>,
    /// Last user-visible error (e.g. hotkey permission denied).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Status {
    pub fn new(capture_all_screens: bool) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: StatusState::Stopped,
            capture_all_screens,
            session_folder: None,
            session_started: None,
            last_capture_files: Vec::new(),
            last_capture_timestamp: None,
            error: None,
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`, creating the parent
/// directory if needed.  Failures are logged; a status write never stops the app.
pub fn write_status(path: &Path, status: &Status) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!("Failed to create status directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                log::warn!("Failed to write status file: {e}");
            }
        }
        Err(e) => log::warn!("Failed to serialize status: {e}"),
    }
}
