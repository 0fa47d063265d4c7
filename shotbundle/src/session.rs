/// Capture sessions: the running/stopped state machine and the session folder.
///
/// Each started session gets `<base>/session_YYYYMMDD_HHMMSS/`.  Stopping keeps the
/// folder (and its screenshots) on disk and remembers it, so "open folder" still
/// resolves to the last session until the next one starts.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::hotkey::{HotkeyError, HotkeyListener, InputSource};

pub const DEFAULT_BASE_FOLDER: &str = "screenshots";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

/// One start-to-stop interval.  Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    started_at: DateTime<Local>,
    folder: PathBuf,
}

impl Session {
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// `session_YYYYMMDD_HHMMSS` for `at`.
pub fn session_dir_name(at: &DateTime<Local>) -> String {
    format!("session_{}", at.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A session is already running")]
    AlreadyRunning,

    #[error("Failed to create session folder {}: {source}", path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Hotkey(#[from] HotkeyError),
}

impl SessionError {
    /// Whether the OS refused the global keyboard hook.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, SessionError::Hotkey(HotkeyError::PermissionDenied(_)))
    }
}

/// Owns the running flag, the current session and the hotkey listener.
pub struct SessionManager<S: InputSource> {
    state: SessionState,
    session: Option<Session>,
    listener: HotkeyListener<S>,
}

impl<S: InputSource> SessionManager<S> {
    pub fn new(listener: HotkeyListener<S>) -> Self {
        Self {
            state: SessionState::Stopped,
            session: None,
            listener,
        }
    }

    /// Creates a fresh session folder under `base_folder` and starts listening for
    /// the hotkey.  Returns the session folder.
    ///
    /// On any error the manager stays [`SessionState::Stopped`] and the previous
    /// session folder (if any) is still the current one.
    pub fn start_session(&mut self, base_folder: &Path) -> Result<PathBuf, SessionError> {
        if self.state == SessionState::Running {
            return Err(SessionError::AlreadyRunning);
        }

        let started_at = Local::now();
        let folder = base_folder.join(session_dir_name(&started_at));
        let existed = folder.is_dir();
        // create_dir_all tolerates an existing folder (two starts within one second).
        std::fs::create_dir_all(&folder).map_err(|source| SessionError::DirectoryCreateFailed {
            path: folder.clone(),
            source,
        })?;

        if let Err(e) = self.listener.start() {
            if !existed {
                // Only removes the folder if it is still empty.
                if let Err(cleanup) = std::fs::remove_dir(&folder) {
                    debug!("Left session folder {} in place: {cleanup}", folder.display());
                }
            }
            return Err(e.into());
        }
        debug_assert!(self.listener.is_active());

        info!("Session started: {}", folder.display());
        self.session = Some(Session {
            started_at,
            folder: folder.clone(),
        });
        self.state = SessionState::Running;
        Ok(folder)
    }

    /// Stops listening for the hotkey.  A no-op if no session is running.
    pub fn stop_session(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        self.listener.stop();
        self.state = SessionState::Stopped;
        if let Some(session) = &self.session {
            info!("Session stopped: {}", session.folder.display());
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The running session, or the most recent one after a stop.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The folder captures are written to right now; `None` unless running.
    pub fn capture_folder(&self) -> Option<&Path> {
        match self.state {
            SessionState::Running => self.session.as_ref().map(|s| s.folder()),
            SessionState::Stopped => None,
        }
    }

    /// The folder to reveal to the user: the current (or last) session folder if it
    /// still exists, otherwise `base_folder`, created if absent.
    pub fn current_folder(&self, base_folder: &Path) -> std::io::Result<PathBuf> {
        if let Some(session) = &self.session {
            if session.folder.is_dir() {
                return Ok(session.folder.clone());
            }
            warn!(
                "Session folder {} no longer exists; using {}",
                session.folder.display(),
                base_folder.display()
            );
        }
        std::fs::create_dir_all(base_folder)?;
        Ok(base_folder.to_path_buf())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
