/// Event dispatch for the main loop.
///
/// [`App`] owns the session manager, the capture engine and the shell settings.
/// Every [`AppEvent`] is handled here one at a time, so session transitions and
/// capture admission are totally ordered.
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::capture::{CaptureEngine, DisplayMode, DisplaySource};
use crate::config::Config;
use crate::console::{self, Notice, UiCommand};
use crate::event::AppEvent;
use crate::hotkey::{HotkeyListener, InputSource};
use crate::paths;
use crate::reveal;
use crate::session::{SessionError, SessionManager};
use crate::status::{self, Status};

/// Whether the loop should keep receiving events after the one just handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct App<S: InputSource, D: DisplaySource> {
    session: SessionManager<S>,
    engine: Arc<CaptureEngine<D>>,
    tx: mpsc::Sender<AppEvent>,
    base_folder: PathBuf,
    capture_all: bool,
    status_path: Option<PathBuf>,
    status: Status,
}

impl<S: InputSource, D: DisplaySource + 'static> App<S, D> {
    pub fn new(
        input: S,
        displays: D,
        config: &Config,
        status_path: Option<PathBuf>,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            session: SessionManager::new(HotkeyListener::new(input, tx.clone())),
            engine: Arc::new(CaptureEngine::new(displays)),
            tx,
            base_folder: config.base_folder.clone(),
            capture_all: config.capture_all_screens,
            status_path,
            status: Status::new(config.capture_all_screens),
        }
    }

    pub fn handle(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Command(UiCommand::Start) => self.start(),
            AppEvent::Command(UiCommand::Stop) => self.stop(),
            AppEvent::Command(UiCommand::Toggle) => {
                if self.session.is_running() {
                    self.stop();
                } else {
                    self.start();
                }
            }

            AppEvent::Command(UiCommand::SetCaptureAll(all)) => {
                self.capture_all = all;
                console::notify(Notice::CaptureAll(all));
                self.publish();
            }

            AppEvent::Command(UiCommand::OpenFolder) => self.open_folder(),

            AppEvent::Command(UiCommand::Status) => {
                let folder = self
                    .session
                    .session()
                    .map(|s| s.folder().to_path_buf())
                    .unwrap_or_else(|| self.base_folder.clone());
                console::notify(Notice::State {
                    running: self.session.is_running(),
                    capture_all: self.capture_all,
                    folder: &paths::absolute(&folder),
                });
            }

            AppEvent::Command(UiCommand::Help) => console::notify(Notice::Help),

            AppEvent::CaptureRequested => self.admit_capture(),

            AppEvent::HotkeyFailed(reason) => {
                if !self.session.is_running() {
                    info!("Hotkey failure after the session ended: {reason}");
                    return Flow::Continue;
                }
                error!("Hotkey lost, stopping session: {reason}");
                self.session.stop_session();
                console::notify(Notice::HotkeyLost(&reason));
                self.status.error = Some(reason);
                self.publish();
            }

            AppEvent::CaptureFinished(files) => {
                console::notify(Notice::CaptureCompleted(&files));
                if !files.is_empty() {
                    self.status.last_capture_files = files;
                    self.status.last_capture_timestamp = Some(chrono::Local::now().to_rfc3339());
                    self.publish();
                }
            }

            AppEvent::ConfigReloaded(new_config) => {
                info!("Config reloaded");
                if new_config.base_folder != self.base_folder {
                    info!(
                        "Base folder is now {} (applies to the next session)",
                        new_config.base_folder.display()
                    );
                }
                if new_config.capture_all_screens != self.capture_all {
                    console::notify(Notice::CaptureAll(new_config.capture_all_screens));
                }
                self.base_folder = new_config.base_folder;
                self.capture_all = new_config.capture_all_screens;
                self.publish();
            }

            // Quit is turned into Shutdown by the console reader.
            AppEvent::Command(UiCommand::Quit) | AppEvent::Shutdown => {
                info!("Shutting down");
                self.session.stop_session();
                self.publish();
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Refreshes the status snapshot from the session and writes it to disk.
    pub fn publish(&mut self) {
        self.status.state = self.session.state().into();
        self.status.capture_all_screens = self.capture_all;
        self.status.session_folder = self.session.session().map(|s| s.folder().to_path_buf());
        self.status.session_started = self.session.session().map(|s| s.started_at().to_rfc3339());
        if let Some(path) = &self.status_path {
            status::write_status(path, &self.status);
        }
    }

    fn start(&mut self) {
        match self.session.start_session(&self.base_folder) {
            Ok(folder) => {
                self.status.error = None;
                console::notify(Notice::SessionStarted(&paths::absolute(&folder)));
            }
            Err(SessionError::AlreadyRunning) => {
                warn!("Start ignored: a session is already running");
            }
            Err(e) => {
                error!("Failed to start session: {e}");
                if e.is_permission_denied() {
                    console::notify(Notice::PermissionDenied(&e.to_string()));
                } else {
                    console::notify(Notice::Error(&e.to_string()));
                }
                self.status.error = Some(e.to_string());
            }
        }
        self.publish();
    }

    fn stop(&mut self) {
        if !self.session.is_running() {
            console::notify(Notice::AlreadyStopped);
            return;
        }
        self.session.stop_session();
        if let Some(s) = self.session.session() {
            console::notify(Notice::SessionStopped(&paths::absolute(s.folder())));
        }
        self.publish();
    }

    fn open_folder(&self) {
        match self.session.current_folder(&self.base_folder) {
            Ok(folder) => {
                if let Err(e) = reveal::reveal_folder(&folder) {
                    warn!("{e:#}");
                    console::notify(Notice::Error(&format!("{e:#}")));
                }
            }
            Err(e) => {
                let message = format!("Cannot create {}: {e}", self.base_folder.display());
                error!("{message}");
                console::notify(Notice::Error(&message));
            }
        }
    }

    /// Hands a capture request to the blocking pool with the folder and mode as of
    /// now.  Requests dequeued after a stop are dropped here, never replayed.
    fn admit_capture(&self) {
        let Some(folder) = self.session.capture_folder().map(|f| f.to_path_buf()) else {
            return;
        };
        let running = self.session.is_running();
        let mode = DisplayMode::from_capture_all(self.capture_all);
        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        // Raster capture and PNG encoding run off both the hook thread and the loop.
        tokio::task::spawn_blocking(move || {
            let written = engine.capture(running, mode, &folder);
            let _ = tx.blocking_send(AppEvent::CaptureFinished(written));
        });
    }
}
