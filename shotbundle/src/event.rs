use std::path::PathBuf;

use crate::config::Config;
use crate::console::UiCommand;

pub enum AppEvent {
    /// A command from the UI shell (start/stop toggle, options, reveal folder).
    Command(UiCommand),
    /// The Ctrl + Space chord was newly satisfied on the global hook thread.
    CaptureRequested,
    /// The global input hook died while a session was listening; carries the reason.
    HotkeyFailed(String),
    /// A capture admitted earlier has finished writing its files.
    CaptureFinished(Vec<PathBuf>),
    /// The settings file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received or the UI asked to quit; stop the session and exit.
    Shutdown,
}
