/// Line-oriented terminal front end.
///
/// Stands in for a windowed UI: a Start/Stop toggle, a "capture all screens"
/// option and an "open folder" action.  Input is read on a dedicated thread
/// (blocking stdin reads would otherwise stall the event loop) and forwarded as
/// [`AppEvent::Command`]s.
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::event::AppEvent;

pub const TITLE: &str = "ScreenshotBundle";
pub const INSTRUCTION: &str = "Press Ctrl + Space to take a screenshot";

const HELP: &str = "\
Commands:
  start | stop       start or stop a capture session
  toggle (or Enter)  start if stopped, stop if running
  all on | all off   capture every screen / only the screen under the pointer
  open               open the screenshots folder
  status             show the current state
  help               show this list
  quit               stop and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Start,
    Stop,
    Toggle,
    SetCaptureAll(bool),
    OpenFolder,
    Status,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}' (type 'help' for a list)")]
    Unknown(String),

    #[error("Usage: all on | all off")]
    BadCaptureAllArgument,
}

/// Parses one input line.  Matching is case-insensitive; a blank line toggles.
pub fn parse_command(line: &str) -> Result<UiCommand, CommandError> {
    let lower = line.trim().to_lowercase();
    let mut words = lower.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(UiCommand::Toggle);
    };
    let command = match head {
        "start" => UiCommand::Start,
        "stop" => UiCommand::Stop,
        "toggle" => UiCommand::Toggle,
        "all" => match (words.next(), words.next()) {
            (Some("on" | "yes" | "true"), None) => UiCommand::SetCaptureAll(true),
            (Some("off" | "no" | "false"), None) => UiCommand::SetCaptureAll(false),
            _ => return Err(CommandError::BadCaptureAllArgument),
        },
        "open" => UiCommand::OpenFolder,
        "status" => UiCommand::Status,
        "help" | "?" => UiCommand::Help,
        "quit" | "exit" | "q" => UiCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    if head != "all" && words.next().is_some() {
        return Err(CommandError::Unknown(line.trim().to_string()));
    }
    Ok(command)
}

/// Spawns the stdin reader thread.  End of input is treated as `quit`.
pub fn spawn(tx: mpsc::Sender<AppEvent>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let event = match parse_command(&line) {
                    Ok(UiCommand::Quit) => AppEvent::Shutdown,
                    Ok(cmd) => AppEvent::Command(cmd),
                    Err(e) => {
                        eprintln!("{e}");
                        continue;
                    }
                };
                if tx.blocking_send(event).is_err() {
                    return;
                }
            }
            let _ = tx.blocking_send(AppEvent::Shutdown);
        })
}

// ── Notices ───────────────────────────────────────────────────────────────────

/// Something the user should see, independent of the log filter.
#[derive(Debug)]
pub enum Notice<'a> {
    Banner,
    Help,
    SessionStarted(&'a Path),
    SessionStopped(&'a Path),
    AlreadyStopped,
    CaptureCompleted(&'a [PathBuf]),
    CaptureAll(bool),
    State {
        running: bool,
        capture_all: bool,
        folder: &'a Path,
    },
    PermissionDenied(&'a str),
    HotkeyLost(&'a str),
    Error(&'a str),
}

pub fn render(notice: &Notice<'_>) -> String {
    match notice {
        Notice::Banner => format!("{TITLE}\n{INSTRUCTION}\nType 'help' for commands."),
        Notice::Help => HELP.to_string(),
        Notice::SessionStarted(folder) => {
            format!("Started. Screenshots go to {}", folder.display())
        }
        Notice::SessionStopped(folder) => {
            format!("Stopped. Screenshots kept in {}", folder.display())
        }
        Notice::AlreadyStopped => "Not running.".to_string(),
        Notice::CaptureCompleted([]) => "Capture produced no files.".to_string(),
        Notice::CaptureCompleted(files) => {
            let names: Vec<String> = files
                .iter()
                .map(|f| {
                    f.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| f.display().to_string())
                })
                .collect();
            format!("Saved {} file(s): {}", files.len(), names.join(", "))
        }
        Notice::CaptureAll(true) => "Capture all screens: on".to_string(),
        Notice::CaptureAll(false) => "Capture all screens: off (screen under pointer)".to_string(),
        Notice::State {
            running,
            capture_all,
            folder,
        } => format!(
            "{} | capture all screens: {} | folder: {}",
            if *running { "Running" } else { "Stopped" },
            if *capture_all { "on" } else { "off" },
            folder.display()
        ),
        Notice::PermissionDenied(reason) => format!(
            "Cannot listen for Ctrl + Space: the system denied access to global keyboard input.\n\
             Grant input monitoring / accessibility permission and press Start again.\n({reason})"
        ),
        Notice::HotkeyLost(reason) => format!(
            "Ctrl + Space stopped working and the session was stopped.\n\
             Press Start to try again.\n({reason})"
        ),
        Notice::Error(message) => format!("Error: {message}"),
    }
}

pub fn notify(notice: Notice<'_>) {
    println!("{}", render(&notice));
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_command ─────────────────────────────────────────────────────────

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("start"), Ok(UiCommand::Start));
        assert_eq!(parse_command("stop"), Ok(UiCommand::Stop));
        assert_eq!(parse_command("toggle"), Ok(UiCommand::Toggle));
        assert_eq!(parse_command("open"), Ok(UiCommand::OpenFolder));
        assert_eq!(parse_command("status"), Ok(UiCommand::Status));
        assert_eq!(parse_command("help"), Ok(UiCommand::Help));
        assert_eq!(parse_command("quit"), Ok(UiCommand::Quit));
        assert_eq!(parse_command("q"), Ok(UiCommand::Quit));
    }

    #[test]
    fn blank_line_toggles() {
        assert_eq!(parse_command(""), Ok(UiCommand::Toggle));
        assert_eq!(parse_command("   \t"), Ok(UiCommand::Toggle));
    }

    #[test]
    fn commands_are_case_and_space_insensitive() {
        assert_eq!(parse_command("  START \n"), Ok(UiCommand::Start));
        assert_eq!(parse_command("All   On"), Ok(UiCommand::SetCaptureAll(true)));
    }

    #[test]
    fn capture_all_arguments() {
        assert_eq!(parse_command("all on"), Ok(UiCommand::SetCaptureAll(true)));
        assert_eq!(parse_command("all off"), Ok(UiCommand::SetCaptureAll(false)));
        assert_eq!(parse_command("all"), Err(CommandError::BadCaptureAllArgument));
        assert_eq!(parse_command("all maybe"), Err(CommandError::BadCaptureAllArgument));
        assert_eq!(parse_command("all on off"), Err(CommandError::BadCaptureAllArgument));
    }

    #[test]
    fn unknown_and_trailing_words_are_rejected() {
        assert_eq!(parse_command("snap"), Err(CommandError::Unknown("snap".into())));
        assert!(parse_command("start now").is_err());
    }

    // ── render ────────────────────────────────────────────────────────────────

    #[test]
    fn banner_has_title_and_instruction() {
        let text = render(&Notice::Banner);
        assert!(text.contains("ScreenshotBundle"));
        assert!(text.contains("Ctrl + Space"));
    }

    #[test]
    fn capture_completed_lists_file_names() {
        let files = vec![
            PathBuf::from("shots/session_1/screenshot_a_screen1.png"),
            PathBuf::from("shots/session_1/screenshot_a_screen2.png"),
        ];
        let text = render(&Notice::CaptureCompleted(&files));
        assert!(text.starts_with("Saved 2 file(s)"));
        assert!(text.contains("screenshot_a_screen1.png, screenshot_a_screen2.png"));
        assert!(!text.contains("session_1"));
    }

    #[test]
    fn empty_capture_is_reported() {
        assert_eq!(render(&Notice::CaptureCompleted(&[])), "Capture produced no files.");
    }

    #[test]
    fn permission_denied_includes_reason() {
        let text = render(&Notice::PermissionDenied("EventTapError"));
        assert!(text.contains("denied"));
        assert!(text.contains("EventTapError"));
    }

    #[test]
    fn hotkey_lost_says_session_stopped() {
        let text = render(&Notice::HotkeyLost("event tap disabled"));
        assert!(text.contains("session was stopped"));
        assert!(text.contains("event tap disabled"));
    }

    #[test]
    fn state_line() {
        let text = render(&Notice::State {
            running: true,
            capture_all: false,
            folder: Path::new("screenshots"),
        });
        assert_eq!(text, "Running | capture all screens: off | folder: screenshots");
    }
}
