/// Screenshot capture: turns one capture request into PNG files in the session folder.
///
/// Displays are reached through a [`DisplaySource`]; [`XcapDisplays`] is the
/// production source backed by the `xcap` crate.  Every display is captured and
/// written independently, so one unplugged or failing monitor never prevents the
/// others from being saved.
use std::path::{Path, PathBuf};

use device_query::{DeviceQuery, DeviceState};
use image::{ImageFormat, RgbaImage};
use log::{debug, info, warn};

use crate::hotkey;

/// Which displays a capture request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Every connected display, in enumeration order.
    AllScreens,
    /// Only the display under the pointer at the moment of capture.
    UnderPointer,
}

impl DisplayMode {
    pub fn from_capture_all(capture_all: bool) -> Self {
        if capture_all {
            DisplayMode::AllScreens
        } else {
            DisplayMode::UnderPointer
        }
    }
}

/// Geometry of one display in global desktop coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DisplayInfo {
    /// Whether `(x, y)` lies inside this display.  Right and bottom edges are exclusive.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        x >= left
            && y >= top
            && x < left + i64::from(self.width)
            && y < top + i64::from(self.height)
    }

    fn from_xcap(monitor: &xcap::Monitor) -> xcap::XCapResult<Self> {
        Ok(Self {
            id: monitor.id()?,
            name: monitor.name()?,
            x: monitor.x()?,
            y: monitor.y()?,
            width: monitor.width()?,
            height: monitor.height()?,
        })
    }
}

/// Access to the OS display list, raster capture and pointer position.
pub trait DisplaySource: Send + Sync {
    fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError>;

    /// Captures the full raster region of `display`.
    fn grab(&self, display: &DisplayInfo) -> Result<RgbaImage, CaptureError>;

    /// Current pointer position, `None` if unknown.
    fn pointer(&self) -> Option<(i32, i32)>;
}

/// Returns the display containing `pointer`, or `None` if the pointer is unknown
/// or lies outside every display.
pub fn display_under_pointer(
    displays: &[DisplayInfo],
    pointer: Option<(i32, i32)>,
) -> Option<&DisplayInfo> {
    let (x, y) = pointer?;
    displays.iter().find(|d| d.contains(x, y))
}

/// Local time with microsecond resolution: `YYYYMMDD_HHMMSS_ffffff`.
pub fn capture_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// `screenshot_<timestamp>.png`, or `screenshot_<timestamp>_screen<N>.png` when
/// capturing every display (`N` is 1-based).
pub fn screenshot_file_name(timestamp: &str, screen: Option<usize>) -> String {
    match screen {
        Some(n) => format!("screenshot_{timestamp}_screen{n}.png"),
        None => format!("screenshot_{timestamp}.png"),
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct CaptureEngine<D: DisplaySource> {
    source: D,
}

impl<D: DisplaySource> CaptureEngine<D> {
    pub fn new(source: D) -> Self {
        Self { source }
    }

    /// Handles one capture request and returns the paths of the files written.
    ///
    /// Does nothing when `running` is false.  Per-display failures are logged and
    /// skipped; they never abort the rest of the request.
    pub fn capture(&self, running: bool, mode: DisplayMode, folder: &Path) -> Vec<PathBuf> {
        if !running {
            debug!("Capture request discarded: no session running");
            return Vec::new();
        }

        let timestamp = capture_timestamp();
        let displays = match self.source.displays() {
            Ok(d) => d,
            Err(e) => {
                warn!("{e}");
                return Vec::new();
            }
        };

        match mode {
            DisplayMode::AllScreens => displays
                .iter()
                .enumerate()
                .filter_map(|(i, display)| {
                    let path = folder.join(screenshot_file_name(&timestamp, Some(i + 1)));
                    self.capture_one(display, &path)
                })
                .collect(),
            DisplayMode::UnderPointer => {
                let Some(display) = display_under_pointer(&displays, self.source.pointer())
                else {
                    debug!("Pointer is not over any display; nothing captured");
                    return Vec::new();
                };
                let path = folder.join(screenshot_file_name(&timestamp, None));
                self.capture_one(display, &path).into_iter().collect()
            }
        }
    }

    fn capture_one(&self, display: &DisplayInfo, path: &Path) -> Option<PathBuf> {
        let result = self.source.grab(display).and_then(|image| {
            image
                .save_with_format(path, ImageFormat::Png)
                .map_err(|source| CaptureError::WriteFailed {
                    path: path.to_path_buf(),
                    source,
                })
        });
        match result {
            Ok(()) => {
                info!("Saved {} ({})", path.display(), display.name);
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!("Skipping display '{}': {e}", display.name);
                None
            }
        }
    }
}

// ── xcap backend ──────────────────────────────────────────────────────────────

/// Displays as reported by `xcap`.  The pointer is asked of the OS at capture
/// time, falling back to the position tracked by the global input hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct XcapDisplays;

impl DisplaySource for XcapDisplays {
    fn displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        Ok(monitors
            .iter()
            .filter_map(|m| match DisplayInfo::from_xcap(m) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Ignoring display with unreadable geometry: {e}");
                    None
                }
            })
            .collect())
    }

    fn grab(&self, display: &DisplayInfo) -> Result<RgbaImage, CaptureError> {
        let unavailable = |reason: String| CaptureError::DisplayUnavailable {
            display: display.name.clone(),
            reason,
        };
        // Re-resolve by id: the display may have been unplugged since enumeration.
        let monitors = xcap::Monitor::all().map_err(|e| unavailable(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| m.id().ok() == Some(display.id))
            .ok_or_else(|| unavailable("display disconnected".to_string()))?;
        monitor.capture_image().map_err(|e| unavailable(e.to_string()))
    }

    fn pointer(&self) -> Option<(i32, i32)> {
        resolve_pointer(live_pointer(), hotkey::pointer_position)
    }
}

/// Cursor position straight from the OS, or `None` when it cannot be queried
/// (no X display, or macOS without the accessibility permission).
fn live_pointer() -> Option<(i32, i32)> {
    let state = DeviceState::checked_new()?;
    Some(state.get_mouse().coords)
}

/// Prefers the live position; `tracked` is only consulted when that is unavailable.
fn resolve_pointer(
    live: Option<(i32, i32)>,
    tracked: impl FnOnce() -> Option<(i32, i32)>,
) -> Option<(i32, i32)> {
    live.or_else(tracked)
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate displays: {0}")]
    Enumeration(String),

    #[error("Display '{display}' unavailable: {reason}")]
    DisplayUnavailable { display: String, reason: String },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

// ── Test fakes ────────────────────────────────────────────────────────────────


// ── Tests ─────────────────────────────────────────────────────────────────────
