/// Global Ctrl + Space listener.
///
/// OS-level input is abstracted as an [`InputSource`] that delivers key events to a
/// subscribed sink.  The production source, [`GlobalHook`], runs `rdev::listen` on a
/// dedicated OS thread so the event loop never blocks on input delivery.  The same
/// hook also records the last pointer position, a fallback for single-screen capture.
///
/// [`HotkeyListener`] owns the chord state and forwards [`AppEvent::CaptureRequested`]
/// once per press transition of the chord, or [`AppEvent::HotkeyFailed`] if the
/// source dies while the listener is active.
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::event::AppEvent;

/// How long `start` waits for the hook thread to report an install failure.
/// `rdev::listen` never signals success, only failure, so silence means installed.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("Permission to install the global keyboard hook was denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to spawn the keyboard hook thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Keys that participate in the capture chord.  Every other key is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordKey {
    ControlLeft,
    ControlRight,
    Space,
}

impl ChordKey {
    fn from_rdev(key: rdev::Key) -> Option<Self> {
        match key {
            rdev::Key::ControlLeft => Some(ChordKey::ControlLeft),
            rdev::Key::ControlRight => Some(ChordKey::ControlRight),
            rdev::Key::Space => Some(ChordKey::Space),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(ChordKey),
    KeyUp(ChordKey),
    /// The source stopped delivering events and will not recover on its own.
    SourceFailed(String),
}

// ── Chord state ───────────────────────────────────────────────────────────────

/// The set of chord keys currently held, plus a latch that suppresses repeat
/// fires while the chord stays satisfied (OS auto-repeat sends more key-downs).
#[derive(Debug, Default)]
pub struct ChordState {
    pressed: HashSet<ChordKey>,
    fired: bool,
}

impl ChordState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key-down.  Returns `true` exactly when this press makes the
    /// chord satisfied after it was not.
    pub fn press(&mut self, key: ChordKey) -> bool {
        self.pressed.insert(key);
        if self.is_satisfied() && !self.fired {
            self.fired = true;
            return true;
        }
        false
    }

    /// Records a key-up.  Re-arms the chord once it is no longer satisfied.
    pub fn release(&mut self, key: ChordKey) {
        self.pressed.remove(&key);
        if !self.is_satisfied() {
            self.fired = false;
        }
    }

    /// Space plus either Control key.
    pub fn is_satisfied(&self) -> bool {
        self.pressed.contains(&ChordKey::Space)
            && (self.pressed.contains(&ChordKey::ControlLeft)
                || self.pressed.contains(&ChordKey::ControlRight))
    }

    pub fn reset(&mut self) {
        self.pressed.clear();
        self.fired = false;
    }
}

// ── Input source seam ─────────────────────────────────────────────────────────

pub type InputSink = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// A registration-style source of global key events.
pub trait InputSource: Send + Sync {
    /// Starts delivering events to `sink`, replacing any previous sink.
    fn subscribe(&self, sink: InputSink) -> Result<(), HotkeyError>;

    /// Stops delivering events.  Safe to call when nothing is subscribed.
    fn unsubscribe(&self);
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Watches an [`InputSource`] for the Ctrl + Space chord.
///
/// One instance lives for the whole program; [`stop`](Self::stop) followed by
/// [`start`](Self::start) begins again from an empty chord state.
pub struct HotkeyListener<S: InputSource> {
    source: S,
    chord: Arc<Mutex<ChordState>>,
    active: Arc<AtomicBool>,
    tx: mpsc::Sender<AppEvent>,
}

impl<S: InputSource> HotkeyListener<S> {
    pub fn new(source: S, tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            source,
            chord: Arc::new(Mutex::new(ChordState::new())),
            active: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Subscribes to the input source.  A no-op if already listening.
    ///
    /// Fails with [`HotkeyError::PermissionDenied`] if the OS refuses the hook; the
    /// listener is then left stopped.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.reset();

        let chord = Arc::clone(&self.chord);
        let active = Arc::clone(&self.active);
        let tx = self.tx.clone();
        let sink: InputSink = Arc::new(move |event: InputEvent| {
            // The chord lock is held across the active check and the send so that
            // `stop` (which takes the same lock) cannot return while a fire is pending.
            let mut chord = chord.lock().unwrap_or_else(PoisonError::into_inner);
            if !active.load(Ordering::SeqCst) {
                return;
            }
            let fire = match event {
                InputEvent::KeyDown(key) => chord.press(key),
                InputEvent::KeyUp(key) => {
                    chord.release(key);
                    false
                }
                InputEvent::SourceFailed(reason) => {
                    if tx.try_send(AppEvent::HotkeyFailed(reason)).is_err() {
                        error!("Event queue unavailable; hotkey failure not reported");
                    }
                    return;
                }
            };
            if fire {
                debug!("Chord Ctrl + Space satisfied");
                // try_send is non-blocking; a full queue drops this request.
                if tx.try_send(AppEvent::CaptureRequested).is_err() {
                    warn!("Event queue unavailable; dropping capture request");
                }
            }
        });

        self.active.store(true, Ordering::SeqCst);
        if let Err(e) = self.source.subscribe(sink) {
            self.active.store(false, Ordering::SeqCst);
            return Err(e);
        }
        info!("Hotkey listener started (Ctrl + Space)");
        Ok(())
    }

    /// Unsubscribes and clears the chord state.  Idempotent.
    ///
    /// Once this returns no further capture requests are sent, even if the chord
    /// keys are still physically held.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.source.unsubscribe();
        self.reset();
        info!("Hotkey listener stopped");
    }

    /// Clears the chord state without touching the subscription.
    pub fn reset(&self) {
        self.chord
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ── Global hook (rdev) ────────────────────────────────────────────────────────

/// Sink receiving events from the hook thread.  `None` while unsubscribed.
static HOOK_SINK: Mutex<Option<InputSink>> = Mutex::new(None);

/// Set while the `rdev::listen` thread is alive.
static HOOK_RUNNING: AtomicBool = AtomicBool::new(false);

/// Serialises hook installation.
static HOOK_INSTALL: Mutex<()> = Mutex::new(());

/// Last pointer position reported by the hook, in global desktop coordinates.
static POINTER: Mutex<Option<(f64, f64)>> = Mutex::new(None);

/// The process-wide OS input hook.
///
/// `rdev` cannot remove a hook once `listen` is running, so the hook thread is
/// installed on first subscription and kept for the life of the process;
/// unsubscribing detaches the sink so no events are delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalHook;

impl GlobalHook {
    fn ensure_installed() -> Result<(), HotkeyError> {
        let _guard = HOOK_INSTALL.lock().unwrap_or_else(PoisonError::into_inner);
        if HOOK_RUNNING.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (err_tx, err_rx) = std::sync::mpsc::sync_channel::<String>(1);
        HOOK_RUNNING.store(true, Ordering::SeqCst);
        let spawned = std::thread::Builder::new()
            .name("hotkey-hook".into())
            .spawn(move || {
                let reason = match rdev::listen(dispatch) {
                    Ok(()) => "input hook exited".to_string(),
                    Err(e) => format!("{e:?}"),
                };
                HOOK_RUNNING.store(false, Ordering::SeqCst);
                error!("Global input hook stopped: {reason}");
                // During startup `ensure_installed` is waiting for this; afterwards
                // the subscribed listener is told instead.
                let _ = err_tx.send(reason.clone());
                deliver(InputEvent::SourceFailed(reason));
            });
        if let Err(e) = spawned {
            HOOK_RUNNING.store(false, Ordering::SeqCst);
            return Err(HotkeyError::Spawn(e));
        }

        match err_rx.recv_timeout(HOOK_STARTUP_GRACE) {
            Ok(reason) => Err(HotkeyError::PermissionDenied(reason)),
            Err(RecvTimeoutError::Timeout) => {
                info!("Global input hook installed");
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => Err(HotkeyError::PermissionDenied(
                "input hook thread exited during startup".to_string(),
            )),
        }
    }
}

impl InputSource for GlobalHook {
    fn subscribe(&self, sink: InputSink) -> Result<(), HotkeyError> {
        Self::ensure_installed()?;
        *HOOK_SINK.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        // A hook that died between install and now found no sink to report to.
        if !HOOK_RUNNING.load(Ordering::SeqCst) {
            HOOK_SINK.lock().unwrap_or_else(PoisonError::into_inner).take();
            return Err(HotkeyError::PermissionDenied(
                "input hook exited during startup".to_string(),
            ));
        }
        Ok(())
    }

    fn unsubscribe(&self) {
        HOOK_SINK.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Hook callback, runs on the `hotkey-hook` thread for every input event.
fn dispatch(event: rdev::Event) {
    let input = match event.event_type {
        rdev::EventType::MouseMove { x, y } => {
            *POINTER.lock().unwrap_or_else(PoisonError::into_inner) = Some((x, y));
            return;
        }
        rdev::EventType::KeyPress(key) => ChordKey::from_rdev(key).map(InputEvent::KeyDown),
        rdev::EventType::KeyRelease(key) => ChordKey::from_rdev(key).map(InputEvent::KeyUp),
        _ => None,
    };
    if let Some(input) = input {
        deliver(input);
    }
}

fn deliver(input: InputEvent) {
    // Clone out of the lock so unsubscribing never waits on a running sink.
    let sink = HOOK_SINK
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(sink) = sink {
        sink(input);
    }
}

/// Last pointer position seen by the hook, or `None` if the pointer has not moved
/// since the hook was installed.  Only a fallback for when the OS cannot be asked
/// directly.
pub fn pointer_position() -> Option<(i32, i32)> {
    POINTER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .map(|(x, y)| (x.round() as i32, y.round() as i32))
}


// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::fake::FakeSource;
    use super::*;

    use super::ChordKey::{ControlLeft, ControlRight, Space};

    fn listener() -> (HotkeyListener<FakeSource>, FakeSource, mpsc::Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel(32);
        let source = FakeSource::default();
        (HotkeyListener::new(source.clone(), tx), source, rx)
    }

    fn drain_requests(rx: &mut mpsc::Receiver<AppEvent>) -> usize {
        let mut n = 0;
        while let Ok(evt) = rx.try_recv() {
            if matches!(evt, AppEvent::CaptureRequested) {
                n += 1;
            }
        }
        n
    }

    // ── ChordState ────────────────────────────────────────────────────────────

    #[test]
    fn left_control_then_space_fires() {
        let mut c = ChordState::new();
        assert!(!c.press(ControlLeft));
        assert!(c.press(Space));
    }

    #[test]
    fn right_control_then_space_fires() {
        let mut c = ChordState::new();
        assert!(!c.press(ControlRight));
        assert!(c.press(Space));
    }

    #[test]
    fn space_then_control_fires() {
        let mut c = ChordState::new();
        assert!(!c.press(Space));
        assert!(c.press(ControlLeft));
    }

    #[test]
    fn space_alone_or_control_alone_never_fires() {
        let mut c = ChordState::new();
        assert!(!c.press(Space));
        c.release(Space);
        assert!(!c.press(ControlLeft));
        assert!(!c.press(ControlRight));
        assert!(!c.is_satisfied());
    }

    #[test]
    fn auto_repeat_while_held_does_not_refire() {
        let mut c = ChordState::new();
        c.press(ControlLeft);
        assert!(c.press(Space));
        for _ in 0..10 {
            assert!(!c.press(Space));
            assert!(!c.press(ControlLeft));
        }
    }

    #[test]
    fn releasing_a_chord_key_rearms() {
        let mut c = ChordState::new();
        c.press(ControlLeft);
        assert!(c.press(Space));
        c.release(Space);
        assert!(c.press(Space));
        c.release(ControlLeft);
        assert!(c.press(ControlLeft));
    }

    #[test]
    fn switching_control_keys_inside_one_interval_fires_once() {
        let mut c = ChordState::new();
        c.press(ControlLeft);
        assert!(c.press(Space));
        assert!(!c.press(ControlRight));
        // Still satisfied through the right Control key.
        c.release(ControlLeft);
        assert!(c.is_satisfied());
        assert!(!c.press(ControlLeft));
    }

    #[test]
    fn release_of_unpressed_key_is_harmless() {
        let mut c = ChordState::new();
        c.release(Space);
        assert!(!c.is_satisfied());
        assert!(!c.press(ControlLeft));
    }

    #[test]
    fn reset_clears_keys_and_latch() {
        let mut c = ChordState::new();
        c.press(ControlLeft);
        c.press(Space);
        c.reset();
        assert!(!c.is_satisfied());
        c.press(ControlLeft);
        assert!(c.press(Space));
    }

    // ── ChordKey::from_rdev ───────────────────────────────────────────────────

    #[test]
    fn from_rdev_maps_chord_keys_only() {
        assert_eq!(ChordKey::from_rdev(rdev::Key::ControlLeft), Some(ControlLeft));
        assert_eq!(ChordKey::from_rdev(rdev::Key::ControlRight), Some(ControlRight));
        assert_eq!(ChordKey::from_rdev(rdev::Key::Space), Some(Space));
        assert_eq!(ChordKey::from_rdev(rdev::Key::KeyA), None);
        assert_eq!(ChordKey::from_rdev(rdev::Key::ShiftLeft), None);
    }

    // ── HotkeyListener ────────────────────────────────────────────────────────

    #[test]
    fn listener_sends_one_request_per_press_transition() {
        let (l, src, mut rx) = listener();
        l.start().unwrap();

        src.emit(InputEvent::KeyDown(ControlLeft));
        src.emit(InputEvent::KeyDown(Space));
        src.emit(InputEvent::KeyDown(Space));
        src.emit(InputEvent::KeyDown(Space));
        assert_eq!(drain_requests(&mut rx), 1);

        src.emit(InputEvent::KeyUp(Space));
        src.emit(InputEvent::KeyDown(Space));
        assert_eq!(drain_requests(&mut rx), 1);
    }

    #[test]
    fn listener_ignores_events_before_start() {
        let (l, src, mut rx) = listener();
        src.emit(InputEvent::KeyDown(ControlLeft));
        src.emit(InputEvent::KeyDown(Space));
        assert_eq!(drain_requests(&mut rx), 0);
        assert!(!l.is_active());
    }

    #[test]
    fn no_requests_after_stop_even_with_keys_held() {
        let (l, src, mut rx) = listener();
        l.start().unwrap();
        src.emit(InputEvent::KeyDown(ControlLeft));
        let stale = src.current_sink().unwrap();

        l.stop();
        assert!(src.current_sink().is_none());

        // A callback already in flight on the hook thread must not fire either.
        stale(InputEvent::KeyDown(Space));
        assert_eq!(drain_requests(&mut rx), 0);
    }

    #[test]
    fn restart_begins_with_empty_chord_state() {
        let (l, src, mut rx) = listener();
        l.start().unwrap();
        src.emit(InputEvent::KeyDown(ControlLeft));
        l.stop();

        l.start().unwrap();
        // Control was pressed in the previous run; Space alone must not fire.
        src.emit(InputEvent::KeyDown(Space));
        assert_eq!(drain_requests(&mut rx), 0);

        src.emit(InputEvent::KeyDown(ControlRight));
        assert_eq!(drain_requests(&mut rx), 1);
    }

    #[test]
    fn start_twice_subscribes_once() {
        let (l, src, _rx) = listener();
        l.start().unwrap();
        l.start().unwrap();
        assert_eq!(src.subscribes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let (l, _src, _rx) = listener();
        l.stop();
        l.start().unwrap();
        l.stop();
        l.stop();
        assert!(!l.is_active());
    }

    #[test]
    fn permission_denied_is_surfaced_and_leaves_listener_stopped() {
        let (tx, _rx) = mpsc::channel(8);
        let l = HotkeyListener::new(FakeSource::denying(), tx);
        let err = l.start().unwrap_err();
        assert!(matches!(err, HotkeyError::PermissionDenied(_)));
        assert!(err.to_string().contains("not trusted"));
        assert!(!l.is_active());
    }

    #[test]
    fn full_queue_drops_request_without_panicking() {
        let (tx, mut rx) = mpsc::channel(1);
        let src = FakeSource::default();
        let l = HotkeyListener::new(src.clone(), tx);
        l.start().unwrap();
        for _ in 0..3 {
            src.emit(InputEvent::KeyDown(ControlLeft));
            src.emit(InputEvent::KeyDown(Space));
            src.emit(InputEvent::KeyUp(Space));
        }
        assert_eq!(drain_requests(&mut rx), 1);
    }

    #[test]
    fn source_failure_is_forwarded_while_active() {
        let (l, src, mut rx) = listener();
        l.start().unwrap();
        src.emit(InputEvent::SourceFailed("event tap disabled".into()));

        match rx.try_recv() {
            Ok(AppEvent::HotkeyFailed(reason)) => assert_eq!(reason, "event tap disabled"),
            _ => panic!("expected HotkeyFailed"),
        }
        // The listener itself keeps its state; the event loop decides what to stop.
        assert!(l.is_active());
    }

    #[test]
    fn source_failure_after_stop_is_not_reported() {
        let (l, src, mut rx) = listener();
        l.start().unwrap();
        let stale = src.current_sink().unwrap();
        l.stop();

        stale(InputEvent::SourceFailed("event tap disabled".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_while_events_are_being_delivered() {
        let (l, src, _rx) = listener();
        l.start().unwrap();
        let sink = src.current_sink().unwrap();
        let pump = std::thread::spawn(move || {
            for _ in 0..1_000 {
                sink(InputEvent::KeyDown(ControlLeft));
                sink(InputEvent::KeyDown(Space));
                sink(InputEvent::KeyUp(Space));
            }
        });
        l.stop();
        pump.join().unwrap();
        assert!(!l.is_active());
    }
}
