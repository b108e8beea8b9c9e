//! Global modifier listener using macOS CGEventTap
//!
//! Monitors system-wide `FlagsChanged` events and forwards modifier
//! snapshots. Runs on a dedicated thread with its own CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::info;

use super::keys::ModifierState;

/// Events sent from the listener to the beeper service
#[derive(Debug, Clone)]
pub enum HotkeyEvent {
    /// Modifier state has changed
    ModifierChanged(ModifierState),
    /// Event tap was disabled by macOS and has been re-enabled
    TapDisabled,
    /// The listener thread has exited
    Stopped,
}

/// Body of the listener thread.
///
/// Must report on `ready` exactly once: `Ok` once the tap is live, or the
/// setup error. Returns when `running` goes false or events can't be sent.
type EventLoop =
    fn(mpsc::Sender<HotkeyEvent>, Arc<AtomicBool>, SyncSender<Result<(), HotkeyError>>);

/// Global listener that observes modifier press/release events
pub struct HotkeyListener {
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new listener
    pub fn new(event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the listener
    ///
    /// Spawns a dedicated thread that creates the event tap and runs a
    /// CFRunLoop for its callbacks. Returns once the tap is live, or with
    /// the reason it could not be created. The listener runs until `stop()`
    /// is called or the program exits.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if !cfg!(target_os = "macos") {
            return Err(HotkeyError::Unsupported);
        }
        self.start_with(run_event_loop)
    }

    fn start_with(&self, event_loop: EventLoop) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        let spawned = thread::Builder::new()
            .name("modifier-listener".to_string())
            .spawn(move || {
                event_loop(event_tx.clone(), Arc::clone(&running), ready_tx);

                running.store(false, Ordering::SeqCst);
                // Receiver may already be gone during shutdown
                let _ = event_tx.blocking_send(HotkeyEvent::Stopped);
                info!("modifier listener thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::ThreadSpawn(e.to_string()));
        }

        let result = ready_rx
            .recv()
            .unwrap_or(Err(HotkeyError::ExitedDuringSetup));
        if result.is_err() {
            self.running.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Stop the listener; the run loop exits within one polling slice
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("modifier listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("listener thread exited before the event tap was ready")]
    ExitedDuringSetup,

    #[error("global modifier observation is only available on macOS")]
    Unsupported,
}

#[cfg(target_os = "macos")]
fn run_event_loop(
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
    ready: SyncSender<Result<(), HotkeyError>>,
) {
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType,
    };
    use tracing::{debug, error, warn};

    enum TapMessage {
        Flags(ModifierState),
        Disabled,
    }

    info!("modifier listener thread started");

    let mut last_state = ModifierState::default();

    // The tap callback must stay fast, so it only forwards to this thread
    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapMessage>();

    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::FlagsChanged => {
                let state = ModifierState::from_flags(event.get_flags());
                let _ = callback_tx.send(TapMessage::Flags(state));
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = callback_tx.send(TapMessage::Disabled);
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::FlagsChanged],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready.send(Err(HotkeyError::EventTapCreation));
            return;
        }
    };

    tap.enable();

    let run_loop_source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            error!("failed to create run loop source for the event tap");
            let _ = ready.send(Err(HotkeyError::EventTapCreation));
            return;
        }
    };
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("event tap created and enabled");
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        while let Ok(message) = callback_rx.try_recv() {
            let event = match message {
                TapMessage::Flags(new_state) if new_state != last_state => {
                    debug!(%last_state, %new_state, "modifier state changed");
                    last_state = new_state;
                    HotkeyEvent::ModifierChanged(new_state)
                }
                TapMessage::Flags(_) => continue,
                TapMessage::Disabled => {
                    warn!("event tap disabled by the system, re-enabling");
                    tap.enable();
                    HotkeyEvent::TapDisabled
                }
            };

            // Not in an async context here
            if event_tx.blocking_send(event).is_err() {
                warn!("failed to send modifier event - channel closed?");
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(
    _event_tx: mpsc::Sender<HotkeyEvent>,
    _running: Arc<AtomicBool>,
    ready: SyncSender<Result<(), HotkeyError>>,
) {
    let _ = ready.send(Err(HotkeyError::Unsupported));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tap_denied(
        _tx: mpsc::Sender<HotkeyEvent>,
        _running: Arc<AtomicBool>,
        ready: SyncSender<Result<(), HotkeyError>>,
    ) {
        let _ = ready.send(Err(HotkeyError::EventTapCreation));
    }

    fn tap_until_stopped(
        _tx: mpsc::Sender<HotkeyEvent>,
        running: Arc<AtomicBool>,
        ready: SyncSender<Result<(), HotkeyError>>,
    ) {
        let _ = ready.send(Ok(()));
        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn dies_before_ready(
        _tx: mpsc::Sender<HotkeyEvent>,
        _running: Arc<AtomicBool>,
        _ready: SyncSender<Result<(), HotkeyError>>,
    ) {
    }

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(!listener.is_running());
    }

    #[test]
    fn test_setup_failure_is_returned_from_start() {
        let (tx, mut rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);

        let result = listener.start_with(tap_denied);
        assert!(matches!(result, Err(HotkeyError::EventTapCreation)));
        assert!(!listener.is_running());
        assert!(matches!(rx.blocking_recv(), Some(HotkeyEvent::Stopped)));
    }

    #[test]
    fn test_thread_exit_before_ready_is_an_error() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);

        let result = listener.start_with(dies_before_ready);
        assert!(matches!(result, Err(HotkeyError::ExitedDuringSetup)));
        assert!(!listener.is_running());
    }

    #[test]
    fn test_stop_reports_stopped() {
        let (tx, mut rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);

        listener.start_with(tap_until_stopped).unwrap();
        assert!(listener.is_running());
        assert!(matches!(
            listener.start_with(tap_until_stopped),
            Err(HotkeyError::AlreadyRunning)
        ));

        listener.stop();
        assert!(matches!(rx.blocking_recv(), Some(HotkeyEvent::Stopped)));
        assert!(!listener.is_running());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_unsupported_off_macos() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());
    }
}
