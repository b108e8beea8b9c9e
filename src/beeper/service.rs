//! The beeper service loop
//!
//! Single consumer of modifier snapshots and control commands. Messages
//! are handled one at a time, so the detector and volume need no locking.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use super::detector::EdgeDetector;
use crate::events::BeeperEvent;
use crate::hotkey::{HotkeyEvent, ModifierState};
use crate::prefs::{PreferenceStore, Preferences};
use crate::sound::{SoundPlayer, Volume};

/// Commands from the front end (the menu controls)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    /// Turn listening on or off
    SetActive(bool),
    /// Flip listening
    ToggleActive,
    /// Change and persist the volume
    SetVolume(Volume),
    /// Beep now, even while inactive
    TestSound,
    /// Stop the service
    Quit,
}

/// Owns the detector, the volume and the sound player
pub struct Beeper {
    detector: EdgeDetector,
    active: bool,
    volume: Volume,
    player: SoundPlayer,
    prefs: PreferenceStore,
    event_tx: broadcast::Sender<BeeperEvent>,
}

impl Beeper {
    /// Create the service, restoring the saved volume
    pub fn new(
        player: SoundPlayer,
        prefs: PreferenceStore,
        event_tx: broadcast::Sender<BeeperEvent>,
    ) -> Self {
        let volume = prefs.load().volume;
        info!(%volume, "volume restored");

        Self {
            detector: EdgeDetector::new(),
            active: true,
            volume,
            player,
            prefs,
            event_tx,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Process snapshots and controls until `Quit` or both channels close
    pub async fn run(
        &mut self,
        mut hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        mut control_rx: mpsc::Receiver<Control>,
    ) {
        info!(active = self.active, "beeper started");

        loop {
            tokio::select! {
                Some(event) = hotkey_rx.recv() => self.handle_hotkey(event),
                Some(control) = control_rx.recv() => {
                    if control == Control::Quit {
                        info!("quit requested");
                        break;
                    }
                    self.handle_control(control);
                }
                else => break,
            }
        }

        info!("beeper stopped");
    }

    fn handle_hotkey(&mut self, event: HotkeyEvent) {
        match event {
            HotkeyEvent::ModifierChanged(modifiers) => self.handle_modifiers(modifiers),
            HotkeyEvent::TapDisabled => {
                warn!("event tap was disabled, presses may have been missed");
            }
            HotkeyEvent::Stopped => {
                warn!("modifier listener stopped, presses are no longer observed");
                self.emit(BeeperEvent::ListenerStopped);
            }
        }
    }

    fn handle_modifiers(&mut self, modifiers: ModifierState) {
        if !self.active {
            trace!(%modifiers, "inactive, ignoring snapshot");
            return;
        }

        let rising = modifiers.rising_from(&self.detector.previous());
        if self.detector.observe(modifiers) {
            debug!(keys = %rising, "modifier pressed");
            self.beep(&rising);
        }
    }

    fn handle_control(&mut self, control: Control) {
        debug!(?control, "control received");

        match control {
            Control::SetActive(active) => self.set_active(active),
            Control::ToggleActive => self.set_active(!self.active),
            Control::SetVolume(volume) => self.set_volume(volume),
            Control::TestSound => self.beep(&ModifierState::default()),
            Control::Quit => {}
        }
    }

    fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        info!(active, "listening toggled");
        self.emit(BeeperEvent::ActiveChanged { active });
    }

    fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        info!(%volume, "volume set");

        if let Err(e) = self.prefs.save(&Preferences { volume }) {
            warn!(%e, "volume not saved");
        }
        self.emit(BeeperEvent::VolumeChanged { volume });
    }

    fn beep(&self, keys: &ModifierState) {
        self.player.play(self.volume);
        self.emit(BeeperEvent::Beeped {
            keys: keys.names().into_iter().map(String::from).collect(),
        });
    }

    fn emit(&self, event: BeeperEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
