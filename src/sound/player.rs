//! Best-effort tone playback with a fallback chain
//!
//! The player tries the device tone first, then an external player
//! process, and finally the system alert sound. Failures never leave
//! `play()`; they are logged and the next tier is tried.

use tracing::{debug, info, warn};

use super::alert::SystemAlert;
use super::device::DeviceTone;
use super::external::ExternalPlayer;
use super::volume::Volume;
use crate::config::Config;

/// Errors a playback tier can report
#[derive(Debug, thiserror::Error)]
pub enum SoundError {
    #[error("tone playback unavailable: {0}")]
    PlaybackUnavailable(String),

    #[error("external player failed: {0}")]
    ExternalProcessFailure(String),
}

/// A playback tier that can fail
pub trait ToneOutput: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Start playing the tone at `volume` without waiting for it to finish
    fn play(&self, volume: Volume) -> Result<(), SoundError>;
}

/// The last-resort tier; fire-and-forget
pub trait AlertOutput: Send + Sync {
    fn alert(&self);
}

/// Plays the beep through the first tier that accepts it
pub struct SoundPlayer {
    primary: Option<Box<dyn ToneOutput>>,
    fallback: Box<dyn ToneOutput>,
    alert: Box<dyn AlertOutput>,
}

impl SoundPlayer {
    /// Assemble a player from explicit tiers
    pub fn new(
        primary: Option<Box<dyn ToneOutput>>,
        fallback: Box<dyn ToneOutput>,
        alert: Box<dyn AlertOutput>,
    ) -> Self {
        Self {
            primary,
            fallback,
            alert,
        }
    }

    /// Build the platform chain described by the configuration
    ///
    /// Loads the tone once. If it cannot be loaded the primary tier stays
    /// empty and every beep goes to the external player.
    pub fn from_config(config: &Config) -> Self {
        let primary: Option<Box<dyn ToneOutput>> = match DeviceTone::load(&config.tone_path) {
            Ok(tone) => {
                info!(path = ?config.tone_path, "tone loaded for the default output device");
                Some(Box::new(tone))
            }
            Err(e) => {
                warn!(%e, path = ?config.tone_path, "device tone unavailable, beeps will use the external player");
                None
            }
        };

        Self::new(
            primary,
            Box::new(ExternalPlayer::new(&config.player_path, &config.tone_path)),
            Box::new(SystemAlert::new(config.alert_sound_id)),
        )
    }

    /// Whether the device tier was loaded
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Play the beep at `volume`; never fails from the caller's view
    pub fn play(&self, volume: Volume) {
        let primary = match &self.primary {
            Some(tone) => tone.play(volume).map(|()| tone.name()),
            None => Err(SoundError::PlaybackUnavailable("tone not loaded".into())),
        };

        let tier = match primary {
            Ok(name) => name,
            Err(e) => {
                debug!(%e, "primary tier failed");
                match self.fallback.play(volume) {
                    Ok(()) => self.fallback.name(),
                    Err(e) => {
                        warn!(%e, "external player failed, using system alert");
                        self.alert.alert();
                        "system-alert"
                    }
                }
            }
        };

        debug!(tier, %volume, "beep");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Scripted {
        ok: bool,
        calls: Arc<AtomicUsize>,
        volumes: Arc<Mutex<Vec<f32>>>,
    }

    impl Scripted {
        fn new(ok: bool) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let tier = Self {
                ok,
                calls: Arc::clone(&calls),
                volumes: Arc::new(Mutex::new(Vec::new())),
            };
            (tier, calls)
        }
    }

    impl ToneOutput for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn play(&self, volume: Volume) -> Result<(), SoundError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.volumes.lock().unwrap().push(volume.get());
            if self.ok {
                Ok(())
            } else {
                Err(SoundError::ExternalProcessFailure("scripted".into()))
            }
        }
    }

    struct CountingAlert(Arc<AtomicUsize>);

    impl AlertOutput for CountingAlert {
        fn alert(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_alert() -> (Box<dyn AlertOutput>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Box::new(CountingAlert(Arc::clone(&count))), count)
    }

    #[test]
    fn test_primary_success_skips_fallbacks() {
        let (primary, primary_calls) = Scripted::new(true);
        let (fallback, fallback_calls) = Scripted::new(true);
        let (alert, alerts) = counting_alert();
        let volumes = Arc::clone(&primary.volumes);

        let player = SoundPlayer::new(Some(Box::new(primary)), Box::new(fallback), alert);
        player.play(Volume::clamped(0.4));

        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
        assert_eq!(alerts.load(Ordering::SeqCst), 0);
        assert_eq!(*volumes.lock().unwrap(), vec![0.4]);
    }

    #[test]
    fn test_primary_failure_uses_external_player() {
        let (primary, primary_calls) = Scripted::new(false);
        let (fallback, fallback_calls) = Scripted::new(true);
        let (alert, alerts) = counting_alert();
        let volumes = Arc::clone(&fallback.volumes);

        let player = SoundPlayer::new(Some(Box::new(primary)), Box::new(fallback), alert);
        player.play(Volume::clamped(0.8));

        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
        assert_eq!(alerts.load(Ordering::SeqCst), 0);
        assert_eq!(*volumes.lock().unwrap(), vec![0.8]);
    }

    #[test]
    fn test_missing_primary_goes_straight_to_fallback() {
        let (fallback, fallback_calls) = Scripted::new(true);
        let (alert, alerts) = counting_alert();

        let player = SoundPlayer::new(None, Box::new(fallback), alert);
        assert!(!player.has_primary());
        player.play(Volume::MAX);

        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
        assert_eq!(alerts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_tiers_down_alerts_exactly_once() {
        let (primary, _) = Scripted::new(false);
        let (fallback, _) = Scripted::new(false);
        let (alert, alerts) = counting_alert();

        let player = SoundPlayer::new(Some(Box::new(primary)), Box::new(fallback), alert);
        player.play(Volume::MIN);

        assert_eq!(alerts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unlaunchable_player_falls_through_to_alert() {
        let (alert, alerts) = counting_alert();
        let fallback = ExternalPlayer::new(
            std::path::Path::new("/nonexistent/modifier-beeper/player"),
            std::path::Path::new("/nonexistent/tone.aiff"),
        );

        let player = SoundPlayer::new(None, Box::new(fallback), alert);
        player.play(Volume::MAX);
        player.play(Volume::MAX);

        assert_eq!(alerts.load(Ordering::SeqCst), 2);
    }
}
