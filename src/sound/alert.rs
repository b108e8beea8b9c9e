//! Terminal fallback: the system alert sound
//!
//! Volume-independent and fire-and-forget.

use super::player::AlertOutput;

/// Default system sound id (the keyboard "tink")
pub const DEFAULT_ALERT_SOUND_ID: u32 = 1104;

#[cfg(target_os = "macos")]
#[link(name = "AudioToolbox", kind = "framework")]
extern "C" {
    fn AudioServicesPlaySystemSound(in_system_sound_id: u32);
}

/// Plays a fixed system sound
pub struct SystemAlert {
    sound_id: u32,
}

impl SystemAlert {
    pub fn new(sound_id: u32) -> Self {
        Self { sound_id }
    }
}

impl AlertOutput for SystemAlert {
    #[cfg(target_os = "macos")]
    fn alert(&self) {
        // Asynchronous and has no failure result
        unsafe { AudioServicesPlaySystemSound(self.sound_id) }
    }

    #[cfg(not(target_os = "macos"))]
    fn alert(&self) {
        use std::io::Write;

        tracing::trace!(sound_id = self.sound_id, "no system sounds here, ringing the terminal bell");
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

