//! Sound module for the beep itself
//!
//! Tiers, in order:
//! - a pre-loaded tone on the default output device (rodio)
//! - an external command-line player
//! - the system alert sound

mod alert;
mod device;
mod external;
mod player;
mod volume;

pub use alert::DEFAULT_ALERT_SOUND_ID;
pub use player::SoundPlayer;
pub use volume::Volume;

#[cfg(test)]
pub use player::{AlertOutput, SoundError, ToneOutput};
