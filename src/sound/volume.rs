//! Playback volume in the closed range [0.0, 1.0]

use serde::{Deserialize, Serialize};

/// Volume level for a playback request
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Volume(f32);

/// Errors constructing a volume
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VolumeError {
    #[error("volume {0} is outside 0.0..=1.0")]
    OutOfRange(f32),
}

impl Volume {
    /// Silent
    pub const MIN: Volume = Volume(0.0);
    /// Full blast
    pub const MAX: Volume = Volume(1.0);

    /// Create a volume, rejecting values outside [0.0, 1.0] and NaN
    pub fn new(level: f32) -> Result<Self, VolumeError> {
        if (0.0..=1.0).contains(&level) {
            Ok(Self(level))
        } else {
            Err(VolumeError::OutOfRange(level))
        }
    }

    /// Create a volume from slider-style input, saturating into range
    pub fn clamped(level: f32) -> Self {
        if level.is_nan() {
            Self::MIN
        } else {
            Self(level.clamp(0.0, 1.0))
        }
    }

    /// The raw level
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

impl TryFrom<f32> for Volume {
    type Error = VolumeError;

    fn try_from(level: f32) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Volume> for f32 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
