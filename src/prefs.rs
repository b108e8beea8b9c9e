//! Persisted user preferences (just the volume)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sound::Volume;

/// Saved settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub volume: Volume,
}

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("failed to write preferences: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

/// JSON file holding [`Preferences`]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    /// Load saved preferences, falling back to defaults on any problem
    pub fn load(&self) -> Preferences {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no saved preferences, using defaults");
                return Preferences::default();
            }
            Err(e) => {
                warn!(?e, path = ?self.path, "failed to read preferences, using defaults");
                return Preferences::default();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(%e, path = ?self.path, "ignoring unreadable preferences");
            Preferences::default()
        })
    }

    /// Write the preferences, creating the parent directory if needed
    pub fn save(&self, prefs: &Preferences) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(prefs)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
