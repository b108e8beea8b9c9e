//! Configuration loading and management

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::sound::DEFAULT_ALERT_SOUND_ID;

const DEFAULT_TONE: &str = "/System/Library/Sounds/Ping.aiff";
const DEFAULT_PLAYER: &str = "/usr/bin/afplay";

/// Beeper configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Where the saved volume lives
    pub preferences_path: PathBuf,

    /// Tone played on each beep
    pub tone_path: PathBuf,

    /// Command-line player used when the output device tier fails
    pub player_path: PathBuf,

    /// System sound used as the last resort
    pub alert_sound_id: u32,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_env(|key| std::env::var_os(key))
    }

    fn from_env(var: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let data_dir = match var("MODIFIER_BEEPER_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = var("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("modifier-beeper")
            }
        };

        let tone_path = var("MODIFIER_BEEPER_TONE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TONE));
        let player_path = var("MODIFIER_BEEPER_PLAYER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PLAYER));

        Ok(Self {
            socket_path: data_dir.join("beeper.sock"),
            preferences_path: data_dir.join("preferences.json"),
            data_dir,
            tone_path,
            player_path,
            alert_sound_id: DEFAULT_ALERT_SOUND_ID,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}
