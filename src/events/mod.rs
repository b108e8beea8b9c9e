//! Events emitted by the beeper service
//!
//! Broadcast to the IPC server, which keeps its status view current and
//! pushes them to subscribed clients.

use serde::{Deserialize, Serialize};

use crate::sound::Volume;

/// Events emitted as the beeper acts or is reconfigured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BeeperEvent {
    /// A beep was played
    Beeped {
        /// Modifiers that triggered it; empty for a test beep
        keys: Vec<String>,
    },

    /// Listening was switched on or off
    ActiveChanged { active: bool },

    /// Volume was changed
    VolumeChanged { volume: Volume },

    /// The global listener is running
    ListenerStarted,

    /// The global listener has exited
    ListenerStopped,
}

impl std::fmt::Display for BeeperEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeeperEvent::Beeped { keys } if keys.is_empty() => write!(f, "BEEPED (test)"),
            BeeperEvent::Beeped { keys } => write!(f, "BEEPED ({})", keys.join("+")),
            BeeperEvent::ActiveChanged { active } => {
                write!(f, "ACTIVE_CHANGED ({})", if *active { "on" } else { "off" })
            }
            BeeperEvent::VolumeChanged { volume } => write!(f, "VOLUME_CHANGED ({volume})"),
            BeeperEvent::ListenerStarted => write!(f, "LISTENER_STARTED"),
            BeeperEvent::ListenerStopped => write!(f, "LISTENER_STOPPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = BeeperEvent::Beeped {
            keys: vec!["shift".into(), "command".into()],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("beeped"));
        assert!(json.contains("command"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"volume_changed","volume":0.5}"#;
        let event: BeeperEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            BeeperEvent::VolumeChanged {
                volume: Volume::clamped(0.5)
            }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(BeeperEvent::Beeped { keys: vec![] }.to_string(), "BEEPED (test)");
        assert_eq!(
            BeeperEvent::ActiveChanged { active: false }.to_string(),
            "ACTIVE_CHANGED (off)"
        );
    }
}
