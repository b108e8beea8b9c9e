//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::events::BeeperEvent;
use crate::sound::Volume;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from a front end to the beeper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current status
    GetStatus,

    /// Turn listening on or off
    SetActive { active: bool },

    /// Flip listening
    ToggleActive,

    /// Set the beep volume, 0.0 to 1.0
    SetVolume { volume: f32 },

    /// Beep now
    TestSound,

    /// Stop the beeper
    Quit,

    /// Receive a notification for every beeper event
    Subscribe,
}

/// Messages from the beeper to a front end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current status
    Status(BeeperStatus),

    /// Command accepted
    Ack,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed clients
    Notification { event: BeeperEvent },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeeperStatus {
    pub version: String,

    /// Whether modifier presses beep
    pub active: bool,

    pub volume: Volume,

    /// Whether the global listener is running
    pub hotkey_registered: bool,

    /// Beeps played since start, test beeps included
    pub beep_count: u64,

    pub uptime_secs: u64,
}

impl Default for BeeperStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            active: true,
            volume: Volume::default(),
            hotkey_registered: false,
            beep_count: 0,
            uptime_secs: 0,
        }
    }
}

impl BeeperStatus {
    /// Fold a beeper event into the snapshot
    pub fn apply(&mut self, event: &BeeperEvent) {
        match event {
            BeeperEvent::Beeped { .. } => self.beep_count += 1,
            BeeperEvent::ActiveChanged { active } => self.active = *active,
            BeeperEvent::VolumeChanged { volume } => self.volume = *volume,
            BeeperEvent::ListenerStarted => self.hotkey_registered = true,
            BeeperEvent::ListenerStopped => self.hotkey_registered = false,
        }
    }
}

/// Read one length-prefixed JSON message; `None` on clean EOF
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        bail!("message too large ({len} bytes)");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(serde_json::from_slice(&msg_buf)?))
}

/// Write one length-prefixed JSON message
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}
