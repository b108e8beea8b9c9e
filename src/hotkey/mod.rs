//! Hotkey module for global keyboard event listening
//!
//! Uses macOS CGEventTap to observe modifier key press/release events.

mod keys;
mod listener;

pub use keys::ModifierState;
pub use listener::{HotkeyEvent, HotkeyListener};
