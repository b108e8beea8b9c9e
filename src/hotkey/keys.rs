//! Modifier key definitions and state tracking
//!
//! Provides the macOS modifier flag masks and a snapshot struct for the
//! four modifiers the beeper listens to.

/// Modifier key flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    /// Shift key modifier flag
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
    /// Control key modifier flag
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    /// Command key modifier flag
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
}

/// Snapshot of which modifier keys are currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Shift key is held
    pub shift: bool,
    /// Command key is held
    pub command: bool,
    /// Option/Alt key is held
    pub option: bool,
    /// Control key is held
    pub control: bool,
}

impl ModifierState {
    /// Create a new ModifierState from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            shift: flags.contains(flags::SHIFT),
            command: flags.contains(flags::COMMAND),
            option: flags.contains(flags::OPTION),
            control: flags.contains(flags::CONTROL),
        }
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.command && !self.option && !self.control
    }

    /// Modifiers held in `self` that were not held in `previous`
    pub fn rising_from(&self, previous: &ModifierState) -> ModifierState {
        ModifierState {
            shift: self.shift && !previous.shift,
            command: self.command && !previous.command,
            option: self.option && !previous.option,
            control: self.control && !previous.control,
        }
    }

    /// Names of the held modifiers, in a fixed order
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.shift, "shift"),
            (self.command, "command"),
            (self.option, "option"),
            (self.control, "control"),
        ]
        .into_iter()
        .filter_map(|(held, name)| held.then_some(name))
        .collect()
    }
}

impl std::fmt::Display for ModifierState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.names().join("+"))
        }
    }
}
