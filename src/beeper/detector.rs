//! Rising-edge detection over modifier snapshots

use crate::hotkey::ModifierState;

/// Remembers the last snapshot and reports newly pressed modifiers
#[derive(Debug, Default)]
pub struct EdgeDetector {
    /// Most recently observed snapshot
    previous: ModifierState,
}

impl EdgeDetector {
    /// Create a detector with every modifier released
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot the next observation is compared against
    pub fn previous(&self) -> ModifierState {
        self.previous
    }

    /// Feed a snapshot; true if any tracked modifier went from up to down.
    ///
    /// The stored snapshot is replaced whatever the result. Several keys
    /// going down in one snapshot still count as one trigger, and releases
    /// never trigger.
    pub fn observe(&mut self, current: ModifierState) -> bool {
        let rising = current.rising_from(&self.previous);
        self.previous = current;
        !rising.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(shift: bool, command: bool, option: bool, control: bool) -> ModifierState {
        ModifierState {
            shift,
            command,
            option,
            control,
        }
    }

    fn from_bits(bits: u8) -> ModifierState {
        state(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0)
    }

    fn detector_at(previous: ModifierState) -> EdgeDetector {
        let mut detector = EdgeDetector::new();
        detector.observe(previous);
        detector
    }

    #[test]
    fn test_initial_state_is_released() {
        assert!(EdgeDetector::new().previous().is_empty());
    }

    #[test]
    fn test_press_from_nothing() {
        let mut detector = EdgeDetector::new();
        assert!(detector.observe(state(true, false, false, false)));
    }

    #[test]
    fn test_held_key_does_not_retrigger() {
        let shift = state(true, false, false, false);
        let mut detector = detector_at(shift);
        assert!(!detector.observe(shift));
    }

    #[test]
    fn test_release_is_not_a_trigger() {
        let mut detector = detector_at(state(true, false, false, false));
        assert!(!detector.observe(ModifierState::default()));
        assert!(detector.previous().is_empty());
    }

    #[test]
    fn test_simultaneous_press_is_one_trigger() {
        let mut detector = EdgeDetector::new();
        assert!(detector.observe(state(true, true, false, false)));
        assert!(!detector.observe(state(true, true, false, false)));
    }

    #[test]
    fn test_adding_to_held_modifier() {
        let mut detector = detector_at(state(false, false, true, false));
        assert!(detector.observe(state(false, false, true, true)));
    }

    #[test]
    fn test_swap_in_one_snapshot_triggers() {
        let mut detector = detector_at(state(true, false, false, false));
        assert!(detector.observe(state(false, false, false, true)));
    }

    #[test]
    fn test_repeat_is_idempotent_for_every_snapshot() {
        for bits in 0..16 {
            let mut detector = EdgeDetector::new();
            detector.observe(from_bits(bits));
            assert!(!detector.observe(from_bits(bits)), "bits {bits:04b}");
        }
    }

    #[test]
    fn test_triggers_exactly_when_a_key_is_added() {
        for prev in 0..16u8 {
            for current in 0..16u8 {
                let mut detector = detector_at(from_bits(prev));
                let expected = current & !prev != 0;

                assert_eq!(
                    detector.observe(from_bits(current)),
                    expected,
                    "{prev:04b} -> {current:04b}"
                );
                assert_eq!(detector.previous(), from_bits(current));
            }
        }
    }
}
