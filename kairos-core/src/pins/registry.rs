//! Live pin roles and the rules for changing them.
//!
//! The registry is the single record of which role every pin currently
//! plays. Transitions are validated against the static capability table
//! and otherwise commit unconditionally: a pin is owned by whichever
//! subsystem last set it, and setting a new role silently releases the
//! old owner. The only guard is the per-pin manual flag, which keeps
//! peripheral setup from reassigning a pin a script has fixed.

use heapless::Vec;

use kairos_hal::board::BoardInfo;
use kairos_hal::error::HalError;
use kairos_hal::gpio::{PinId, PinState};

/// Upper bound on pins per board.
pub const MAX_PINS: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
struct PinRecord {
    state: PinState,
    manual: bool,
}

/// Outcome of a state transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Applied {
    /// The role changed; hardware must be reprogrammed
    Changed,
    /// The pin was already in the requested role
    Unchanged,
}

/// Per-pin role and manual-lock records, sized by the board table.
pub struct PinRegistry {
    board: &'static BoardInfo,
    records: Vec<PinRecord, MAX_PINS>,
}

impl PinRegistry {
    pub fn new(board: &'static BoardInfo) -> Self {
        let mut records = Vec::new();
        let count = board.pin_count().min(MAX_PINS);
        for _ in 0..count {
            // Cannot overflow: count is clamped to the capacity
            let _ = records.push(PinRecord::default());
        }
        Self { board, records }
    }

    pub fn pin_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_valid(&self, pin: PinId) -> bool {
        pin.index() < self.records.len()
    }

    /// Current role; `Undefined` for an unresolvable id.
    pub fn state(&self, pin: PinId) -> PinState {
        self.records
            .get(pin.index())
            .map(|r| r.state)
            .unwrap_or(PinState::Undefined)
    }

    pub fn is_manual(&self, pin: PinId) -> bool {
        self.records
            .get(pin.index())
            .map(|r| r.manual)
            .unwrap_or(false)
    }

    /// Fix or release the manual flag.
    ///
    /// While set, automatic reconfiguration by peripheral setup must
    /// skip the pin; explicit calls still go through.
    pub fn set_manual(&mut self, pin: PinId, manual: bool) -> Result<(), HalError> {
        let rec = self
            .records
            .get_mut(pin.index())
            .ok_or(HalError::InvalidPin)?;
        rec.manual = manual;
        Ok(())
    }

    /// Validate a transition and record it.
    ///
    /// Fails if the role is not in the pin's capability set. Repeating
    /// the current role reports [`Applied::Unchanged`] so callers skip
    /// the hardware reprogramming. Otherwise the transition commits
    /// unconditionally, releasing whatever claimed the pin before.
    pub fn try_set_state(&mut self, pin: PinId, state: PinState) -> Result<Applied, HalError> {
        let caps = self.board.caps(pin);
        let rec = self
            .records
            .get_mut(pin.index())
            .ok_or(HalError::InvalidPin)?;
        if !caps.allows(state) {
            return Err(HalError::CapabilityMissing);
        }
        if rec.state == state {
            return Ok(Applied::Unchanged);
        }
        rec.state = state;
        Ok(Applied::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_hal::gpio::PinCaps;

    fn registry() -> PinRegistry {
        PinRegistry::new(kairos_hal_sim::board())
    }

    #[test]
    fn test_initial_state_undefined() {
        let reg = registry();
        assert_eq!(reg.state(PinId::new(0)), PinState::Undefined);
        assert!(!reg.is_manual(PinId::new(0)));
    }

    #[test]
    fn test_capability_invariant() {
        let mut reg = registry();
        let board = kairos_hal_sim::board();
        for i in 0..reg.pin_count() {
            let pin = PinId::new(i as u8);
            let caps = board.caps(pin);
            for state in [
                PinState::GpioOut,
                PinState::GpioIn,
                PinState::AdcIn,
                PinState::DacOut,
                PinState::UsartIn,
                PinState::I2c,
            ] {
                let result = reg.try_set_state(pin, state);
                assert_eq!(result.is_ok(), caps.allows(state), "pin {i} state {state:?}");
            }
        }
    }

    #[test]
    fn test_set_state_idempotent() {
        let mut reg = registry();
        let pin = PinId::new(0);
        assert_eq!(reg.try_set_state(pin, PinState::GpioOut), Ok(Applied::Changed));
        assert_eq!(
            reg.try_set_state(pin, PinState::GpioOut),
            Ok(Applied::Unchanged)
        );
        assert_eq!(reg.state(pin), PinState::GpioOut);
    }

    #[test]
    fn test_rejected_transition_leaves_state() {
        let mut reg = registry();
        // A7 on the sim board is analog-only
        let pin = kairos_hal_sim::board().pin_from_name("A7").unwrap();
        assert!(kairos_hal_sim::board().caps(pin) == PinCaps::ADC);
        assert_eq!(reg.try_set_state(pin, PinState::AdcIn), Ok(Applied::Changed));
        assert_eq!(
            reg.try_set_state(pin, PinState::GpioOut),
            Err(HalError::CapabilityMissing)
        );
        assert_eq!(reg.state(pin), PinState::AdcIn);
    }

    #[test]
    fn test_invalid_pin() {
        let mut reg = registry();
        let bogus = PinId::new(99);
        assert_eq!(
            reg.try_set_state(bogus, PinState::GpioOut),
            Err(HalError::InvalidPin)
        );
        assert_eq!(reg.set_manual(bogus, true), Err(HalError::InvalidPin));
        assert_eq!(reg.state(bogus), PinState::Undefined);
        assert!(!reg.is_valid(bogus));
    }

    #[test]
    fn test_manual_flag_roundtrip() {
        let mut reg = registry();
        let pin = PinId::new(3);
        assert!(reg.set_manual(pin, true).is_ok());
        assert!(reg.is_manual(pin));
        assert!(reg.set_manual(pin, false).is_ok());
        assert!(!reg.is_manual(pin));
    }
}
