//! Pin identity, roles, and capability sets.
//!
//! A pin's live role is tracked above this crate by the pin registry;
//! here live the value types shared across that boundary and the traits
//! a chip implements to realize a role in hardware.

use bitflags::bitflags;

use crate::error::HalError;

/// Identifier of a physical pin: an index into the board pin table.
///
/// "No pin" is expressed as `Option<PinId>` rather than a sentinel
/// value, so it cannot collide with a real identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(u8);

impl PinId {
    pub const fn new(index: u8) -> Self {
        PinId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Role a pin is currently multiplexed into.
///
/// Roles are mutually exclusive per pin. `Undefined` is both the initial
/// role and the role a pin returns to when it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    #[default]
    Undefined,
    GpioOut,
    GpioOutOpenDrain,
    GpioIn,
    GpioInPullUp,
    GpioInPullDown,
    AdcIn,
    AfOut,
    UsartIn,
    UsartOut,
    DacOut,
    I2c,
}

impl PinState {
    /// Roles that drive the pin.
    pub fn is_output(self) -> bool {
        matches!(
            self,
            PinState::GpioOut
                | PinState::GpioOutOpenDrain
                | PinState::AfOut
                | PinState::UsartOut
                | PinState::DacOut
                | PinState::I2c
        )
    }

    /// Roles that sample the pin.
    pub fn is_input(self) -> bool {
        matches!(
            self,
            PinState::GpioIn
                | PinState::GpioInPullUp
                | PinState::GpioInPullDown
                | PinState::AdcIn
                | PinState::UsartIn
        )
    }

    /// Capability a pin must carry for this role.
    ///
    /// `None` for `Undefined`, which every pin supports.
    pub fn required_cap(self) -> Option<PinCaps> {
        match self {
            PinState::Undefined => None,
            PinState::GpioOut
            | PinState::GpioOutOpenDrain
            | PinState::GpioIn
            | PinState::GpioInPullUp
            | PinState::GpioInPullDown => Some(PinCaps::GPIO),
            PinState::AdcIn => Some(PinCaps::ADC),
            PinState::AfOut => Some(PinCaps::AF),
            PinState::UsartIn | PinState::UsartOut => Some(PinCaps::USART),
            PinState::DacOut => Some(PinCaps::DAC),
            PinState::I2c => Some(PinCaps::I2C),
        }
    }
}

bitflags! {
    /// Set of roles physically realizable on a pin.
    ///
    /// Derived from the static board table, never mutated at runtime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PinCaps: u8 {
        const GPIO = 1 << 0;
        const ADC = 1 << 1;
        const DAC = 1 << 2;
        const AF = 1 << 3;
        const USART = 1 << 4;
        const I2C = 1 << 5;
    }
}

impl PinCaps {
    /// Check whether `state` is realizable with this capability set.
    pub fn allows(self, state: PinState) -> bool {
        match state.required_cap() {
            None => true,
            Some(cap) => self.contains(cap),
        }
    }
}

/// Chip-facing digital pin operations.
///
/// Implementations manipulate the actual hardware registers; all policy
/// (capability checks, manual locks, ownership) lives above this trait.
pub trait PinOps {
    /// Put the pin hardware into the given role.
    fn set_mode(&mut self, pin: PinId, state: PinState) -> Result<(), HalError>;

    /// Drive the pin level. Has no effect unless the pin is in an
    /// output role. Safe to call from interrupt context.
    fn write(&mut self, pin: PinId, high: bool);

    /// Sample the pin level.
    fn read(&mut self, pin: PinId) -> bool;

    /// Arm or disarm edge-capture interrupts on the pin.
    fn watch(&mut self, pin: PinId, enable: bool) -> Result<(), HalError>;
}

/// Chip-facing analog operations.
pub trait AnalogOps {
    /// Raw ADC sample, left-aligned to the full `u16` scale.
    fn read_raw(&mut self, pin: PinId) -> Result<u16, HalError>;

    /// Drive a DAC or PWM output.
    ///
    /// `duty` is full-scale; `freq_hz = 0` selects the chip's default
    /// carrier rate.
    fn write_analog(&mut self, pin: PinId, duty: u16, freq_hz: u32) -> Result<(), HalError>;
}
