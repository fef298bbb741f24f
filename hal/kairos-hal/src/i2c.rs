//! I2C configuration and chip-facing operations.

use crate::error::HalError;
use crate::gpio::PinId;

/// Highest valid 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Role of the local controller on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cRole {
    #[default]
    Master,
    /// Respond at the given 7-bit address
    Slave(u8),
}

/// I2C configuration.
///
/// Pins left as `None` are resolved to the board defaults for the
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    pub scl: Option<PinId>,
    pub sda: Option<PinId>,
    /// Clock frequency in Hz
    pub frequency: u32,
    pub role: I2cRole,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz), master
    pub const STANDARD: Self = Self {
        scl: None,
        sda: None,
        frequency: 100_000,
        role: I2cRole::Master,
    };

    /// Fast mode (400 kHz), master
    pub const FAST: Self = Self {
        scl: None,
        sda: None,
        frequency: 400_000,
        role: I2cRole::Master,
    };
}

/// Chip-facing I2C master operations.
///
/// Both transfers are bounded: a stuck bus must surface
/// [`HalError::BusTimeout`] rather than hang the main loop.
pub trait I2cOps {
    /// Apply a configuration to the given instance.
    fn i2c_configure(&mut self, index: u8, config: &I2cConfig) -> Result<(), HalError>;

    /// Master write of `data` to the device at `address`.
    fn i2c_write(&mut self, index: u8, address: u8, data: &[u8]) -> Result<(), HalError>;

    /// Master read filling `buf` from the device at `address`.
    fn i2c_read(&mut self, index: u8, address: u8, buf: &mut [u8]) -> Result<(), HalError>;
}
