//! SPI configuration and chip-facing operations.

use crate::error::HalError;
use crate::gpio::PinId;

// Clock polarity/phase pairs are the embedded-hal ones; no point in a
// private copy of a type every driver in the ecosystem already speaks.
pub use embedded_hal::spi::{Mode, Phase, Polarity, MODE_0, MODE_1, MODE_2, MODE_3};

/// SPI word framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameSize {
    Bits8,
    Bits16,
}

/// SPI master configuration.
///
/// Pins left as `None` are resolved to the board defaults for the
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    pub sck: Option<PinId>,
    pub miso: Option<PinId>,
    pub mosi: Option<PinId>,
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity and phase (CPOL/CPHA)
    pub mode: Mode,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            sck: None,
            miso: None,
            mosi: None,
            frequency: 1_000_000, // 1 MHz
            mode: MODE_0,
        }
    }
}

/// Chip-facing SPI master operations.
pub trait SpiOps {
    /// Apply a configuration to the given instance.
    ///
    /// Must not disturb a word already latched in the receive register.
    fn spi_configure(&mut self, index: u8, config: &SpiConfig) -> Result<(), HalError>;

    /// Blocking full-duplex transfer of one word.
    ///
    /// Returns the word shifted in during the transfer. The wait is
    /// bounded: a stuck bus surfaces [`HalError::BusTimeout`] rather
    /// than hanging.
    fn spi_transfer_word(&mut self, index: u8, word: u16, frame: FrameSize)
        -> Result<u16, HalError>;
}
