//! UART configuration and chip-facing operations.

use crate::error::HalError;
use crate::gpio::PinId;

/// UART configuration.
///
/// A value object: the device table replaces it whole on setup, never
/// field by field. Pins left as `None` are resolved to the board
/// defaults for the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    pub rx: Option<PinId>,
    pub tx: Option<PinId>,
    /// Baud rate in bits per second
    pub baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            rx: None,
            tx: None,
            baud: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

/// Chip-facing UART operations.
///
/// Transmission is interrupt-driven: the chip owns its transmit buffer
/// and drains it from its own interrupts once kicked.
pub trait UartOps {
    /// Apply a configuration to the given instance.
    ///
    /// The caller guarantees both pins are `Some` and validated.
    fn uart_configure(&mut self, index: u8, config: &UartConfig) -> Result<(), HalError>;

    /// Start the next buffered transmission if the transmitter is idle.
    /// Idempotent when nothing is pending.
    fn uart_kick(&mut self, index: u8);
}
