//! Source of truth for which pins each peripheral instance owns.
//!
//! Slots store fully resolved configurations: by the time a config lands
//! here every `Option<PinId>` is `Some`. Configurations are replaced
//! whole by setup, never mutated field by field.

use heapless::Vec;

use kairos_hal::error::HalError;
use kairos_hal::gpio::PinId;
use kairos_hal::i2c::I2cConfig;
use kairos_hal::spi::{FrameSize, SpiConfig};
use kairos_hal::uart::UartConfig;

use super::DeviceId;

pub const MAX_UARTS: usize = 4;
pub const MAX_SPIS: usize = 4;
pub const MAX_I2CS: usize = 4;

/// Per-instance SPI state beyond the configuration.
///
/// `last_rx` buffers the word shifted in by the most recent transfer
/// until the interpreter collects it; framing changes leave it intact.
#[derive(Debug, Clone, Copy)]
pub struct SpiSlot {
    pub config: SpiConfig,
    pub frame: FrameSize,
    pub last_rx: Option<u16>,
}

impl SpiSlot {
    pub fn new(config: SpiConfig) -> Self {
        Self {
            config,
            frame: FrameSize::Bits8,
            last_rx: None,
        }
    }
}

/// Table of configured peripheral instances.
pub struct DeviceTable {
    uarts: [Option<UartConfig>; MAX_UARTS],
    spis: [Option<SpiSlot>; MAX_SPIS],
    i2cs: [Option<I2cConfig>; MAX_I2CS],
}

impl DeviceTable {
    pub const fn new() -> Self {
        Self {
            uarts: [None; MAX_UARTS],
            spis: [None; MAX_SPIS],
            i2cs: [None; MAX_I2CS],
        }
    }

    pub fn uart(&self, index: u8) -> Option<&UartConfig> {
        self.uarts.get(index as usize)?.as_ref()
    }

    pub fn set_uart(&mut self, index: u8, config: UartConfig) -> Result<(), HalError> {
        let slot = self
            .uarts
            .get_mut(index as usize)
            .ok_or(HalError::InvalidDevice)?;
        *slot = Some(config);
        Ok(())
    }

    pub fn spi(&self, index: u8) -> Option<&SpiSlot> {
        self.spis.get(index as usize)?.as_ref()
    }

    pub fn spi_mut(&mut self, index: u8) -> Result<&mut SpiSlot, HalError> {
        self.spis
            .get_mut(index as usize)
            .ok_or(HalError::InvalidDevice)?
            .as_mut()
            .ok_or(HalError::NotConfigured)
    }

    pub fn set_spi(&mut self, index: u8, slot: SpiSlot) -> Result<(), HalError> {
        let entry = self
            .spis
            .get_mut(index as usize)
            .ok_or(HalError::InvalidDevice)?;
        *entry = Some(slot);
        Ok(())
    }

    pub fn i2c(&self, index: u8) -> Option<&I2cConfig> {
        self.i2cs.get(index as usize)?.as_ref()
    }

    pub fn set_i2c(&mut self, index: u8, config: I2cConfig) -> Result<(), HalError> {
        let slot = self
            .i2cs
            .get_mut(index as usize)
            .ok_or(HalError::InvalidDevice)?;
        *slot = Some(config);
        Ok(())
    }

    /// Whether the given device has been configured via setup.
    pub fn is_initialised(&self, dev: DeviceId) -> bool {
        match dev {
            DeviceId::Uart(i) => self.uart(i).is_some(),
            DeviceId::Spi(i) => self.spi(i).is_some(),
            DeviceId::I2c(i) => self.i2c(i).is_some(),
        }
    }

    /// Pins the given device currently claims.
    pub fn claimed_pins(&self, dev: DeviceId) -> Vec<PinId, 3> {
        let mut pins = Vec::new();
        let mut add = |p: Option<PinId>| {
            if let Some(p) = p {
                let _ = pins.push(p);
            }
        };
        match dev {
            DeviceId::Uart(i) => {
                if let Some(cfg) = self.uart(i) {
                    add(cfg.rx);
                    add(cfg.tx);
                }
            }
            DeviceId::Spi(i) => {
                if let Some(slot) = self.spi(i) {
                    add(slot.config.sck);
                    add(slot.config.miso);
                    add(slot.config.mosi);
                }
            }
            DeviceId::I2c(i) => {
                if let Some(cfg) = self.i2c(i) {
                    add(cfg.scl);
                    add(cfg.sda);
                }
            }
        }
        pins
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = DeviceTable::new();
        assert!(!table.is_initialised(DeviceId::Uart(0)));
        assert!(!table.is_initialised(DeviceId::Spi(0)));
        assert!(table.claimed_pins(DeviceId::Uart(0)).is_empty());
    }

    #[test]
    fn test_store_and_claim() {
        let mut table = DeviceTable::new();
        let cfg = UartConfig {
            rx: Some(PinId::new(8)),
            tx: Some(PinId::new(9)),
            ..Default::default()
        };
        table.set_uart(1, cfg).unwrap();
        assert!(table.is_initialised(DeviceId::Uart(1)));
        assert!(!table.is_initialised(DeviceId::Uart(0)));
        let pins = table.claimed_pins(DeviceId::Uart(1));
        assert_eq!(pins.as_slice(), &[PinId::new(8), PinId::new(9)]);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut table = DeviceTable::new();
        assert_eq!(
            table.set_uart(MAX_UARTS as u8, UartConfig::default()),
            Err(HalError::InvalidDevice)
        );
        assert_eq!(table.spi_mut(99).err(), Some(HalError::InvalidDevice));
    }

    #[test]
    fn test_unconfigured_spi() {
        let mut table = DeviceTable::new();
        assert_eq!(table.spi_mut(0).err(), Some(HalError::NotConfigured));
    }
}
