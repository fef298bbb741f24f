//! Static board description tables.
//!
//! Everything here is configuration data, not behavior: which roles each
//! pin can take, what the tick counter runs at, and which pins a
//! peripheral instance claims when the caller does not pick its own.
//! Chip crates export one `BoardInfo` per supported board.

use heapless::String;

use crate::gpio::{PinCaps, PinId};
use crate::time::TickRate;

/// Port letter grouping pins on the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
}

impl Port {
    pub const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
        }
    }

    pub fn from_letter(c: char) -> Option<Port> {
        match c {
            'A' => Some(Port::A),
            'B' => Some(Port::B),
            'C' => Some(Port::C),
            'D' => Some(Port::D),
            _ => None,
        }
    }
}

/// Static description of one physical pin.
#[derive(Debug, Clone, Copy)]
pub struct PinDesc {
    pub port: Port,
    /// Pin number within the port (the `0` of `"A0"`)
    pub num: u8,
    pub caps: PinCaps,
}

/// Default pin assignment for one UART instance.
#[derive(Debug, Clone, Copy)]
pub struct UartPins {
    pub rx: PinId,
    pub tx: PinId,
}

/// Default pin assignment for one SPI instance.
#[derive(Debug, Clone, Copy)]
pub struct SpiPins {
    pub sck: PinId,
    pub miso: PinId,
    pub mosi: PinId,
}

/// Default pin assignment for one I2C instance.
#[derive(Debug, Clone, Copy)]
pub struct I2cPins {
    pub scl: PinId,
    pub sda: PinId,
}

/// Formatted pin names never exceed this many characters.
pub const MAX_PIN_NAME: usize = 8;

/// Static description of a board.
///
/// The slice lengths double as instance counts: `uarts.len()` is the
/// number of UART instances the board exposes, and so on.
#[derive(Debug)]
pub struct BoardInfo {
    pub name: &'static str,
    pub pins: &'static [PinDesc],
    pub tick_rate: TickRate,
    pub uarts: &'static [UartPins],
    pub spis: &'static [SpiPins],
    pub i2cs: &'static [I2cPins],
    /// Bytes of flash reserved for the interpreter image
    pub image_region: usize,
}

impl BoardInfo {
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Description of a pin, or `None` if the id does not resolve.
    pub fn desc(&self, pin: PinId) -> Option<&PinDesc> {
        self.pins.get(pin.index())
    }

    /// Capability set of a pin; empty for an unresolvable id.
    pub fn caps(&self, pin: PinId) -> PinCaps {
        self.desc(pin).map(|d| d.caps).unwrap_or(PinCaps::empty())
    }

    /// Resolve an `"A0"`-style name to a pin id.
    pub fn pin_from_name(&self, name: &str) -> Option<PinId> {
        let mut chars = name.chars();
        let port = Port::from_letter(chars.next()?)?;
        let num: u8 = chars.as_str().parse().ok()?;
        self.pins
            .iter()
            .position(|d| d.port == port && d.num == num)
            .map(|i| PinId::new(i as u8))
    }

    /// Format a pin's name, e.g. `"B12"`.
    pub fn pin_name(&self, pin: PinId) -> Option<String<MAX_PIN_NAME>> {
        let desc = self.desc(pin)?;
        let mut out = String::new();
        let _ = out.push(desc.port.letter());
        // Port pin numbers are at most two digits
        if desc.num >= 10 {
            let _ = out.push((b'0' + desc.num / 10) as char);
        }
        let _ = out.push((b'0' + desc.num % 10) as char);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PINS: [PinDesc; 4] = [
        PinDesc {
            port: Port::A,
            num: 0,
            caps: PinCaps::GPIO.union(PinCaps::ADC),
        },
        PinDesc {
            port: Port::A,
            num: 1,
            caps: PinCaps::GPIO,
        },
        PinDesc {
            port: Port::B,
            num: 12,
            caps: PinCaps::GPIO.union(PinCaps::USART),
        },
        PinDesc {
            port: Port::B,
            num: 13,
            caps: PinCaps::GPIO,
        },
    ];

    const TEST_BOARD: BoardInfo = BoardInfo {
        name: "TEST",
        pins: &TEST_PINS,
        tick_rate: TickRate::new(1_000_000),
        uarts: &[],
        spis: &[],
        i2cs: &[],
        image_region: 1024,
    };

    #[test]
    fn test_name_lookup() {
        assert_eq!(TEST_BOARD.pin_from_name("A0"), Some(PinId::new(0)));
        assert_eq!(TEST_BOARD.pin_from_name("B12"), Some(PinId::new(2)));
        assert_eq!(TEST_BOARD.pin_from_name("C1"), None);
        assert_eq!(TEST_BOARD.pin_from_name("A9"), None);
        assert_eq!(TEST_BOARD.pin_from_name(""), None);
        assert_eq!(TEST_BOARD.pin_from_name("12"), None);
    }

    #[test]
    fn test_name_format() {
        assert_eq!(TEST_BOARD.pin_name(PinId::new(0)).unwrap().as_str(), "A0");
        assert_eq!(TEST_BOARD.pin_name(PinId::new(2)).unwrap().as_str(), "B12");
        assert!(TEST_BOARD.pin_name(PinId::new(9)).is_none());
    }

    #[test]
    fn test_roundtrip_through_name() {
        for i in 0..TEST_BOARD.pin_count() {
            let pin = PinId::new(i as u8);
            let name = TEST_BOARD.pin_name(pin).unwrap();
            assert_eq!(TEST_BOARD.pin_from_name(name.as_str()), Some(pin));
        }
    }

    #[test]
    fn test_invalid_pin_has_no_caps() {
        assert_eq!(TEST_BOARD.caps(PinId::new(200)), PinCaps::empty());
    }
}
