//! In-memory chip for host-side testing.
//!
//! Implements every `kairos-hal` trait against plain data structures:
//! pin modes and levels, a nanosecond-resolution transition log, an SPI
//! shift register, an I2C transcript, a RAM flash region, and a manual
//! clock that only moves when something delays or sleeps. Tests inspect
//! the recorded state instead of real hardware.
//!
//! This crate runs on the host only; it is free to use `std`.

#![deny(unsafe_code)]

use std::collections::VecDeque;

use kairos_hal::board::{BoardInfo, I2cPins, PinDesc, Port, SpiPins, UartPins};
use kairos_hal::error::HalError;
use kairos_hal::flash::{FlashError, FlashOps};
use kairos_hal::gpio::{AnalogOps, PinCaps, PinId, PinOps, PinState};
use kairos_hal::i2c::{I2cConfig, I2cOps};
use kairos_hal::spi::{FrameSize, SpiConfig, SpiOps};
use kairos_hal::system::SystemOps;
use kairos_hal::time::{Clock, SysTime, TickRate};
use kairos_hal::uart::{UartConfig, UartOps};

/// Tick rate of the simulated counter: one tick per microsecond.
pub const SIM_TICK_HZ: u32 = 1_000_000;

const PIN_COUNT: usize = 16;
const DEVICE_SLOTS: usize = 4;
const IMAGE_REGION: usize = 1024;

const GPIO_ADC: PinCaps = PinCaps::GPIO.union(PinCaps::ADC);
const GPIO_ADC_DAC: PinCaps = GPIO_ADC.union(PinCaps::DAC);
const BUS_CAPS: PinCaps = PinCaps::GPIO
    .union(PinCaps::AF)
    .union(PinCaps::USART)
    .union(PinCaps::I2C);

static SIM_PINS: [PinDesc; PIN_COUNT] = [
    PinDesc { port: Port::A, num: 0, caps: GPIO_ADC },
    PinDesc { port: Port::A, num: 1, caps: PinCaps::GPIO },
    PinDesc { port: Port::A, num: 2, caps: PinCaps::GPIO },
    PinDesc { port: Port::A, num: 3, caps: GPIO_ADC },
    PinDesc { port: Port::A, num: 4, caps: GPIO_ADC_DAC },
    PinDesc { port: Port::A, num: 5, caps: GPIO_ADC },
    PinDesc { port: Port::A, num: 6, caps: GPIO_ADC },
    // Analog-only pin: no digital driver behind it
    PinDesc { port: Port::A, num: 7, caps: PinCaps::ADC },
    PinDesc { port: Port::B, num: 0, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 1, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 2, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 3, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 4, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 5, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 6, caps: BUS_CAPS },
    PinDesc { port: Port::B, num: 7, caps: BUS_CAPS },
];

static SIM_BOARD: BoardInfo = BoardInfo {
    name: "SIM16",
    pins: &SIM_PINS,
    tick_rate: TickRate::new(SIM_TICK_HZ),
    uarts: &[
        UartPins { rx: PinId::new(8), tx: PinId::new(9) },
        UartPins { rx: PinId::new(10), tx: PinId::new(11) },
    ],
    spis: &[SpiPins {
        sck: PinId::new(12),
        miso: PinId::new(13),
        mosi: PinId::new(14),
    }],
    i2cs: &[I2cPins {
        scl: PinId::new(15),
        sda: PinId::new(8),
    }],
    image_region: IMAGE_REGION,
};

/// The simulated board description.
pub fn board() -> &'static BoardInfo {
    &SIM_BOARD
}

/// One recorded pin level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at_ns: u64,
    pub pin: PinId,
    pub level: bool,
    /// Whether interrupts were masked when the change happened
    pub irq_masked: bool,
}

/// Simulated chip.
///
/// Fresh instances start with every pin undefined and low, a blank
/// (erased) flash region, and the clock at zero.
pub struct SimChip {
    now_ns: u64,
    modes: [PinState; PIN_COUNT],
    levels: [bool; PIN_COUNT],
    watched: [bool; PIN_COUNT],
    analog_in: [u16; PIN_COUNT],
    analog_out: [Option<(u16, u32)>; PIN_COUNT],
    transitions: Vec<Transition>,
    irq_masked: bool,
    watchdog_feeds: u32,
    usb: bool,
    serial: &'static [u8],
    uart_configs: [Option<UartConfig>; DEVICE_SLOTS],
    uart_kicks: [u32; DEVICE_SLOTS],
    spi_configs: [Option<SpiConfig>; DEVICE_SLOTS],
    spi_sent: Vec<(u16, FrameSize)>,
    spi_rx: VecDeque<u16>,
    i2c_configs: [Option<I2cConfig>; DEVICE_SLOTS],
    i2c_writes: Vec<(u8, Vec<u8>)>,
    i2c_responses: VecDeque<Vec<u8>>,
    i2c_failures: u32,
    flash: Vec<u8>,
}

impl SimChip {
    pub fn new() -> Self {
        Self {
            now_ns: 0,
            modes: [PinState::Undefined; PIN_COUNT],
            levels: [false; PIN_COUNT],
            watched: [false; PIN_COUNT],
            analog_in: [0; PIN_COUNT],
            analog_out: [None; PIN_COUNT],
            transitions: Vec::new(),
            irq_masked: false,
            watchdog_feeds: 0,
            usb: false,
            serial: b"SIM-000001",
            uart_configs: [None; DEVICE_SLOTS],
            uart_kicks: [0; DEVICE_SLOTS],
            spi_configs: [None; DEVICE_SLOTS],
            spi_sent: Vec::new(),
            spi_rx: VecDeque::new(),
            i2c_configs: [None; DEVICE_SLOTS],
            i2c_writes: Vec::new(),
            i2c_responses: VecDeque::new(),
            i2c_failures: 0,
            flash: vec![0xFF; IMAGE_REGION],
        }
    }

    fn check_pin(pin: PinId) -> Result<usize, HalError> {
        let index = pin.index();
        if index < PIN_COUNT {
            Ok(index)
        } else {
            Err(HalError::InvalidPin)
        }
    }

    fn check_device(index: u8) -> Result<usize, HalError> {
        let index = index as usize;
        if index < DEVICE_SLOTS {
            Ok(index)
        } else {
            Err(HalError::InvalidDevice)
        }
    }

    // ------------------------------------------------- test controls

    /// Advance the manual clock.
    pub fn advance_us(&mut self, us: u64) {
        self.now_ns += us * 1000;
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Preset the raw sample an ADC read will return.
    pub fn set_analog_raw(&mut self, pin: PinId, raw: u16) {
        if let Ok(i) = Self::check_pin(pin) {
            self.analog_in[i] = raw;
        }
    }

    /// Queue a word for the SPI shift register to return.
    pub fn push_spi_rx(&mut self, word: u16) {
        self.spi_rx.push_back(word);
    }

    /// Queue the payload the next I2C read will deliver.
    pub fn queue_i2c_response(&mut self, data: &[u8]) {
        self.i2c_responses.push_back(data.to_vec());
    }

    /// Make the next `times` I2C transfers time out.
    pub fn fail_i2c(&mut self, times: u32) {
        self.i2c_failures = times;
    }

    pub fn set_usb_connected(&mut self, connected: bool) {
        self.usb = connected;
    }

    /// Flip one flash byte, bypassing the driver.
    pub fn corrupt_flash_byte(&mut self, offset: usize) {
        if let Some(byte) = self.flash.get_mut(offset) {
            *byte ^= 0xFF;
        }
    }

    // ----------------------------------------------- test inspection

    pub fn mode(&self, pin: PinId) -> PinState {
        Self::check_pin(pin)
            .map(|i| self.modes[i])
            .unwrap_or(PinState::Undefined)
    }

    pub fn level(&self, pin: PinId) -> bool {
        Self::check_pin(pin).map(|i| self.levels[i]).unwrap_or(false)
    }

    pub fn is_watched(&self, pin: PinId) -> bool {
        Self::check_pin(pin)
            .map(|i| self.watched[i])
            .unwrap_or(false)
    }

    pub fn analog_out(&self, pin: PinId) -> Option<(u16, u32)> {
        Self::check_pin(pin).ok().and_then(|i| self.analog_out[i])
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn irq_masked(&self) -> bool {
        self.irq_masked
    }

    pub fn watchdog_feeds(&self) -> u32 {
        self.watchdog_feeds
    }

    pub fn uart_config(&self, index: u8) -> Option<&UartConfig> {
        self.uart_configs.get(index as usize)?.as_ref()
    }

    pub fn kick_count(&self, index: u8) -> u32 {
        self.uart_kicks.get(index as usize).copied().unwrap_or(0)
    }

    pub fn spi_config(&self, index: u8) -> Option<&SpiConfig> {
        self.spi_configs.get(index as usize)?.as_ref()
    }

    pub fn spi_sent(&self) -> &[(u16, FrameSize)] {
        &self.spi_sent
    }

    pub fn i2c_config(&self, index: u8) -> Option<&I2cConfig> {
        self.i2c_configs.get(index as usize)?.as_ref()
    }

    pub fn i2c_written(&self) -> &[(u8, Vec<u8>)] {
        &self.i2c_writes
    }
}

impl Default for SimChip {
    fn default() -> Self {
        Self::new()
    }
}

impl PinOps for SimChip {
    fn set_mode(&mut self, pin: PinId, state: PinState) -> Result<(), HalError> {
        let i = Self::check_pin(pin)?;
        self.modes[i] = state;
        Ok(())
    }

    fn write(&mut self, pin: PinId, high: bool) {
        if let Ok(i) = Self::check_pin(pin) {
            if self.levels[i] != high {
                self.levels[i] = high;
                self.transitions.push(Transition {
                    at_ns: self.now_ns,
                    pin,
                    level: high,
                    irq_masked: self.irq_masked,
                });
            }
        }
    }

    fn read(&mut self, pin: PinId) -> bool {
        Self::check_pin(pin).map(|i| self.levels[i]).unwrap_or(false)
    }

    fn watch(&mut self, pin: PinId, enable: bool) -> Result<(), HalError> {
        let i = Self::check_pin(pin)?;
        self.watched[i] = enable;
        Ok(())
    }
}

impl AnalogOps for SimChip {
    fn read_raw(&mut self, pin: PinId) -> Result<u16, HalError> {
        let i = Self::check_pin(pin)?;
        Ok(self.analog_in[i])
    }

    fn write_analog(&mut self, pin: PinId, duty: u16, freq_hz: u32) -> Result<(), HalError> {
        let i = Self::check_pin(pin)?;
        self.analog_out[i] = Some((duty, freq_hz));
        Ok(())
    }
}

impl Clock for SimChip {
    fn now(&self) -> SysTime {
        SysTime::from_ticks(self.now_ns / 1000)
    }

    fn tick_rate(&self) -> TickRate {
        SIM_BOARD.tick_rate
    }

    fn delay_ns(&mut self, ns: u32) {
        self.now_ns += ns as u64;
    }
}

impl UartOps for SimChip {
    fn uart_configure(&mut self, index: u8, config: &UartConfig) -> Result<(), HalError> {
        let i = Self::check_device(index)?;
        self.uart_configs[i] = Some(*config);
        Ok(())
    }

    fn uart_kick(&mut self, index: u8) {
        if let Ok(i) = Self::check_device(index) {
            self.uart_kicks[i] += 1;
        }
    }
}

impl SpiOps for SimChip {
    fn spi_configure(&mut self, index: u8, config: &SpiConfig) -> Result<(), HalError> {
        let i = Self::check_device(index)?;
        self.spi_configs[i] = Some(*config);
        Ok(())
    }

    fn spi_transfer_word(
        &mut self,
        index: u8,
        word: u16,
        frame: FrameSize,
    ) -> Result<u16, HalError> {
        let i = Self::check_device(index)?;
        if self.spi_configs[i].is_none() {
            return Err(HalError::NotConfigured);
        }
        let mask = match frame {
            FrameSize::Bits8 => 0x00FF,
            FrameSize::Bits16 => 0xFFFF,
        };
        self.spi_sent.push((word & mask, frame));
        Ok(self.spi_rx.pop_front().unwrap_or(0) & mask)
    }
}

impl I2cOps for SimChip {
    fn i2c_configure(&mut self, index: u8, config: &I2cConfig) -> Result<(), HalError> {
        let i = Self::check_device(index)?;
        self.i2c_configs[i] = Some(*config);
        Ok(())
    }

    fn i2c_write(&mut self, index: u8, address: u8, data: &[u8]) -> Result<(), HalError> {
        let i = Self::check_device(index)?;
        if self.i2c_configs[i].is_none() {
            return Err(HalError::NotConfigured);
        }
        if self.i2c_failures > 0 {
            self.i2c_failures -= 1;
            return Err(HalError::BusTimeout);
        }
        self.i2c_writes.push((address, data.to_vec()));
        Ok(())
    }

    fn i2c_read(&mut self, index: u8, _address: u8, buf: &mut [u8]) -> Result<(), HalError> {
        let i = Self::check_device(index)?;
        if self.i2c_configs[i].is_none() {
            return Err(HalError::NotConfigured);
        }
        if self.i2c_failures > 0 {
            self.i2c_failures -= 1;
            return Err(HalError::BusTimeout);
        }
        // No queued response means nothing answered the address
        let response = self.i2c_responses.pop_front().ok_or(HalError::BusTimeout)?;
        let n = response.len().min(buf.len());
        buf[..n].copy_from_slice(&response[..n]);
        Ok(())
    }
}

impl FlashOps for SimChip {
    fn flash_capacity(&self) -> usize {
        self.flash.len()
    }

    fn flash_erase(&mut self) -> Result<(), FlashError> {
        self.flash.fill(0xFF);
        Ok(())
    }

    fn flash_read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let end = offset.checked_add(buf.len()).ok_or(FlashError::Flash)?;
        let src = self.flash.get(offset..end).ok_or(FlashError::Flash)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn flash_write(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        let end = offset.checked_add(data.len()).ok_or(FlashError::Flash)?;
        let dst = self.flash.get_mut(offset..end).ok_or(FlashError::Flash)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

impl SystemOps for SimChip {
    fn irq_disable(&mut self) {
        self.irq_masked = true;
    }

    fn irq_enable(&mut self) {
        self.irq_masked = false;
    }

    fn wait_for_event(&mut self, deadline: Option<SysTime>) {
        match deadline {
            Some(deadline) => {
                let target_ns = deadline.ticks() * 1000;
                if target_ns > self.now_ns {
                    self.now_ns = target_ns;
                }
            }
            // Nothing scheduled: model an arbitrary wake one tick later
            None => self.now_ns += 1000,
        }
    }

    fn feed_watchdog(&mut self) {
        self.watchdog_feeds += 1;
    }

    fn serial_number(&mut self, buf: &mut [u8]) -> usize {
        let n = self.serial.len().min(buf.len());
        buf[..n].copy_from_slice(&self.serial[..n]);
        n
    }

    fn usb_connected(&self) -> bool {
        self.usb
    }
}
