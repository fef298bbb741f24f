//! The owned HAL context.
//!
//! One microcontroller, one set of peripherals: rather than ambient
//! globals, all hardware state lives in a single [`Hal`] value that is
//! passed explicitly to every operation. The interpreter calls in from
//! the main loop; interrupt handlers call only [`Hal::isr_edge`], which
//! records a captured edge and returns. Everything the interpreter can
//! observe happens when the main loop runs [`Hal::idle`].

use heapless::String;

use kairos_hal::board::{BoardInfo, MAX_PIN_NAME};
use kairos_hal::error::HalError;
use kairos_hal::flash::FlashError;
use kairos_hal::gpio::{PinCaps, PinId, PinState};
use kairos_hal::i2c::{self, I2cConfig, I2cRole};
use kairos_hal::spi::{FrameSize, SpiConfig};
use kairos_hal::time::{SysTime, TickRate};
use kairos_hal::uart::UartConfig;
use kairos_hal::{
    AnalogOps, Chip, Clock, I2cOps, PinOps, SpiOps, SystemOps, UartOps,
};

use crate::bitbang::BitTiming;
use crate::devices::{DeviceId, DeviceTable, SpiSlot, MAX_I2CS, MAX_SPIS, MAX_UARTS};
use crate::events::{CaptureQueue, CapturedEdge, Notification, ScheduledOutput, TimerQueue};
use crate::persist;
use crate::pins::{Applied, PinRegistry};

/// Bounded retries for a stuck I2C bus before the failure surfaces.
const I2C_ATTEMPTS: u32 = 3;

/// Hardware abstraction context.
///
/// Owns the chip driver and every piece of HAL state. Single-threaded
/// cooperative use: all methods except [`Hal::isr_edge`] are main-context
/// only.
pub struct Hal<C: Chip> {
    chip: C,
    board: &'static BoardInfo,
    pins: PinRegistry,
    capture: CaptureQueue,
    timer: TimerQueue,
    devices: DeviceTable,
    irq_depth: u8,
}

impl<C: Chip> Hal<C> {
    pub fn new(chip: C, board: &'static BoardInfo) -> Self {
        Self {
            chip,
            board,
            pins: PinRegistry::new(board),
            capture: CaptureQueue::new(),
            timer: TimerQueue::new(),
            devices: DeviceTable::new(),
            irq_depth: 0,
        }
    }

    pub fn board(&self) -> &'static BoardInfo {
        self.board
    }

    /// Direct access to the chip driver for chip-specific extras.
    pub fn chip(&self) -> &C {
        &self.chip
    }

    pub fn chip_mut(&mut self) -> &mut C {
        &mut self.chip
    }

    /// Release every non-manual pin and return the chip driver.
    pub fn into_chip(mut self) -> C {
        self.shutdown();
        self.chip
    }

    /// Return every non-manual pin to `Undefined`.
    pub fn shutdown(&mut self) {
        for i in 0..self.pins.pin_count() {
            let pin = PinId::new(i as u8);
            if !self.pins.is_manual(pin) && self.pins.state(pin) != PinState::Undefined {
                let _ = self.set_pin_state(pin, PinState::Undefined);
            }
        }
    }

    // ------------------------------------------------------------ time

    pub fn now(&self) -> SysTime {
        self.chip.now()
    }

    pub fn tick_rate(&self) -> TickRate {
        self.chip.tick_rate()
    }

    /// Busy-wait in microseconds.
    pub fn delay_us(&mut self, us: u32) {
        self.chip.delay_us(us);
    }

    // -------------------------------------------------------- identity

    /// Resolve an `"A0"`-style name to a pin id.
    pub fn pin_from_name(&self, name: &str) -> Option<PinId> {
        self.board.pin_from_name(name)
    }

    /// Format a pin's name for display.
    pub fn pin_name(&self, pin: PinId) -> Option<String<MAX_PIN_NAME>> {
        self.board.pin_name(pin)
    }

    /// Copy the chip serial number into `buf`, returning bytes written.
    pub fn serial_number(&mut self, buf: &mut [u8]) -> usize {
        self.chip.serial_number(buf)
    }

    pub fn usb_connected(&self) -> bool {
        self.chip.usb_connected()
    }

    // --------------------------------------------- pin state machine

    pub fn pin_is_valid(&self, pin: PinId) -> bool {
        self.pins.is_valid(pin)
    }

    pub fn pin_state(&self, pin: PinId) -> PinState {
        self.pins.state(pin)
    }

    pub fn pin_is_manual(&self, pin: PinId) -> bool {
        self.pins.is_manual(pin)
    }

    /// Fix or release the manual flag.
    ///
    /// While set, peripheral setup will not touch the pin; explicit
    /// calls like [`Hal::set_pin_state`] still go through.
    pub fn set_pin_manual(&mut self, pin: PinId, manual: bool) -> Result<(), HalError> {
        self.pins.set_manual(pin, manual)
    }

    /// Move a pin into a role.
    ///
    /// Fails if the role is outside the pin's capability set; otherwise
    /// commits unconditionally, silently releasing whatever claimed the
    /// pin before. Repeating the current role touches nothing.
    pub fn set_pin_state(&mut self, pin: PinId, state: PinState) -> Result<(), HalError> {
        if let Applied::Changed = self.pins.try_set_state(pin, state)? {
            self.chip.set_mode(pin, state)?;
        }
        Ok(())
    }

    /// Move a pin into a role unless the interpreter has fixed it.
    fn coerce_pin(&mut self, pin: PinId, state: PinState) -> Result<(), HalError> {
        if !self.pins.is_valid(pin) {
            return Err(HalError::InvalidPin);
        }
        if self.pins.is_manual(pin) {
            return Ok(());
        }
        self.set_pin_state(pin, state)
    }

    // ------------------------------------------------------ pin I/O

    /// Raw level write; no role coercion. Safe from interrupt context.
    pub fn pin_set_value(&mut self, pin: PinId, high: bool) {
        if self.pins.is_valid(pin) {
            self.chip.write(pin, high);
        }
    }

    /// Raw level read; no role coercion.
    pub fn pin_get_value(&mut self, pin: PinId) -> bool {
        self.pins.is_valid(pin) && self.chip.read(pin)
    }

    /// Drive the pin, coercing it to GPIO output first.
    pub fn pin_output(&mut self, pin: PinId, high: bool) -> Result<(), HalError> {
        self.coerce_pin(pin, PinState::GpioOut)?;
        self.chip.write(pin, high);
        Ok(())
    }

    /// Read the pin, coercing it to GPIO input first.
    pub fn pin_input(&mut self, pin: PinId) -> Result<bool, HalError> {
        self.coerce_pin(pin, PinState::GpioIn)?;
        Ok(self.chip.read(pin))
    }

    /// Analog reading as a fraction in `[0, 1]`.
    ///
    /// Out-of-range hardware readings clamp rather than error.
    pub fn pin_analog(&mut self, pin: PinId) -> Result<f32, HalError> {
        self.coerce_pin(pin, PinState::AdcIn)?;
        let raw = self.chip.read_raw(pin)?;
        Ok((raw as f32 / 65535.0).clamp(0.0, 1.0))
    }

    /// Analog output of a fraction in `[0, 1]`.
    ///
    /// Uses the DAC when the pin has one, PWM otherwise. A `None`
    /// frequency selects the chip's default carrier rate.
    pub fn pin_analog_output(
        &mut self,
        pin: PinId,
        value: f32,
        freq_hz: Option<u32>,
    ) -> Result<(), HalError> {
        let state = if self.board.caps(pin).contains(PinCaps::DAC) {
            PinState::DacOut
        } else {
            PinState::AfOut
        };
        self.coerce_pin(pin, state)?;
        let duty = (value.clamp(0.0, 1.0) * 65535.0) as u16;
        self.chip.write_analog(pin, duty, freq_hz.unwrap_or(0))
    }

    /// Drive the pin to `high` and schedule the reversion after
    /// `duration_ms`, without blocking.
    ///
    /// Reports [`HalError::QueueFull`] when the scheduled-output queue
    /// cannot take the reversion; the pin is left driven.
    pub fn pin_pulse(&mut self, pin: PinId, high: bool, duration_ms: f64) -> Result<(), HalError> {
        self.pin_output(pin, high)?;
        let delta = self.tick_rate().ms_to_ticks(duration_ms);
        let due = self.chip.now() + delta;
        self.timer.schedule(ScheduledOutput {
            time: due,
            pin,
            level: !high,
        })
    }

    /// Arm or disarm edge capture on the pin.
    ///
    /// While armed, every edge the interrupt handler observes becomes a
    /// captured event, subject to queue capacity.
    pub fn pin_watch(&mut self, pin: PinId, enable: bool) -> Result<(), HalError> {
        if enable {
            self.coerce_pin(pin, PinState::GpioIn)?;
        }
        self.chip.watch(pin, enable)
    }

    /// Current level of a watched pin.
    pub fn watched_pin_state(&mut self, pin: PinId) -> bool {
        self.pin_get_value(pin)
    }

    // --------------------------------------------------- scheduling

    /// Schedule a pin transition for a future time.
    ///
    /// Reports [`HalError::QueueFull`] instead of blocking or dropping
    /// earlier entries; the caller coalesces or sheds work.
    pub fn output_at_time(
        &mut self,
        time: SysTime,
        pin: PinId,
        level: bool,
    ) -> Result<(), HalError> {
        if !self.pins.is_valid(pin) {
            return Err(HalError::InvalidPin);
        }
        self.timer.schedule(ScheduledOutput { time, pin, level })
    }

    /// Record an observed edge. Interrupt-context entry point.
    ///
    /// Stamps the edge with the capture-time tick and enqueues it;
    /// never blocks, never allocates. On overflow the edge is dropped
    /// and the loss is reported once on the next drain.
    pub fn isr_edge(&mut self, pin: PinId, level: bool) {
        let time = self.chip.now();
        self.capture.push(CapturedEdge { pin, level, time });
    }

    // -------------------------------------------------- power / idle

    /// Idle-loop service: feed the watchdog, then drain all due events.
    ///
    /// Captured edges are handed to `sink` in arrival order; scheduled
    /// outputs whose time has come perform their pin write and are
    /// reported after it takes effect. This is the single point where
    /// hardware changes become observable to the interpreter.
    pub fn idle<F: FnMut(Notification)>(&mut self, mut sink: F) {
        self.chip.feed_watchdog();
        if self.capture.take_overflow() {
            sink(Notification::CaptureOverflow);
        }
        while let Some(edge) = self.capture.pop() {
            sink(Notification::Edge(edge));
        }
        let now = self.chip.now();
        while let Some(event) = self.timer.pop_due(now) {
            // A pin that went invalid keeps its last good state; the
            // drain itself never aborts
            let _ = self.pin_output(event.pin, event.level);
            sink(Notification::OutputFired {
                pin: event.pin,
                level: event.level,
                due: event.time,
            });
        }
    }

    /// Halt until the next interrupt.
    ///
    /// Pending scheduled outputs are never cancelled: the chip is told
    /// the next deadline so a wakeup arrives in time, and a late wakeup
    /// fires them late but in order.
    pub fn sleep(&mut self) {
        let deadline = self.timer.next_deadline();
        self.chip.wait_for_event(deadline);
    }

    /// Enter the critical section. Nesting-safe: the chip-level mask is
    /// taken on the outermost entry only.
    pub fn interrupts_off(&mut self) {
        if self.irq_depth == 0 {
            self.chip.irq_disable();
        }
        self.irq_depth = self.irq_depth.saturating_add(1);
    }

    /// Leave the critical section. Unbalanced calls at depth zero are
    /// no-ops rather than faults.
    pub fn interrupts_on(&mut self) {
        match self.irq_depth {
            0 => {}
            1 => {
                self.irq_depth = 0;
                self.chip.irq_enable();
            }
            _ => self.irq_depth -= 1,
        }
    }

    // ------------------------------------------------------ bit-bang

    /// Generate a bit-banged waveform on `pin`.
    ///
    /// Runs with interrupts masked for the whole burst, since jitter
    /// beyond a few hundred nanoseconds corrupts one-wire protocols.
    /// This is the one operation permitted to stall the entire device
    /// for its duration; callers budget for `bits x (tXh + tXl)`.
    pub fn bit_bang<I>(&mut self, pin: PinId, timing: &BitTiming, bits: I) -> Result<(), HalError>
    where
        I: IntoIterator<Item = bool>,
    {
        self.pin_output(pin, false)?;
        self.interrupts_off();
        for bit in bits {
            self.chip.write(pin, true);
            self.chip.delay_ns(timing.high_ns(bit));
            self.chip.write(pin, false);
            self.chip.delay_ns(timing.low_ns(bit));
        }
        self.interrupts_on();
        Ok(())
    }

    // ------------------------------------------------------- devices

    pub fn device_is_initialised(&self, dev: DeviceId) -> bool {
        self.devices.is_initialised(dev)
    }

    /// Trigger the next pending unit of background work on a device.
    ///
    /// Only UARTs transmit from interrupts; for the synchronous buses
    /// this is a no-op. Idempotent when nothing is pending.
    pub fn kick(&mut self, dev: DeviceId) -> Result<(), HalError> {
        if !self.devices.is_initialised(dev) {
            return Err(HalError::NotConfigured);
        }
        if let DeviceId::Uart(index) = dev {
            self.chip.uart_kick(index);
        }
        Ok(())
    }

    /// Configure a UART instance.
    ///
    /// `None` pins resolve to the board defaults. All bindings are
    /// validated before anything is touched, so a failure leaves the
    /// previous configuration and every pin exactly as they were.
    pub fn uart_setup(&mut self, index: u8, config: &UartConfig) -> Result<(), HalError> {
        if index as usize >= MAX_UARTS {
            return Err(HalError::InvalidDevice);
        }
        let defaults = *self
            .board
            .uarts
            .get(index as usize)
            .ok_or(HalError::InvalidDevice)?;
        let rx = config.rx.unwrap_or(defaults.rx);
        let tx = config.tx.unwrap_or(defaults.tx);
        let bindings = [(rx, PinState::UsartIn), (tx, PinState::UsartOut)];
        self.validate_bindings(&bindings)?;

        let mut resolved = *config;
        resolved.rx = Some(rx);
        resolved.tx = Some(tx);
        self.chip.uart_configure(index, &resolved)?;

        self.rebind(DeviceId::Uart(index), &bindings)?;
        self.devices.set_uart(index, resolved)
    }

    /// Configure an SPI instance.
    ///
    /// Same atomicity as [`Hal::uart_setup`]. Resets framing to 8 bits
    /// and clears the buffered receive word.
    pub fn spi_setup(&mut self, index: u8, config: &SpiConfig) -> Result<(), HalError> {
        if index as usize >= MAX_SPIS {
            return Err(HalError::InvalidDevice);
        }
        let defaults = *self
            .board
            .spis
            .get(index as usize)
            .ok_or(HalError::InvalidDevice)?;
        let sck = config.sck.unwrap_or(defaults.sck);
        let miso = config.miso.unwrap_or(defaults.miso);
        let mosi = config.mosi.unwrap_or(defaults.mosi);
        let bindings = [
            (sck, PinState::AfOut),
            (miso, PinState::AfOut),
            (mosi, PinState::AfOut),
        ];
        self.validate_bindings(&bindings)?;

        let mut resolved = *config;
        resolved.sck = Some(sck);
        resolved.miso = Some(miso);
        resolved.mosi = Some(mosi);
        self.chip.spi_configure(index, &resolved)?;

        self.rebind(DeviceId::Spi(index), &bindings)?;
        self.devices.set_spi(index, SpiSlot::new(resolved))
    }

    /// Configure an I2C instance.
    ///
    /// Same atomicity as [`Hal::uart_setup`]. The role is recorded at
    /// setup; the transfer calls below serve masters only.
    pub fn i2c_setup(&mut self, index: u8, config: &I2cConfig) -> Result<(), HalError> {
        if index as usize >= MAX_I2CS {
            return Err(HalError::InvalidDevice);
        }
        let defaults = *self
            .board
            .i2cs
            .get(index as usize)
            .ok_or(HalError::InvalidDevice)?;
        let scl = config.scl.unwrap_or(defaults.scl);
        let sda = config.sda.unwrap_or(defaults.sda);
        let bindings = [(scl, PinState::I2c), (sda, PinState::I2c)];
        self.validate_bindings(&bindings)?;

        let mut resolved = *config;
        resolved.scl = Some(scl);
        resolved.sda = Some(sda);
        self.chip.i2c_configure(index, &resolved)?;

        self.rebind(DeviceId::I2c(index), &bindings)?;
        self.devices.set_i2c(index, resolved)
    }

    fn validate_bindings(&self, bindings: &[(PinId, PinState)]) -> Result<(), HalError> {
        for &(pin, state) in bindings {
            if !self.board.caps(pin).allows(state) {
                return Err(if self.board.desc(pin).is_none() {
                    HalError::InvalidPin
                } else {
                    HalError::CapabilityMissing
                });
            }
            if self.pins.is_manual(pin) {
                return Err(HalError::PinLocked);
            }
        }
        Ok(())
    }

    /// Release the pins a device no longer uses, then claim the new set.
    ///
    /// Caller has already validated every binding. A pin claimed here
    /// that another device thought it owned is silently reassigned:
    /// last setup wins.
    fn rebind(&mut self, dev: DeviceId, bindings: &[(PinId, PinState)]) -> Result<(), HalError> {
        let previous = self.devices.claimed_pins(dev);
        for pin in previous {
            if bindings.iter().any(|(p, _)| *p == pin) {
                continue;
            }
            if !self.pins.is_manual(pin) {
                let _ = self.set_pin_state(pin, PinState::Undefined);
            }
        }
        for &(pin, state) in bindings {
            self.set_pin_state(pin, state)?;
        }
        Ok(())
    }

    // ----------------------------------------------------------- SPI

    /// Transmit over SPI and collect the previously shifted-in byte.
    ///
    /// With `Some(byte)` the byte goes out in the current framing and
    /// the previous receive is returned (`None` before the first
    /// transfer). With `None` nothing is transmitted and the buffered
    /// receive word is collected without waiting.
    pub fn spi_send(&mut self, index: u8, data: Option<u8>) -> Result<Option<u8>, HalError> {
        let frame = self.devices.spi_mut(index)?.frame;
        match data {
            Some(byte) => {
                let rx = self.chip.spi_transfer_word(index, byte as u16, frame)?;
                let slot = self.devices.spi_mut(index)?;
                let previous = slot.last_rx.replace(rx);
                Ok(previous.map(|w| (w & 0xFF) as u8))
            }
            None => {
                let slot = self.devices.spi_mut(index)?;
                Ok(slot.last_rx.take().map(|w| (w & 0xFF) as u8))
            }
        }
    }

    /// Transmit one 16-bit word regardless of the current framing.
    pub fn spi_send16(&mut self, index: u8, word: u16) -> Result<(), HalError> {
        self.devices.spi_mut(index)?;
        let rx = self.chip.spi_transfer_word(index, word, FrameSize::Bits16)?;
        self.devices.spi_mut(index)?.last_rx = Some(rx);
        Ok(())
    }

    /// Switch framing for subsequent [`Hal::spi_send`] calls.
    ///
    /// Does not disturb data already buffered but uncollected.
    pub fn spi_set_16bit(&mut self, index: u8, sixteen: bool) -> Result<(), HalError> {
        let slot = self.devices.spi_mut(index)?;
        slot.frame = if sixteen {
            FrameSize::Bits16
        } else {
            FrameSize::Bits8
        };
        Ok(())
    }

    // ----------------------------------------------------------- I2C

    fn i2c_check(&self, index: u8, address: u8) -> Result<(), HalError> {
        let config = self.devices.i2c(index).ok_or({
            if (index as usize) < MAX_I2CS {
                HalError::NotConfigured
            } else {
                HalError::InvalidDevice
            }
        })?;
        if config.role != I2cRole::Master {
            return Err(HalError::Unsupported);
        }
        if address > i2c::MAX_ADDRESS {
            return Err(HalError::InvalidDevice);
        }
        Ok(())
    }

    /// Master write. A stuck bus is retried a bounded number of times,
    /// then surfaces [`HalError::BusTimeout`].
    pub fn i2c_write(&mut self, index: u8, address: u8, data: &[u8]) -> Result<(), HalError> {
        self.i2c_check(index, address)?;
        let mut result = Ok(());
        for _ in 0..I2C_ATTEMPTS {
            result = self.chip.i2c_write(index, address, data);
            match result {
                Err(HalError::BusTimeout) => continue,
                _ => break,
            }
        }
        result
    }

    /// Master read filling `buf`. Same bounded retry as
    /// [`Hal::i2c_write`].
    pub fn i2c_read(&mut self, index: u8, address: u8, buf: &mut [u8]) -> Result<(), HalError> {
        self.i2c_check(index, address)?;
        let mut result = Ok(());
        for _ in 0..I2C_ATTEMPTS {
            result = self.chip.i2c_read(index, address, buf);
            match result {
                Err(HalError::BusTimeout) => continue,
                _ => break,
            }
        }
        result
    }

    // --------------------------------------------------------- flash

    /// Persist an interpreter image, replacing any previous one.
    pub fn save_to_flash(&mut self, image: &[u8]) -> Result<(), FlashError> {
        persist::save(&mut self.chip, image)
    }

    /// Load the persisted image into `buf`, returning the byte count.
    pub fn load_from_flash(&mut self, buf: &mut [u8]) -> Result<usize, FlashError> {
        persist::load(&mut self.chip, buf)
    }

    /// Cheap probe for a valid persisted image.
    pub fn flash_contains_image(&mut self) -> bool {
        persist::contains_image(&mut self.chip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;
    use kairos_hal::board::UartPins;
    use kairos_hal::spi::MODE_0;
    use kairos_hal_sim::SimChip;

    fn new_hal() -> Hal<SimChip> {
        Hal::new(SimChip::new(), kairos_hal_sim::board())
    }

    fn pin(hal: &Hal<SimChip>, name: &str) -> PinId {
        hal.pin_from_name(name).unwrap()
    }

    fn drain(hal: &mut Hal<SimChip>) -> Vec<Notification, 64> {
        let mut seen = Vec::new();
        hal.idle(|n| {
            let _ = seen.push(n);
        });
        seen
    }

    #[test]
    fn test_pin_names_roundtrip() {
        let hal = new_hal();
        let a0 = pin(&hal, "A0");
        assert_eq!(hal.pin_name(a0).unwrap().as_str(), "A0");
        assert_eq!(hal.pin_from_name("Z9"), None);
    }

    #[test]
    fn test_pin_output_coerces_role() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        hal.pin_output(a1, true).unwrap();
        assert_eq!(hal.pin_state(a1), PinState::GpioOut);
        assert_eq!(hal.chip().mode(a1), PinState::GpioOut);
        assert!(hal.chip().level(a1));
        hal.pin_output(a1, false).unwrap();
        assert!(!hal.chip().level(a1));
    }

    #[test]
    fn test_manual_pin_keeps_role_but_still_writes() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        hal.set_pin_state(a1, PinState::GpioIn).unwrap();
        hal.set_pin_manual(a1, true).unwrap();
        hal.pin_output(a1, true).unwrap();
        // Role untouched, value register written anyway
        assert_eq!(hal.pin_state(a1), PinState::GpioIn);
        assert!(hal.chip().level(a1));
    }

    #[test]
    fn test_pin_input_coerces_role() {
        let mut hal = new_hal();
        let a2 = pin(&hal, "A2");
        let _ = hal.pin_input(a2).unwrap();
        assert_eq!(hal.pin_state(a2), PinState::GpioIn);
    }

    #[test]
    fn test_analog_read_is_normalized() {
        let mut hal = new_hal();
        let a0 = pin(&hal, "A0");
        hal.chip_mut().set_analog_raw(a0, u16::MAX);
        assert_eq!(hal.pin_analog(a0).unwrap(), 1.0);
        hal.chip_mut().set_analog_raw(a0, 0);
        assert_eq!(hal.pin_analog(a0).unwrap(), 0.0);
        hal.chip_mut().set_analog_raw(a0, u16::MAX / 2);
        let mid = hal.pin_analog(a0).unwrap();
        assert!((mid - 0.5).abs() < 0.01);
        assert_eq!(hal.pin_state(a0), PinState::AdcIn);
    }

    #[test]
    fn test_analog_output_picks_dac_or_pwm() {
        let mut hal = new_hal();
        // A4 carries a DAC on the sim board; A1 does not
        let a4 = pin(&hal, "A4");
        hal.pin_analog_output(a4, 0.5, None).unwrap();
        assert_eq!(hal.pin_state(a4), PinState::DacOut);

        let b4 = pin(&hal, "B4");
        hal.pin_analog_output(b4, 1.5, Some(440)).unwrap();
        assert_eq!(hal.pin_state(b4), PinState::AfOut);
        // Value clamps to full scale
        assert_eq!(hal.chip().analog_out(b4), Some((u16::MAX, 440)));
    }

    #[test]
    fn test_pulse_schedules_reversion() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        hal.pin_pulse(a1, true, 5.0).unwrap();
        assert!(hal.chip().level(a1));

        // Not due yet
        hal.chip_mut().advance_us(4_000);
        assert!(drain(&mut hal).is_empty());
        assert!(hal.chip().level(a1));

        hal.chip_mut().advance_us(1_100);
        let seen = drain(&mut hal);
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            seen[0],
            Notification::OutputFired { level: false, .. }
        ));
        assert!(!hal.chip().level(a1));
    }

    #[test]
    fn test_scheduled_outputs_fire_in_time_order() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        let now = hal.now();
        // Enqueued out of order on purpose
        hal.output_at_time(now + 300, a1, true).unwrap();
        hal.output_at_time(now + 100, a1, true).unwrap();
        hal.output_at_time(now + 200, a1, false).unwrap();

        hal.chip_mut().advance_us(400);
        let seen = drain(&mut hal);
        let fired: Vec<u64, 8> = seen
            .iter()
            .filter_map(|n| match n {
                Notification::OutputFired { due, .. } => Some(due.ticks()),
                _ => None,
            })
            .collect();
        assert_eq!(fired.as_slice(), &[
            now.ticks() + 100,
            now.ticks() + 200,
            now.ticks() + 300
        ]);
        // Final value is the t3 value
        assert!(hal.chip().level(a1));
    }

    #[test]
    fn test_schedule_queue_bound() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        let now = hal.now();
        for i in 0..TimerQueue::capacity() {
            hal.output_at_time(now + 1000 + i as u64, a1, true).unwrap();
        }
        assert_eq!(
            hal.output_at_time(now + 5000, a1, true),
            Err(HalError::QueueFull)
        );
        // The first N events still fire
        hal.chip_mut().advance_us(10_000);
        assert_eq!(drain(&mut hal).len(), TimerQueue::capacity());
    }

    #[test]
    fn test_invalid_pin_is_neutral() {
        let mut hal = new_hal();
        let bogus = PinId::new(99);
        assert_eq!(hal.pin_output(bogus, true), Err(HalError::InvalidPin));
        assert_eq!(
            hal.output_at_time(hal.now() + 10, bogus, true),
            Err(HalError::InvalidPin)
        );
        assert!(!hal.pin_get_value(bogus));
        hal.pin_set_value(bogus, true); // no-op, no panic
    }

    #[test]
    fn test_watch_delivers_edges_in_order() {
        let mut hal = new_hal();
        let a2 = pin(&hal, "A2");
        hal.pin_watch(a2, true).unwrap();
        assert!(hal.chip().is_watched(a2));
        assert_eq!(hal.pin_state(a2), PinState::GpioIn);

        hal.isr_edge(a2, true);
        hal.chip_mut().advance_us(50);
        hal.isr_edge(a2, false);

        let seen = drain(&mut hal);
        assert_eq!(seen.len(), 2);
        match (&seen[0], &seen[1]) {
            (Notification::Edge(first), Notification::Edge(second)) => {
                assert!(first.level);
                assert!(!second.level);
                assert_eq!(second.time.ticks_since(first.time), 50);
                assert!(seen[0].is_for_pin(a2));
            }
            other => panic!("unexpected notifications: {other:?}"),
        }

        // Drained queue stays drained
        assert!(drain(&mut hal).is_empty());
    }

    #[test]
    fn test_capture_overflow_reported_once() {
        let mut hal = new_hal();
        let a2 = pin(&hal, "A2");
        hal.pin_watch(a2, true).unwrap();
        for _ in 0..CaptureQueue::capacity() + 5 {
            hal.isr_edge(a2, true);
        }
        let seen = drain(&mut hal);
        assert_eq!(seen[0], Notification::CaptureOverflow);
        assert_eq!(seen.len(), CaptureQueue::capacity() + 1);

        // Next drain carries no stale overflow marker
        hal.isr_edge(a2, false);
        let seen = drain(&mut hal);
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Notification::Edge(_)));
    }

    #[test]
    fn test_sleep_wakes_for_next_deadline() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        let due = hal.now() + 1_000;
        hal.output_at_time(due, a1, true).unwrap();

        hal.sleep();
        assert!(hal.now() >= due);
        let seen = drain(&mut hal);
        assert_eq!(seen.len(), 1);
        assert!(hal.chip().level(a1));
    }

    #[test]
    fn test_interrupt_nesting() {
        let mut hal = new_hal();
        hal.interrupts_off();
        hal.interrupts_off();
        assert!(hal.chip().irq_masked());
        hal.interrupts_on();
        assert!(hal.chip().irq_masked());
        hal.interrupts_on();
        assert!(!hal.chip().irq_masked());
        // Unbalanced release stays a no-op
        hal.interrupts_on();
        assert!(!hal.chip().irq_masked());
    }

    #[test]
    fn test_bitbang_waveform() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        let timing = BitTiming::from_us(0.4, 0.85, 0.85, 0.4);
        hal.bit_bang(a1, &timing, [true, false, true]).unwrap();

        let transitions = hal.chip().transitions();
        // Two segments per bit
        assert_eq!(transitions.len(), 6);
        let durations: Vec<u64, 8> = transitions
            .windows(2)
            .map(|w| w[1].at_ns - w[0].at_ns)
            .collect();
        // bit 1: 850 high, 400 low; bit 0: 400 high, 850 low; bit 1: 850 high
        assert_eq!(durations.as_slice(), &[850, 400, 400, 850, 850]);
        // Rise/fall alternation, starting high
        assert!(transitions[0].level);
        assert!(!transitions[5].level);
        // Interrupts stayed masked for the whole burst, and are back on
        assert!(transitions.iter().all(|t| t.irq_masked));
        assert!(!hal.chip().irq_masked());
    }

    #[test]
    fn test_uart_setup_resolves_defaults() {
        let mut hal = new_hal();
        let b0 = pin(&hal, "B0");
        let b1 = pin(&hal, "B1");
        hal.uart_setup(0, &UartConfig::default()).unwrap();

        assert!(hal.device_is_initialised(DeviceId::Uart(0)));
        assert_eq!(hal.pin_state(b0), PinState::UsartIn);
        assert_eq!(hal.pin_state(b1), PinState::UsartOut);
        let stored = hal.chip().uart_config(0).unwrap();
        assert_eq!(stored.rx, Some(b0));
        assert_eq!(stored.tx, Some(b1));
        assert_eq!(stored.baud, 9600);
    }

    #[test]
    fn test_uart_resetup_releases_old_pins() {
        let mut hal = new_hal();
        let b0 = pin(&hal, "B0");
        let b1 = pin(&hal, "B1");
        let b2 = pin(&hal, "B2");
        let b3 = pin(&hal, "B3");
        hal.uart_setup(0, &UartConfig::default()).unwrap();

        let moved = UartConfig {
            rx: Some(b2),
            tx: Some(b3),
            ..Default::default()
        };
        hal.uart_setup(0, &moved).unwrap();
        assert_eq!(hal.pin_state(b0), PinState::Undefined);
        assert_eq!(hal.pin_state(b1), PinState::Undefined);
        assert_eq!(hal.pin_state(b2), PinState::UsartIn);
        assert_eq!(hal.pin_state(b3), PinState::UsartOut);
    }

    #[test]
    fn test_manual_lock_blocks_setup() {
        let mut hal = new_hal();
        let b0 = pin(&hal, "B0");
        hal.set_pin_state(b0, PinState::GpioOut).unwrap();
        hal.set_pin_manual(b0, true).unwrap();

        // Default rx for UART 0 is B0: the binding must fail
        assert_eq!(
            hal.uart_setup(0, &UartConfig::default()),
            Err(HalError::PinLocked)
        );
        assert_eq!(hal.pin_state(b0), PinState::GpioOut);
        assert!(!hal.device_is_initialised(DeviceId::Uart(0)));
        assert!(hal.chip().uart_config(0).is_none());
    }

    #[test]
    fn test_failed_setup_keeps_previous_config() {
        let mut hal = new_hal();
        hal.uart_setup(0, &UartConfig::default()).unwrap();

        // A7 is analog-only; binding it as TX must fail validation
        let a7 = pin(&hal, "A7");
        let bad = UartConfig {
            tx: Some(a7),
            ..Default::default()
        };
        assert_eq!(hal.uart_setup(0, &bad), Err(HalError::CapabilityMissing));

        // Previous configuration and pins intact
        let b0 = pin(&hal, "B0");
        assert_eq!(hal.pin_state(b0), PinState::UsartIn);
        let stored = hal.chip().uart_config(0).unwrap();
        assert_eq!(stored.tx, Some(pin(&hal, "B1")));
    }

    #[test]
    fn test_last_setup_wins_on_shared_pin() {
        let mut hal = new_hal();
        let b0 = pin(&hal, "B0");
        hal.uart_setup(0, &UartConfig::default()).unwrap();
        assert_eq!(hal.pin_state(b0), PinState::UsartIn);

        // I2C 0 defaults also claim B0 (as SDA): silently reassigned
        hal.i2c_setup(0, &I2cConfig::STANDARD).unwrap();
        assert_eq!(hal.pin_state(b0), PinState::I2c);
    }

    #[test]
    fn test_uart_kick() {
        let mut hal = new_hal();
        assert_eq!(
            hal.kick(DeviceId::Uart(0)),
            Err(HalError::NotConfigured)
        );
        hal.uart_setup(0, &UartConfig::default()).unwrap();
        hal.kick(DeviceId::Uart(0)).unwrap();
        hal.kick(DeviceId::Uart(0)).unwrap();
        assert_eq!(hal.chip().kick_count(0), 2);
    }

    #[test]
    fn test_invalid_device_index() {
        let mut hal = new_hal();
        assert_eq!(
            hal.uart_setup(9, &UartConfig::default()),
            Err(HalError::InvalidDevice)
        );
        // Board has two UARTs but the table allows four: index 3 has no
        // board defaults either
        assert_eq!(
            hal.uart_setup(3, &UartConfig::default()),
            Err(HalError::InvalidDevice)
        );
    }

    #[test]
    fn test_spi_send_returns_previous_word() {
        let mut hal = new_hal();
        hal.spi_setup(0, &SpiConfig::default()).unwrap();
        assert_eq!(hal.pin_state(pin(&hal, "B4")), PinState::AfOut);

        hal.chip_mut().push_spi_rx(0x11);
        hal.chip_mut().push_spi_rx(0x22);

        // First send has nothing buffered yet
        assert_eq!(hal.spi_send(0, Some(0xAA)).unwrap(), None);
        // Second send returns what the first shifted in
        assert_eq!(hal.spi_send(0, Some(0xBB)).unwrap(), Some(0x11));
        // Retrieval without transmitting collects the buffer
        assert_eq!(hal.spi_send(0, None).unwrap(), Some(0x22));
        assert_eq!(hal.spi_send(0, None).unwrap(), None);

        let sent = hal.chip().spi_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], (0xAA, FrameSize::Bits8));
    }

    #[test]
    fn test_spi_framing_toggle_preserves_buffer() {
        let mut hal = new_hal();
        hal.spi_setup(0, &SpiConfig::default()).unwrap();
        hal.chip_mut().push_spi_rx(0x5A);
        assert_eq!(hal.spi_send(0, Some(0x01)).unwrap(), None);

        // Toggling framing must not disturb the buffered receive
        hal.spi_set_16bit(0, true).unwrap();
        assert_eq!(hal.spi_send(0, None).unwrap(), Some(0x5A));

        // Subsequent sends use the new framing
        hal.chip_mut().push_spi_rx(0x7777);
        assert_eq!(hal.spi_send(0, Some(0x02)).unwrap(), None);
        assert_eq!(hal.chip().spi_sent()[1], (0x02, FrameSize::Bits16));
    }

    #[test]
    fn test_spi_send16() {
        let mut hal = new_hal();
        hal.spi_setup(0, &SpiConfig {
            mode: MODE_0,
            ..Default::default()
        })
        .unwrap();
        hal.spi_send16(0, 0xBEEF).unwrap();
        assert_eq!(hal.chip().spi_sent()[0], (0xBEEF, FrameSize::Bits16));
    }

    #[test]
    fn test_spi_unconfigured() {
        let mut hal = new_hal();
        assert_eq!(hal.spi_send(0, Some(1)), Err(HalError::NotConfigured));
        assert_eq!(hal.spi_set_16bit(0, true), Err(HalError::NotConfigured));
    }

    #[test]
    fn test_i2c_write_and_read() {
        let mut hal = new_hal();
        hal.i2c_setup(0, &I2cConfig::STANDARD).unwrap();
        assert_eq!(hal.pin_state(pin(&hal, "B7")), PinState::I2c);

        hal.i2c_write(0, 0x3C, &[0x01, 0x02]).unwrap();
        let written = hal.chip().i2c_written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, 0x3C);
        assert_eq!(written[0].1, [0x01, 0x02]);

        hal.chip_mut().queue_i2c_response(&[5, 6, 7]);
        let mut buf = [0u8; 3];
        hal.i2c_read(0, 0x3C, &mut buf).unwrap();
        assert_eq!(buf, [5, 6, 7]);
    }

    #[test]
    fn test_i2c_address_bounds() {
        let mut hal = new_hal();
        hal.i2c_setup(0, &I2cConfig::STANDARD).unwrap();
        assert_eq!(
            hal.i2c_write(0, 0x80, &[0]),
            Err(HalError::InvalidDevice)
        );
    }

    #[test]
    fn test_i2c_bounded_retry() {
        let mut hal = new_hal();
        hal.i2c_setup(0, &I2cConfig::STANDARD).unwrap();

        // Two transient failures recover within the retry budget
        hal.chip_mut().fail_i2c(2);
        hal.i2c_write(0, 0x10, &[1]).unwrap();

        // Three failures exhaust it and surface
        hal.chip_mut().fail_i2c(3);
        assert_eq!(hal.i2c_write(0, 0x10, &[1]), Err(HalError::BusTimeout));
    }

    #[test]
    fn test_i2c_slave_role_rejects_master_ops() {
        let mut hal = new_hal();
        let config = I2cConfig {
            role: I2cRole::Slave(0x42),
            ..I2cConfig::STANDARD
        };
        hal.i2c_setup(0, &config).unwrap();
        assert_eq!(hal.i2c_write(0, 0x10, &[1]), Err(HalError::Unsupported));
        let mut buf = [0u8; 1];
        assert_eq!(hal.i2c_read(0, 0x10, &mut buf), Err(HalError::Unsupported));
    }

    #[test]
    fn test_flash_image_roundtrip() {
        let mut hal = new_hal();
        assert!(!hal.flash_contains_image());
        hal.save_to_flash(&[1, 2, 3, 4]).unwrap();
        assert!(hal.flash_contains_image());
        let mut buf = [0u8; 16];
        let n = hal.load_from_flash(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_serial_number_fills_buffer() {
        let mut hal = new_hal();
        let mut small = [0u8; 4];
        assert_eq!(hal.serial_number(&mut small), 4);
        let mut big = [0u8; 32];
        let n = hal.serial_number(&mut big);
        assert!(n > 4 && n <= 32);
        assert!(!hal.usb_connected());
    }

    #[test]
    fn test_shutdown_releases_non_manual_pins() {
        let mut hal = new_hal();
        let a1 = pin(&hal, "A1");
        let a2 = pin(&hal, "A2");
        hal.pin_output(a1, true).unwrap();
        hal.set_pin_state(a2, PinState::GpioIn).unwrap();
        hal.set_pin_manual(a2, true).unwrap();

        hal.shutdown();
        assert_eq!(hal.pin_state(a1), PinState::Undefined);
        assert_eq!(hal.pin_state(a2), PinState::GpioIn);
    }

    #[test]
    fn test_board_defaults_are_distinct_per_uart() {
        let hal = new_hal();
        let uarts: &[UartPins] = hal.board().uarts;
        assert!(uarts.len() >= 2);
        assert_ne!(uarts[0].rx, uarts[1].rx);
    }
}
