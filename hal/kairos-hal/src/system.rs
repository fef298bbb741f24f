//! Interrupt control, sleep, watchdog, and device identity.

use crate::time::SysTime;

/// Chip-facing system control operations.
pub trait SystemOps {
    /// Mask interrupts.
    ///
    /// Raw and non-nesting: the context above this trait keeps a depth
    /// counter and only calls this on the outermost entry.
    fn irq_disable(&mut self);

    /// Unmask interrupts. Paired with [`SystemOps::irq_disable`].
    fn irq_enable(&mut self);

    /// Halt the processor until the next interrupt.
    ///
    /// When `deadline` is given, the chip must arrange a wakeup no later
    /// than that time so pending scheduled work is not stalled. Pending
    /// work is never cancelled by sleeping; a late wakeup fires it late.
    fn wait_for_event(&mut self, deadline: Option<SysTime>);

    /// Service the hardware watchdog.
    fn feed_watchdog(&mut self);

    /// Copy the device serial number into `buf`.
    ///
    /// Fills at most `buf.len()` bytes and returns the number written.
    fn serial_number(&mut self, buf: &mut [u8]) -> usize;

    /// Whether a USB serial host is currently connected.
    fn usb_connected(&self) -> bool;
}
