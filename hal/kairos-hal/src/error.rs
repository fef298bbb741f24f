//! Error taxonomy shared by the chip-facing traits.

/// Errors reported by HAL operations.
///
/// Failures are always surfaced as values; nothing in the HAL panics or
/// aborts, since there is no supervisor to restart the device. A failed
/// operation leaves unrelated pins and devices at their last good state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Pin identifier does not resolve to a physical pin
    InvalidPin,
    /// The requested role is not in the pin's capability set
    CapabilityMissing,
    /// Pin is manually locked and cannot be reassigned automatically
    PinLocked,
    /// A bounded queue is at capacity
    QueueFull,
    /// Device or address does not resolve to a peripheral instance
    InvalidDevice,
    /// Device has not been configured via setup
    NotConfigured,
    /// Operation is not supported in the device's current role
    Unsupported,
    /// Bus did not complete within the bounded wait
    BusTimeout,
}
