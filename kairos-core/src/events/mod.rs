//! Time-ordered I/O events.
//!
//! Two streams meet here: edges captured by interrupt handlers on
//! watched pins, and output transitions the interpreter has scheduled
//! for the future. Both are bounded; both become visible to the
//! interpreter only when the idle loop drains them.

pub mod capture;
pub mod queue;

pub use capture::{CaptureQueue, CapturedEdge, CAPTURE_CAPACITY};
pub use queue::{ScheduledOutput, TimerQueue, TIMER_CAPACITY};

use kairos_hal::gpio::PinId;
use kairos_hal::time::SysTime;

/// A drained event, presented to the interpreter's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// An edge was observed on a watched pin
    Edge(CapturedEdge),
    /// A scheduled output transition fired
    OutputFired {
        pin: PinId,
        level: bool,
        /// The time the transition was scheduled for
        due: SysTime,
    },
    /// Captured events were lost to queue pressure since the last drain
    CaptureOverflow,
}

impl Notification {
    /// Whether this notification concerns the given pin.
    pub fn is_for_pin(&self, pin: PinId) -> bool {
        match self {
            Notification::Edge(edge) => edge.pin == pin,
            Notification::OutputFired { pin: p, .. } => *p == pin,
            Notification::CaptureOverflow => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_for_pin() {
        let pin = PinId::new(2);
        let edge = Notification::Edge(CapturedEdge {
            pin,
            level: true,
            time: SysTime::ZERO,
        });
        assert!(edge.is_for_pin(pin));
        assert!(!edge.is_for_pin(PinId::new(3)));
        assert!(!Notification::CaptureOverflow.is_for_pin(pin));
    }
}
