//! Interrupt-to-main handoff for captured edges.
//!
//! A bounded single-producer/single-consumer ring: the interrupt handler
//! pushes, the idle drain pops, and nothing else touches it. Push never
//! blocks and never allocates. When the ring is full the newest incoming
//! edge is dropped and an overflow flag latches; the flag is surfaced
//! exactly once on the next drain so the interpreter learns about the
//! gap without being flooded.

use heapless::spsc::Queue;

use kairos_hal::gpio::PinId;
use kairos_hal::time::SysTime;

/// Usable capture slots.
pub const CAPTURE_CAPACITY: usize = 32;

/// An edge observed by the interrupt handler on a watched pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapturedEdge {
    pub pin: PinId,
    /// Pin level after the edge
    pub level: bool,
    /// Time stamped at capture, not at drain
    pub time: SysTime,
}

/// Bounded ring of captured edges.
pub struct CaptureQueue {
    // heapless spsc rings hold N-1 elements
    ring: Queue<CapturedEdge, { CAPTURE_CAPACITY + 1 }>,
    overflowed: bool,
}

impl CaptureQueue {
    pub const fn new() -> Self {
        Self {
            ring: Queue::new(),
            overflowed: false,
        }
    }

    /// Record an edge. Interrupt-context entry point.
    ///
    /// On overflow the edge is dropped and the overflow flag latches.
    pub fn push(&mut self, edge: CapturedEdge) {
        if self.ring.enqueue(edge).is_err() {
            self.overflowed = true;
        }
    }

    /// Remove the oldest captured edge. Main-context only.
    pub fn pop(&mut self) -> Option<CapturedEdge> {
        self.ring.dequeue()
    }

    /// Take the latched overflow flag, clearing it.
    pub fn take_overflow(&mut self) -> bool {
        core::mem::replace(&mut self.overflowed, false)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub const fn capacity() -> usize {
        CAPTURE_CAPACITY
    }
}

impl Default for CaptureQueue {
    fn default() -> Self {
        Self::new()
    }
}
