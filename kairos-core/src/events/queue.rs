//! Bounded time-ordered queue of scheduled output transitions.
//!
//! Entries are kept sorted by firing time. Insertion at an existing
//! timestamp goes after its equals, so same-time entries fire in
//! enqueue order. Once enqueued an entry cannot be cancelled; callers
//! needing to undo a transition enqueue a compensating one.

use heapless::Vec;

use kairos_hal::error::HalError;
use kairos_hal::gpio::PinId;
use kairos_hal::time::SysTime;

/// Capacity of the scheduled-output queue.
pub const TIMER_CAPACITY: usize = 16;

/// A future pin value change requested by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScheduledOutput {
    pub time: SysTime,
    pub pin: PinId,
    pub level: bool,
}

/// Bounded, time-ordered scheduled-output queue.
pub struct TimerQueue {
    entries: Vec<ScheduledOutput, TIMER_CAPACITY>,
}

impl TimerQueue {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Enqueue a transition.
    ///
    /// Reports [`HalError::QueueFull`] when at capacity, leaving every
    /// existing entry untouched; the caller degrades gracefully rather
    /// than losing earlier work.
    pub fn schedule(&mut self, event: ScheduledOutput) -> Result<(), HalError> {
        if self.entries.is_full() {
            return Err(HalError::QueueFull);
        }
        let idx = self.entries.partition_point(|e| e.time <= event.time);
        self.entries
            .insert(idx, event)
            .map_err(|_| HalError::QueueFull)
    }

    /// Earliest pending firing time.
    pub fn next_deadline(&self) -> Option<SysTime> {
        self.entries.first().map(|e| e.time)
    }

    /// Remove and return the earliest entry due at or before `now`.
    pub fn pop_due(&mut self, now: SysTime) -> Option<ScheduledOutput> {
        if self.entries.first()?.time <= now {
            Some(self.entries.remove(0))
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity() -> usize {
        TIMER_CAPACITY
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}
