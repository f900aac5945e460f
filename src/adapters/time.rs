//! Monotonic time adapter.
//!
//! The coordinator measures every interval as a wrapping `u32` of
//! milliseconds since boot, the width of the board's tick counter.
//! On the host it is derived from `std::time::Instant`.

use std::time::Instant;

pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since boot.  Wraps after ~49.7 days; compare with
    /// `wrapping_sub`.
    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// Seconds since boot (monotonic, does not wrap).
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}
