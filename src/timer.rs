//! Interval gate over a wrapping 32-bit millisecond counter.
//!
//! Every periodic action keeps a [`TimerMark`]. The action fires when at
//! least `interval` ms have passed since the mark; the caller then moves
//! the mark to `now`. Differences are taken with wrapping arithmetic, so
//! the gate keeps working when the counter rolls over (~49.7 days).

/// True when `interval` ms have passed between `mark` and `now`.
pub fn elapsed(mark: u32, interval: u32, now: u32) -> bool {
    since(mark, now) >= interval
}

/// Milliseconds from `mark` to `now`, modulo 2^32.
pub fn since(mark: u32, now: u32) -> u32 {
    now.wrapping_sub(mark)
}

/// Last-fired timestamp of one periodic action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerMark(u32);

impl TimerMark {
    pub const fn new(at: u32) -> Self {
        Self(at)
    }

    pub fn at(&self) -> u32 {
        self.0
    }

    pub fn reset(&mut self, now: u32) {
        self.0 = now;
    }

    pub fn is_due(&self, interval: u32, now: u32) -> bool {
        elapsed(self.0, interval, now)
    }

    /// Fire-and-rearm: returns true (and moves the mark) when due.
    pub fn fire(&mut self, interval: u32, now: u32) -> bool {
        if self.is_due(interval, now) {
            self.0 = now;
            true
        } else {
            false
        }
    }
}
