//! # Timekeeping
//!
//! The RTC provides a free running 32 bit counter at [`COUNTER_HZ`]. The counter is never set;
//! the wall clock is derived from it through a reference Unix time which corresponds to counter
//! value 0. Setting the time only rewrites the reference, so nothing scheduled against the
//! counter is disturbed.
//!
//! The counter wraps after 2^32 / [`COUNTER_HZ`] seconds (a little over a year). A wrap is
//! detected the next time the counter is observed and folded into the reference.

/// Frequency of the RTC counter (Hz)
pub const COUNTER_HZ: u32 = 128;

pub const TICKS_PER_MINUTE: u32 = 60 * COUNTER_HZ;

/// Seconds represented by a full turn of the counter
pub const WRAP_SECONDS: u32 = u32::MAX / COUNTER_HZ + 1;

/// Periodic tick frequencies a face may request (Hz)
pub const TICK_FREQUENCIES: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Validate a requested tick frequency, falling back to 1 Hz
pub fn tick_frequency(requested: u8) -> u8 {
    if TICK_FREQUENCIES.contains(&requested) {
        requested
    } else {
        1
    }
}

/// Counter ticks between two periodic ticks at `frequency`
pub const fn tick_period(frequency: u8) -> u32 {
    COUNTER_HZ / frequency as u32
}

/// The position of `counter` within the current second, in units of `1 / frequency`.
///
/// The value is rounded to the nearest period so a tick serviced slightly late still reports the
/// period it was raised for.
pub fn subsecond(counter: u32, frequency: u8) -> u8 {
    let frequency = tick_frequency(frequency) as u32;
    let period = COUNTER_HZ / frequency;

    (((counter % COUNTER_HZ + period / 2) / period) % frequency) as u8
}

/// Wall clock derived from the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clock {
    /// Unix time at counter value 0
    reference: u32,
    last_counter: u32,
}

impl Clock {
    pub const fn new(reference: u32) -> Self {
        Self {
            reference,
            last_counter: 0,
        }
    }

    /// Unix time at counter value 0
    pub const fn reference(&self) -> u32 {
        self.reference
    }

    /// Fold a counter wrap into the reference. Returns whether the reference changed.
    pub fn observe(&mut self, counter: u32) -> bool {
        let wrapped = counter < self.last_counter;
        if wrapped {
            self.reference = self.reference.wrapping_add(WRAP_SECONDS);
        }
        self.last_counter = counter;

        wrapped
    }

    /// The Unix time at `counter`
    pub fn unix_time(&self, counter: u32) -> u32 {
        self.reference.wrapping_add(counter / COUNTER_HZ)
    }

    /// Set the wall clock so that `counter` corresponds to `unix`
    pub fn set_unix_time(&mut self, counter: u32, unix: u32) {
        self.reference = unix.wrapping_sub(counter / COUNTER_HZ);
        self.last_counter = counter;
    }

    /// The counter value of the next top of minute strictly after `counter`.
    ///
    /// The target sits half a second past the minute boundary, alongside the 1 Hz tick, and is
    /// never more than one minute away.
    pub fn next_minute(&self, counter: u32) -> u32 {
        let seconds = self.unix_time(counter) % 60;
        let minute_start = counter
            .wrapping_sub(counter % COUNTER_HZ)
            .wrapping_sub(seconds * COUNTER_HZ);

        let target = minute_start.wrapping_add(COUNTER_HZ / 2);
        if crate::compare::reached(target, counter) {
            target.wrapping_add(TICKS_PER_MINUTE)
        } else {
            target
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_seconds() {
        assert_eq!(WRAP_SECONDS as u64, (1u64 << 32) / COUNTER_HZ as u64);
    }

    #[test]
    fn invalid_frequencies_fall_back() {
        assert_eq!(tick_frequency(0), 1);
        assert_eq!(tick_frequency(3), 1);
        assert_eq!(tick_frequency(200), 1);
        assert_eq!(tick_frequency(64), 64);
    }

    #[test]
    fn subsecond_rounds_to_period() {
        assert_eq!(subsecond(COUNTER_HZ * 7, 1), 0);
        assert_eq!(subsecond(COUNTER_HZ * 7 + 32, 4), 1);
        // Slightly late
        assert_eq!(subsecond(COUNTER_HZ * 7 + 34, 4), 1);
        assert_eq!(subsecond(COUNTER_HZ * 7 + 127, 4), 0);
        assert_eq!(subsecond(COUNTER_HZ + 5, 128), 5);
    }

    #[test]
    fn set_time_keeps_counter() {
        let mut clock = Clock::new(0);
        clock.set_unix_time(COUNTER_HZ * 100, 1_700_000_000);
        assert_eq!(clock.unix_time(COUNTER_HZ * 100), 1_700_000_000);
        assert_eq!(clock.unix_time(COUNTER_HZ * 160), 1_700_000_060);
    }

    #[test]
    fn wrap_advances_reference() {
        let mut clock = Clock::new(1_700_000_000);
        assert!(!clock.observe(u32::MAX - COUNTER_HZ + 1));
        let before = clock.unix_time(u32::MAX - COUNTER_HZ + 1);

        assert!(clock.observe(0));
        assert_eq!(clock.unix_time(0), before + 1);
    }

    #[test]
    fn next_minute_bounds() {
        let clock = Clock::new(1_704_067_200 + 17);

        for counter in (0..4 * TICKS_PER_MINUTE).chain(u32::MAX - 2 * TICKS_PER_MINUTE..=u32::MAX) {
            let target = clock.next_minute(counter);
            let ahead = target.wrapping_sub(counter);
            assert!(ahead > 0 && ahead <= TICKS_PER_MINUTE, "counter {counter}");
        }
    }

    #[test]
    fn next_minute_lands_half_past_boundary() {
        // Counter 0 is 17 seconds past the minute
        let clock = Clock::new(1_704_067_200 + 17);
        let target = clock.next_minute(0);

        assert_eq!(target, 43 * COUNTER_HZ + COUNTER_HZ / 2);
        assert_eq!(clock.unix_time(target) % 60, 0);
    }
}
