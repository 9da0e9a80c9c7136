//! # Accelerometer
//!
//! Optional motion sensor. Boards without one report `None` from
//! [`Platform::accelerometer()`](crate::Platform::accelerometer).

use crate::event::{EventKind, EventSet};

/// Output data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataRate {
    PowerDown,
    /// 1.6 Hz in low power mode
    #[default]
    Lowest,
    Hz12_5,
    Hz25,
    Hz50,
    Hz100,
    Hz200,
    Hz400,
    Hz800,
    Hz1600,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    #[default]
    LowPower,
    HighPerformance,
    OnDemand,
}

/// Decoded interrupt source register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptSource {
    pub wake: bool,
    pub single_tap: bool,
    pub double_tap: bool,
}

impl InterruptSource {
    /// The events to post for this interrupt
    pub fn events(self) -> EventSet {
        let mut events = EventSet::EMPTY;
        if self.wake {
            events.insert(EventKind::AccelerometerWake);
        }
        if self.single_tap {
            events.insert(EventKind::SingleTap);
        }
        if self.double_tap {
            events.insert(EventKind::DoubleTap);
        }
        events
    }
}

/// Driver interface for the accelerometer
pub trait Accelerometer {
    /// Probe and configure the sensor for background motion detection. Returns whether a sensor
    /// answered.
    fn begin(&mut self) -> bool;

    fn data_rate(&self) -> DataRate;

    fn set_data_rate(&mut self, rate: DataRate);

    fn mode(&self) -> Mode;

    fn set_mode(&mut self, mode: Mode);

    fn set_tap_detection(&mut self, enabled: bool);

    /// Motion threshold for wakeup, in units of full scale / 64
    fn set_wakeup_threshold(&mut self, threshold: u8);

    /// Read (and thereby clear) the interrupt source
    fn interrupt_source(&mut self) -> InterruptSource;
}

/// Boards without an accelerometer
impl Accelerometer for core::convert::Infallible {
    fn begin(&mut self) -> bool {
        match *self {}
    }

    fn data_rate(&self) -> DataRate {
        match *self {}
    }

    fn set_data_rate(&mut self, _rate: DataRate) {
        match *self {}
    }

    fn mode(&self) -> Mode {
        match *self {}
    }

    fn set_mode(&mut self, _mode: Mode) {
        match *self {}
    }

    fn set_tap_detection(&mut self, _enabled: bool) {
        match *self {}
    }

    fn set_wakeup_threshold(&mut self, _threshold: u8) {
        match *self {}
    }

    fn interrupt_source(&mut self) -> InterruptSource {
        match *self {}
    }
}

/// Data rate and mode to restore when tap detection is turned off again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SavedConfig {
    pub data_rate: DataRate,
    pub mode: Mode,
}

/// Tap detection needs at least 400 Hz in high performance mode
pub fn enable_tap_detection<A: Accelerometer + ?Sized>(accelerometer: &mut A) -> SavedConfig {
    let saved = SavedConfig {
        data_rate: accelerometer.data_rate(),
        mode: accelerometer.mode(),
    };

    accelerometer.set_data_rate(DataRate::Hz400);
    accelerometer.set_mode(Mode::HighPerformance);
    accelerometer.set_tap_detection(true);

    saved
}

pub fn disable_tap_detection<A: Accelerometer + ?Sized>(accelerometer: &mut A, saved: SavedConfig) {
    accelerometer.set_tap_detection(false);
    accelerometer.set_data_rate(saved.data_rate);
    accelerometer.set_mode(saved.mode);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Registers {
        rate: DataRate,
        mode: Mode,
        taps: bool,
    }

    impl Accelerometer for Registers {
        fn begin(&mut self) -> bool {
            true
        }

        fn data_rate(&self) -> DataRate {
            self.rate
        }

        fn set_data_rate(&mut self, rate: DataRate) {
            self.rate = rate;
        }

        fn mode(&self) -> Mode {
            self.mode
        }

        fn set_mode(&mut self, mode: Mode) {
            self.mode = mode;
        }

        fn set_tap_detection(&mut self, enabled: bool) {
            self.taps = enabled;
        }

        fn set_wakeup_threshold(&mut self, _threshold: u8) {}

        fn interrupt_source(&mut self) -> InterruptSource {
            InterruptSource::default()
        }
    }

    #[test]
    fn tap_detection_restores_configuration() {
        let mut registers = Registers {
            rate: DataRate::Hz12_5,
            ..Default::default()
        };

        let saved = enable_tap_detection(&mut registers);
        assert!(registers.taps);
        assert_eq!(registers.rate, DataRate::Hz400);
        assert_eq!(registers.mode, Mode::HighPerformance);

        disable_tap_detection(&mut registers, saved);
        assert!(!registers.taps);
        assert_eq!(registers.rate, DataRate::Hz12_5);
        assert_eq!(registers.mode, Mode::LowPower);
    }

    #[test]
    fn interrupt_events() {
        let source = InterruptSource {
            wake: false,
            single_tap: true,
            double_tap: true,
        };
        let events = source.events();
        assert!(events.contains(EventKind::SingleTap));
        assert!(events.contains(EventKind::DoubleTap));
        assert!(!events.contains(EventKind::AccelerometerWake));
    }
}
