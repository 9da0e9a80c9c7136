//! # LED
//!
//! The LED is driven by up to three PWM channels. It is either illuminated from the user's
//! settings, in which case it turns itself off after the configured dwell time, or forced on with
//! an explicit color until it is forced off again.

use rgb::RGB8;

use crate::clock::COUNTER_HZ;

/// How long an illuminated LED stays on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dwell {
    /// On for as long as the Light button is held
    WhileHeld,
    Seconds(u8),
    /// The LED is never illuminated
    Disabled,
}

impl Dwell {
    /// Decode the three bit dwell field of the settings record
    pub const fn from_bucket(bucket: u8) -> Self {
        match bucket & 0b111 {
            0 => Dwell::WhileHeld,
            0b111 => Dwell::Disabled,
            d => Dwell::Seconds(d * 2 - 1),
        }
    }

    /// Counter ticks until the LED turns off
    pub const fn ticks(self) -> Option<u32> {
        match self {
            Dwell::Seconds(seconds) => Some(seconds as u32 * COUNTER_HZ),
            Dwell::WhileHeld | Dwell::Disabled => None,
        }
    }
}

/// Expand a 4 bit color setting to a full scale PWM level
pub const fn expand_nibble(nibble: u8) -> u8 {
    let nibble = nibble & 0xF;
    nibble | nibble << 4
}

/// PWM levels for the given 4 bit color settings
pub const fn color(red: u8, green: u8, blue: u8) -> RGB8 {
    RGB8 {
        r: expand_nibble(red),
        g: expand_nibble(green),
        b: expand_nibble(blue),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedState {
    #[default]
    Off,
    /// Lit from the settings, subject to the dwell timeout
    Illuminated,
    /// Lit with an explicit color until forced off
    Forced,
}

impl LedState {
    pub const fn is_on(self) -> bool {
        !matches!(self, LedState::Off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwell_buckets() {
        assert_eq!(Dwell::from_bucket(0), Dwell::WhileHeld);
        assert_eq!(Dwell::from_bucket(1), Dwell::Seconds(1));
        assert_eq!(Dwell::from_bucket(2), Dwell::Seconds(3));
        assert_eq!(Dwell::from_bucket(6), Dwell::Seconds(11));
        assert_eq!(Dwell::from_bucket(7), Dwell::Disabled);
        assert_eq!(Dwell::Seconds(3).ticks(), Some(3 * COUNTER_HZ));
        assert_eq!(Dwell::WhileHeld.ticks(), None);
    }

    #[test]
    fn nibbles_expand_to_full_scale() {
        assert_eq!(expand_nibble(0xF), 0xFF);
        assert_eq!(expand_nibble(0x0), 0x00);
        assert_eq!(expand_nibble(0x8), 0x88);
        assert_eq!(color(0xF, 0x4, 0x0), RGB8::new(0xFF, 0x44, 0x00));
    }
}
