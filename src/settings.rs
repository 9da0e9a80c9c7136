//! # Settings
//!
//! The user's preferences are packed into a single 32 bit word:
//!
//! | Bits | Field |
//! |---|---|
//! | 0-1 | layout version |
//! | 2 | button beep |
//! | 3-4 | inactivity timeout |
//! | 5-7 | low energy timeout |
//! | 8-10 | LED dwell |
//! | 11-14 | LED red |
//! | 15-18 | LED green |
//! | 19-22 | LED blue |
//! | 23-28 | time zone |
//! | 29 | 24 hour clock |
//! | 30 | imperial units |
//! | 31 | loud button beep |
//!
//! The word is persisted in [`SETTINGS_FILE`] and mirrored into backup register 0. A stored word
//! with a different layout version is discarded in favour of the defaults. An erased backup
//! register reads as zero, which never carries a valid version.

use embedded_storage::nor_flash::NorFlash;

use crate::buzzer::Volume;
use crate::fs::{Filesystem, FsError};
use crate::led::Dwell;
use crate::logging::{info, warn};

pub const SETTINGS_FILE: &str = "settings.u32";

/// Current layout version of the settings word
pub const VERSION: u8 = 1;

/// Inactivity timeout buckets (seconds)
pub const TIMEOUTS: [u32; 4] = [60, 120, 300, 1800];

/// Low energy timeout buckets (seconds), bucket 0 never enters low energy mode
pub const LOW_ENERGY_TIMEOUTS: [Option<u32>; 8] = [
    None,
    Some(10 * 60),
    Some(60 * 60),
    Some(2 * 60 * 60),
    Some(6 * 60 * 60),
    Some(12 * 60 * 60),
    Some(24 * 60 * 60),
    Some(7 * 24 * 60 * 60),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockMode {
    TwelveHour,
    TwentyFourHour,
}

macro_rules! fields {
    ( $( $(#[$doc:meta])* $get:ident, $set:ident: $shift:literal, $width:literal; )* ) => {
        $(
            $(#[$doc])*
            pub const fn $get(self) -> u8 {
                ((self.0 >> $shift) & ((1 << $width) - 1)) as u8
            }

            pub const fn $set(self, value: u8) -> Self {
                let mask: u32 = ((1 << $width) - 1) << $shift;
                Self((self.0 & !mask) | (((value as u32) << $shift) & mask))
            }
        )*
    };
}

/// The packed settings word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings(u32);

impl Settings {
    /// 12 hour clock, button beeps on, 60 s inactivity timeout, low energy after 10 minutes, LED
    /// green for 3 s and UTC.
    pub const DEFAULT: Settings = Settings(0)
        .with_version(VERSION)
        .with_button_should_sound_bit(1)
        .with_timeout_bucket(0)
        .with_low_energy_bucket(1)
        .with_led_dwell_bucket(2)
        .with_led_red(0x0)
        .with_led_green(0xF)
        .with_led_blue(0x0)
        .with_time_zone(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether the word was written with the current layout
    pub const fn is_current(self) -> bool {
        self.version() == VERSION
    }

    fields! {
        version, with_version: 0, 2;
        button_should_sound_bit, with_button_should_sound_bit: 2, 1;
        /// Index into [`TIMEOUTS`]
        timeout_bucket, with_timeout_bucket: 3, 2;
        /// Index into [`LOW_ENERGY_TIMEOUTS`]
        low_energy_bucket, with_low_energy_bucket: 5, 3;
        /// See [`Dwell::from_bucket()`]
        led_dwell_bucket, with_led_dwell_bucket: 8, 3;
        led_red, with_led_red: 11, 4;
        led_green, with_led_green: 15, 4;
        led_blue, with_led_blue: 19, 4;
        /// Index into [`crate::zone::ZONES`]
        time_zone, with_time_zone: 23, 6;
        clock_24h_bit, with_clock_24h_bit: 29, 1;
        imperial_units_bit, with_imperial_units_bit: 30, 1;
        button_volume_bit, with_button_volume_bit: 31, 1;
    }

    pub const fn button_should_sound(self) -> bool {
        self.button_should_sound_bit() != 0
    }

    pub const fn with_button_should_sound(self, enabled: bool) -> Self {
        self.with_button_should_sound_bit(enabled as u8)
    }

    pub const fn clock_mode(self) -> ClockMode {
        match self.clock_24h_bit() {
            0 => ClockMode::TwelveHour,
            _ => ClockMode::TwentyFourHour,
        }
    }

    pub const fn with_clock_mode(self, mode: ClockMode) -> Self {
        self.with_clock_24h_bit(matches!(mode, ClockMode::TwentyFourHour) as u8)
    }

    pub const fn use_imperial_units(self) -> bool {
        self.imperial_units_bit() != 0
    }

    pub const fn with_imperial_units(self, imperial: bool) -> Self {
        self.with_imperial_units_bit(imperial as u8)
    }

    pub const fn button_volume(self) -> Volume {
        match self.button_volume_bit() {
            0 => Volume::Soft,
            _ => Volume::Loud,
        }
    }

    pub const fn with_button_volume(self, volume: Volume) -> Self {
        self.with_button_volume_bit(matches!(volume, Volume::Loud) as u8)
    }

    /// Inactivity timeout (seconds)
    pub const fn timeout(self) -> u32 {
        TIMEOUTS[self.timeout_bucket() as usize]
    }

    /// Low energy timeout (seconds), `None` if the watch should never enter low energy mode
    pub const fn low_energy_timeout(self) -> Option<u32> {
        LOW_ENERGY_TIMEOUTS[self.low_energy_bucket() as usize]
    }

    pub const fn led_dwell(self) -> Dwell {
        Dwell::from_bucket(self.led_dwell_bucket())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::DEFAULT
    }
}

/// Persists the settings word, skipping writes of an unchanged value
#[derive(Debug, Default)]
pub struct SettingsStore {
    last_written: Option<u32>,
}

impl SettingsStore {
    pub const fn new() -> Self {
        Self { last_written: None }
    }

    /// Load the settings from the filesystem, writing `defaults` if they are missing, corrupt or
    /// of another layout version
    pub fn load<F: NorFlash>(&mut self, fs: &mut Filesystem<F>, defaults: Settings) -> Settings {
        let mut buf = [0; 4];

        match fs.read_file(SETTINGS_FILE, &mut buf) {
            Ok(4) => {
                let settings = Settings::from_bits(u32::from_le_bytes(buf));
                if settings.is_current() {
                    self.last_written = Some(settings.bits());
                    return settings;
                }
                warn!("settings version {} is not current", settings.version());
            }
            Ok(len) => warn!("settings file is {} bytes", len),
            Err(FsError::NotFound) => info!("no settings file"),
            Err(e) => warn!("failed to read settings: {:?}", e),
        }

        if let Err(e) = self.store(fs, defaults) {
            warn!("failed to write default settings: {:?}", e);
        }

        defaults
    }

    /// Write `settings` if they differ from what was last written. Returns whether a write took
    /// place.
    pub fn store<F: NorFlash>(
        &mut self,
        fs: &mut Filesystem<F>,
        settings: Settings,
    ) -> Result<bool, FsError> {
        if self.last_written == Some(settings.bits()) {
            return Ok(false);
        }

        fs.write_file(SETTINGS_FILE, &settings.bits().to_le_bytes())?;
        self.last_written = Some(settings.bits());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RamFlash;

    fn filesystem() -> Filesystem<RamFlash<4096>> {
        let mut fs = Filesystem::new(RamFlash::new());
        fs.format().unwrap();
        fs
    }

    #[test]
    fn defaults() {
        let settings = Settings::DEFAULT;
        assert!(settings.is_current());
        assert_eq!(settings.clock_mode(), ClockMode::TwelveHour);
        assert!(settings.button_should_sound());
        assert_eq!(settings.timeout(), 60);
        assert_eq!(settings.low_energy_timeout(), Some(600));
        assert_eq!(settings.led_dwell(), Dwell::Seconds(3));
        assert_eq!(
            (settings.led_red(), settings.led_green(), settings.led_blue()),
            (0x0, 0xF, 0x0)
        );
        assert_eq!(settings.time_zone(), 0);
        assert_eq!(settings.button_volume(), Volume::Soft);
        assert!(!Settings::from_bits(0).is_current());
    }

    #[test]
    fn fields_do_not_overlap() {
        let settings = Settings::from_bits(0)
            .with_time_zone(0x3F)
            .with_led_blue(0xF)
            .with_button_volume(Volume::Loud);

        assert_eq!(settings.time_zone(), 0x3F);
        assert_eq!(settings.led_blue(), 0xF);
        assert_eq!(settings.led_green(), 0);
        assert_eq!(settings.clock_mode(), ClockMode::TwelveHour);
        assert_eq!(settings.bits(), 0x3F << 23 | 0xF << 19 | 1 << 31);

        // Out of range values are masked to the field
        assert_eq!(Settings::from_bits(0).with_timeout_bucket(7).bits(), 0b11 << 3);
    }

    #[test]
    fn fresh_filesystem_gets_defaults() {
        let mut fs = filesystem();
        let mut store = SettingsStore::new();

        assert_eq!(store.load(&mut fs, Settings::DEFAULT), Settings::DEFAULT);
        assert_eq!(fs.file_size(SETTINGS_FILE), Ok(4));

        let mut reloaded = SettingsStore::new();
        assert_eq!(reloaded.load(&mut fs, Settings::from_bits(0)), Settings::DEFAULT);
    }

    #[test]
    fn stale_version_is_replaced() {
        let mut fs = filesystem();
        let stale = Settings::DEFAULT.with_version(VERSION + 1);
        fs.write_file(SETTINGS_FILE, &stale.bits().to_le_bytes()).unwrap();

        let mut store = SettingsStore::new();
        assert_eq!(store.load(&mut fs, Settings::DEFAULT), Settings::DEFAULT);

        let mut buf = [0; 4];
        fs.read_file(SETTINGS_FILE, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), Settings::DEFAULT.bits());
    }

    #[test]
    fn truncated_file_is_replaced() {
        let mut fs = filesystem();
        fs.write_file(SETTINGS_FILE, &[1, 2]).unwrap();

        let mut store = SettingsStore::new();
        assert_eq!(store.load(&mut fs, Settings::DEFAULT), Settings::DEFAULT);
        assert_eq!(fs.file_size(SETTINGS_FILE), Ok(4));
    }

    #[test]
    fn writes_are_coalesced() {
        let mut fs = filesystem();
        let mut store = SettingsStore::new();
        let settings = store.load(&mut fs, Settings::DEFAULT);

        assert_eq!(store.store(&mut fs, settings), Ok(false));

        let changed = settings.with_clock_mode(ClockMode::TwentyFourHour);
        assert_eq!(store.store(&mut fs, changed), Ok(true));
        assert_eq!(store.store(&mut fs, changed), Ok(false));

        let mut buf = [0; 4];
        fs.read_file(SETTINGS_FILE, &mut buf).unwrap();
        assert_eq!(Settings::from_bits(u32::from_le_bytes(buf)), changed);
    }
}
