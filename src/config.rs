use crate::buzzer::Volume;
use crate::settings::Settings;

/// Upper bound on the number of faces
pub const MAX_FACES: usize = 16;

/// Boot time configuration of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Face reached with a long press of Mode on the home face
    pub secondary_face: Option<u8>,
    /// Settings used when none are stored
    pub settings: Settings,
    /// Unix time the clock is seeded with when it has been lost (2024-01-01T00:00:00Z)
    pub fallback_unix: u32,
    pub signal_volume: Volume,
    pub alarm_volume: Volume,
}

impl Config {
    pub const DEFAULT: Config = Config {
        secondary_face: None,
        settings: Settings::DEFAULT,
        fallback_unix: 1_704_067_200,
        signal_volume: Volume::Soft,
        alarm_volume: Volume::Loud,
    };
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}
