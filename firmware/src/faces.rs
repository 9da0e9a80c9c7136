//! The faces this watch ships with

use movement::settings::ClockMode;
use movement::{Advisory, Event, EventKind, Face, Movement, Platform};
use watch_hal::lcd::{self, Segments};

use crate::board::Display;

/// Hours, minutes and seconds in local time, with an optional hourly chime
///
/// Alarm toggles the chime. In low energy mode the seconds are left blank as the display is only
/// refreshed once a minute.
#[derive(Default)]
pub struct ClockFace {
    /// Holds the chime flag across backup mode
    chime_register: Option<u8>,
}

impl ClockFace {
    fn chime<P: Platform>(&self, movement: &Movement<P>) -> bool {
        self.chime_register
            .is_some_and(|register| movement.backup_register(register) != 0)
    }

    fn draw<P: Platform + Display>(&self, movement: &mut Movement<P>, seconds: bool) {
        let now = movement.local_date_time();

        let hour = match movement.settings().clock_mode() {
            ClockMode::TwentyFourHour => now.hour(),
            ClockMode::TwelveHour => match now.hour() % 12 {
                0 => 12,
                hour => hour,
            },
        };

        let mut segments = lcd::pair(0, hour) | lcd::pair(2, now.minute());
        if seconds {
            segments |= lcd::pair(4, now.second());
        }

        movement.platform_mut().show(segments);
    }
}

impl<P: Platform + Display> Face<P> for ClockFace {
    fn setup(&mut self, _index: u8, movement: &mut Movement<P>) {
        if self.chime_register.is_none() {
            self.chime_register = movement.claim_backup_register();
        }
    }

    fn activate(&mut self, _movement: &mut Movement<P>) {}

    fn handle(&mut self, event: Event, movement: &mut Movement<P>) -> bool {
        match event.kind {
            EventKind::Activate | EventKind::Tick => self.draw(movement, true),
            EventKind::LowEnergyUpdate => self.draw(movement, false),
            EventKind::AlarmButtonUp => {
                if let Some(register) = self.chime_register {
                    let chime = !self.chime(movement);
                    defmt::debug!("hourly chime: {}", chime);
                    movement.set_backup_register(register, chime as u32);
                }
            }
            EventKind::BackgroundTask => {
                movement.play_signal();
            }
            _ => return movement.default_loop_handler(event),
        }

        true
    }

    fn resign(&mut self, _movement: &mut Movement<P>) {}

    fn advise(&mut self, movement: &Movement<P>) -> Option<Advisory> {
        let chime = self.chime(movement);

        Some(Advisory {
            wants_background_task: chime && movement.local_date_time().minute() == 0,
            has_active_alarm: chime,
        })
    }
}

/// Temperature from the MCU's internal sensor
///
/// Alarm switches between °C and °F. The unit is a global setting so the change is saved to the
/// settings file.
#[derive(Default)]
pub struct ThermometerFace;

impl ThermometerFace {
    fn draw<P: Platform + Display>(movement: &mut Movement<P>) {
        let Some(celsius) = movement.temperature() else {
            movement.platform_mut().show(lcd::minus(2) | lcd::minus(3));
            return;
        };

        let temperature = match movement.settings().use_imperial_units() {
            true => celsius * 1.8 + 32.0,
            false => celsius,
        };

        movement.platform_mut().show(segments(round(temperature)));
    }
}

/// Round half away from zero
fn round(value: f32) -> i32 {
    if value < 0.0 {
        (value - 0.5) as i32
    } else {
        (value + 0.5) as i32
    }
}

/// A right aligned whole number from -999 to 999
fn segments(value: i32) -> Segments {
    let magnitude = value.unsigned_abs().min(999);

    let mut segments = lcd::pair(4, (magnitude % 100) as u8);
    if magnitude >= 100 {
        segments |= lcd::digit(3, (magnitude / 100) as u8);
    }
    if value < 0 {
        segments |= lcd::minus(2);
    }

    segments
}

impl<P: Platform + Display> Face<P> for ThermometerFace {
    fn activate(&mut self, movement: &mut Movement<P>) {
        movement.request_tick_frequency(1);
    }

    fn handle(&mut self, event: Event, movement: &mut Movement<P>) -> bool {
        match event.kind {
            EventKind::Activate => Self::draw(movement),
            // Measure every five seconds
            EventKind::Tick => {
                if movement.local_date_time().second() % 5 == 0 {
                    Self::draw(movement);
                }
            }
            EventKind::AlarmButtonUp => {
                let settings = movement.settings();
                movement.set_settings(settings.with_imperial_units(!settings.use_imperial_units()));
                if let Err(e) = movement.store_settings() {
                    defmt::warn!("failed to store settings: {}", e);
                }
                Self::draw(movement);
            }
            EventKind::Timeout => movement.move_to_face(0),
            EventKind::LowEnergyUpdate => movement.platform_mut().show(lcd::BLANK),
            _ => return movement.default_loop_handler(event),
        }

        true
    }

    fn resign(&mut self, _movement: &mut Movement<P>) {}
}
