//! # Platform
//!
//! Everything the runtime needs from the board. The firmware implements this on top of
//! `watch-hal`; the tests implement it on a simulated counter.
//!
//! Interrupt handlers don't go through this trait. They call into [`Shared`](crate::Shared)
//! directly and arm the compare register with whatever it returns.

use embedded_storage::nor_flash::NorFlash;
use rgb::RGB8;

use crate::accelerometer::Accelerometer;
use crate::buzzer::Buzzer;

pub trait Platform: Buzzer {
    /// Flash region holding the filesystem
    type Flash: NorFlash;

    /// Use [`core::convert::Infallible`] on boards without one
    type Accelerometer: Accelerometer;

    /// Number of backup registers the RTC provides
    const BACKUP_REGISTERS: u8 = 8;

    /// The free running RTC counter
    fn counter(&self) -> u32;

    /// Arm the compare interrupt at `target`, or disable it
    fn arm_compare(&mut self, target: Option<u32>);

    /// Start the periodic tick at `frequency` Hz, or stop it
    fn set_tick_frequency(&mut self, frequency: Option<u8>);

    fn clear_display(&mut self);

    fn set_led(&mut self, color: Option<RGB8>);

    fn read_backup(&self, index: u8) -> u32;

    fn write_backup(&mut self, index: u8, value: u32);

    fn usb_attached(&self) -> bool {
        false
    }

    /// Temperature in °C, if the board can measure it
    fn temperature(&mut self) -> Option<f32> {
        None
    }

    fn accelerometer(&mut self) -> Option<&mut Self::Accelerometer> {
        None
    }

    /// Disable every button interrupt except external wake and stop the peripherals low energy
    /// mode can do without
    fn enter_low_energy(&mut self);

    fn exit_low_energy(&mut self);

    /// Halt until an interrupt has been serviced
    fn wait_for_interrupt(&mut self);

    /// Enter backup mode. On hardware this does not return, waking up resets the MCU.
    fn enter_backup(&mut self);
}
