//! The watch as a movement [`Platform`]
//!
//! The RTC, the buttons and the buzzer are shared with the interrupt handlers, so the board
//! holds RTIC resource proxies for them and locks them on every access. Everything else belongs
//! to `idle` alone.

use core::convert::Infallible;

use cortex_m::peripheral::SCB;
use movement::buzzer::Buzzer;
use movement::{Note, Platform, Volume};
use rgb::RGB8;
use rtic::Mutex;
use watch_hal::lcd::Segments;
use watch_hal::rtc::{self, Reader};
use watch_hal::{Adc, Buttons, Lcd, Led, Rtc, Storage, System};

/// A face's view of the display
pub trait Display {
    fn show(&mut self, segments: Segments);
}

/// The piezo, as the runtime's sequencer drives it
pub struct Piezo<'a>(pub &'a mut watch_hal::Buzzer);

impl Buzzer for Piezo<'_> {
    fn tone(&mut self, tone: Option<(Note, Volume)>) {
        match tone.and_then(|(note, volume)| Some((note.frequency()?, volume))) {
            Some((frequency, volume)) => self.0.play(frequency, volume.duty()),
            None => self.0.silence(),
        }
    }

    fn start_sequence_timer(&mut self) {
        self.0.start_sequence_timer();
    }

    fn stop_sequence_timer(&mut self) {
        self.0.stop_sequence_timer();
    }
}

pub struct Board<R, B, Z> {
    rtc: R,
    reader: Reader,
    buttons: B,
    buzzer: Z,
    lcd: &'static mut Lcd,
    led: &'static mut Led,
    adc: &'static mut Adc,
    system: &'static mut System,
    scb: &'static mut SCB,
}

impl<R, B, Z> Board<R, B, Z>
where
    R: Mutex<T = Rtc>,
    B: Mutex<T = Buttons>,
    Z: Mutex<T = watch_hal::Buzzer>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut rtc: R,
        buttons: B,
        buzzer: Z,
        lcd: &'static mut Lcd,
        led: &'static mut Led,
        adc: &'static mut Adc,
        system: &'static mut System,
        scb: &'static mut SCB,
    ) -> Self {
        let reader = rtc.lock(|rtc| rtc.reader());

        Self {
            rtc,
            reader,
            buttons,
            buzzer,
            lcd,
            led,
            adc,
            system,
            scb,
        }
    }
}

impl<R, B, Z> Buzzer for Board<R, B, Z>
where
    R: Mutex<T = Rtc>,
    B: Mutex<T = Buttons>,
    Z: Mutex<T = watch_hal::Buzzer>,
{
    fn tone(&mut self, tone: Option<(Note, Volume)>) {
        self.buzzer.lock(|buzzer| Piezo(buzzer).tone(tone));
    }

    fn start_sequence_timer(&mut self) {
        self.buzzer.lock(|buzzer| buzzer.start_sequence_timer());
    }

    fn stop_sequence_timer(&mut self) {
        self.buzzer.lock(|buzzer| buzzer.stop_sequence_timer());
    }
}

impl<R, B, Z> Platform for Board<R, B, Z>
where
    R: Mutex<T = Rtc>,
    B: Mutex<T = Buttons>,
    Z: Mutex<T = watch_hal::Buzzer>,
{
    type Flash = Storage;
    type Accelerometer = Infallible;

    const BACKUP_REGISTERS: u8 = rtc::BACKUP_REGISTERS;

    fn counter(&self) -> u32 {
        self.reader.counter()
    }

    fn arm_compare(&mut self, target: Option<u32>) {
        self.rtc.lock(|rtc| rtc.arm(target));
    }

    fn set_tick_frequency(&mut self, frequency: Option<u8>) {
        self.rtc.lock(|rtc| rtc.set_tick_frequency(frequency));
    }

    fn clear_display(&mut self) {
        self.lcd.clear();
    }

    fn set_led(&mut self, color: Option<RGB8>) {
        match color {
            Some(color) => self.led.set(color.r > 0, color.g > 0),
            None => self.led.off(),
        }
    }

    fn read_backup(&self, index: u8) -> u32 {
        self.reader.backup(index)
    }

    fn write_backup(&mut self, index: u8, value: u32) {
        self.rtc.lock(|rtc| rtc.write_backup(index, value));
    }

    fn temperature(&mut self) -> Option<f32> {
        Some(self.adc.measure().temperature())
    }

    fn enter_low_energy(&mut self) {
        self.lcd.clear();
        self.buttons.lock(|buttons| buttons.set_wake_only(true));
    }

    fn exit_low_energy(&mut self) {
        self.buttons.lock(|buttons| buttons.set_wake_only(false));
    }

    fn wait_for_interrupt(&mut self) {
        self.system.clear_wakeup_flag();

        cortex_m::interrupt::free(|_| {
            if !crate::SHARED.has_pending_work() {
                cortex_m::asm::wfi();
            }
        });
    }

    fn enter_backup(&mut self) {
        defmt::info!("standby");
        self.lcd.clear();
        self.system.standby(self.scb)
    }
}

impl<R, B, Z> Display for Board<R, B, Z> {
    fn show(&mut self, segments: Segments) {
        self.lcd.write(segments);
    }
}
